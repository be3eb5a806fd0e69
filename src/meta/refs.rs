//! Git ref blobs: the whole file body as a single opaque value.

use super::{keys, Ino, Meta};
use crate::errors::FsError;

impl Meta {
    pub async fn ref_get(&self, ino: Ino) -> Result<Option<Vec<u8>>, FsError> {
        Ok(self.kv().get(&keys::git_ref(ino)).await?)
    }

    pub async fn ref_set(&self, ino: Ino, value: &[u8]) -> Result<(), FsError> {
        self.kv().set(&keys::git_ref(ino), value).await?;
        Ok(())
    }

    pub async fn ref_del(&self, ino: Ino) -> Result<(), FsError> {
        self.kv().del(&keys::git_ref(ino)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::meta::test_support::test_meta;

    #[tokio::test]
    async fn ref_roundtrip() {
        let meta = test_meta().await;
        assert!(meta.ref_get(5).await.unwrap().is_none());

        meta.ref_set(5, b"ref: refs/heads/main\n").await.unwrap();
        assert_eq!(
            meta.ref_get(5).await.unwrap().unwrap(),
            b"ref: refs/heads/main\n"
        );

        meta.ref_del(5).await.unwrap();
        assert!(meta.ref_get(5).await.unwrap().is_none());
    }
}
