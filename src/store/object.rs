//! Object driver: chunk payloads as immutable objects.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use rand::Rng;
use tracing::debug;
use url::Url;

use crate::errors::FsError;
use crate::meta::Ino;

const AWS_DEFAULT_REGION: &str = "us-east-1";
const STORAGE_PATH_SUFFIX_LEN: usize = 32;

/// Connection options for the object store, straight from the CLI.
#[derive(Debug, Clone, Default)]
pub struct DataOption {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
}

/// Thin wrapper over an [`ObjectStore`] speaking the key layout of the
/// data plane: `chunks/<ino>/<page>/<random suffix>`.
pub struct DataStore {
    store: Arc<dyn ObjectStore>,
}

impl DataStore {
    /// Build an S3-compatible store from `option`. The endpoint scheme
    /// selects TLS; credentials fall back to the environment.
    pub fn open(option: &DataOption) -> Result<Self, FsError> {
        let uri = Url::parse(&option.endpoint)
            .map_err(|e| FsError::Io(format!("invalid endpoint {}: {e}", option.endpoint)))?;

        let mut builder = AmazonS3Builder::new()
            .with_endpoint(option.endpoint.clone())
            .with_bucket_name(option.bucket.clone())
            .with_region(AWS_DEFAULT_REGION)
            .with_virtual_hosted_style_request(false)
            .with_allow_http(uri.scheme() != "https");
        if !option.access_key.is_empty() {
            builder = builder
                .with_access_key_id(option.access_key.clone())
                .with_secret_access_key(option.secret_key.clone());
        }

        let store = builder.build()?;
        Ok(Self {
            store: Arc::new(store),
        })
    }

    /// In-process store backing the test suite.
    pub fn new_in_memory() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
        }
    }

    /// Verify the bucket is reachable. Bucket creation is the operator's
    /// job; `object_store` has no bucket-management surface.
    pub async fn init(&self) -> Result<(), FsError> {
        let mut listing = self.store.list(None);
        match listing.next().await {
            None | Some(Ok(_)) => Ok(()),
            Some(Err(e)) => Err(e.into()),
        }
    }

    pub async fn put(&self, key: &str, data: Bytes) -> Result<(), FsError> {
        debug!(key, len = data.len(), "object put");
        self.store
            .put(&Path::from(key), PutPayload::from(data))
            .await?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Bytes, FsError> {
        let result = self.store.get(&Path::from(key)).await?;
        Ok(result.bytes().await?)
    }

    pub async fn get_range(&self, key: &str, offset: u64, length: u64) -> Result<Bytes, FsError> {
        debug!(key, offset, length, "object ranged get");
        let range = offset as usize..(offset + length) as usize;
        Ok(self.store.get_range(&Path::from(key), range).await?)
    }

    pub async fn delete(&self, key: &str) -> Result<(), FsError> {
        self.store.delete(&Path::from(key)).await?;
        Ok(())
    }

    pub async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<String>, FsError> {
        let prefix = Path::from(prefix);
        let mut listing = self.store.list(Some(&prefix));
        let mut keys = Vec::new();
        while keys.len() < limit {
            match listing.next().await {
                Some(Ok(meta)) => keys.push(meta.location.to_string()),
                Some(Err(e)) => return Err(e.into()),
                None => break,
            }
        }
        Ok(keys)
    }
}

/// A fresh object key for one page of one inode. Every flush gets a new
/// random suffix, so the previous object is simply abandoned.
pub fn chunk_path(ino: Ino, page_number: u64) -> String {
    format!(
        "chunks/{}/{}/{}",
        ino,
        page_number,
        random_suffix(STORAGE_PATH_SUFFIX_LEN)
    )
}

fn random_suffix(len: usize) -> String {
    const CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_path_layout() {
        let path = chunk_path(7, 3);
        let parts: Vec<&str> = path.split('/').collect();
        assert_eq!(parts[0], "chunks");
        assert_eq!(parts[1], "7");
        assert_eq!(parts[2], "3");
        assert_eq!(parts[3].len(), STORAGE_PATH_SUFFIX_LEN);
        assert!(parts[3]
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn chunk_paths_are_unique() {
        assert_ne!(chunk_path(1, 0), chunk_path(1, 0));
    }

    #[tokio::test]
    async fn put_get_ranged_delete() {
        let store = DataStore::new_in_memory();
        store.init().await.unwrap();

        store
            .put("chunks/1/0/abc", Bytes::from_static(b"hello world"))
            .await
            .unwrap();
        assert_eq!(store.get("chunks/1/0/abc").await.unwrap().as_ref(), b"hello world");
        assert_eq!(
            store.get_range("chunks/1/0/abc", 6, 5).await.unwrap().as_ref(),
            b"world"
        );

        let keys = store.list("chunks/1", 10).await.unwrap();
        assert_eq!(keys, vec!["chunks/1/0/abc".to_string()]);

        store.delete("chunks/1/0/abc").await.unwrap();
        assert!(store.get("chunks/1/0/abc").await.is_err());
    }
}
