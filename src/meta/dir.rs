use serde::{Deserialize, Serialize};

use super::{keys, FileType, Ino, Meta};
use crate::errors::FsError;

/// Wire form of a directory entry, one hash field per child name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DentryData {
    #[serde(rename = "inode")]
    pub ino: Ino,
    #[serde(rename = "type")]
    pub typ: FileType,
}

#[derive(Debug, Clone)]
pub struct Dentry {
    pub name: String,
    pub ino: Ino,
    pub typ: FileType,
}

impl Meta {
    /// Look up `name` under `parent`. `Ok(None)` means no such entry.
    pub async fn get_dentry(&self, parent: Ino, name: &str) -> Result<Option<Dentry>, FsError> {
        let Some(data) = self.kv().hget(&keys::dentry(parent), name).await? else {
            return Ok(None);
        };
        let record: DentryData = serde_json::from_slice(&data)?;
        Ok(Some(Dentry {
            name: name.to_string(),
            ino: record.ino,
            typ: record.typ,
        }))
    }

    pub async fn set_dentry(
        &self,
        parent: Ino,
        name: &str,
        ino: Ino,
        typ: FileType,
    ) -> Result<(), FsError> {
        let data = serde_json::to_vec(&DentryData { ino, typ })?;
        self.kv().hset(&keys::dentry(parent), name, &data).await?;
        Ok(())
    }

    pub async fn del_dentry(&self, parent: Ino, name: &str) -> Result<(), FsError> {
        self.kv().hdel(&keys::dentry(parent), name).await?;
        Ok(())
    }

    /// Every entry of the directory, unordered.
    pub async fn get_all_dentries(&self, parent: Ino) -> Result<Vec<Dentry>, FsError> {
        let entries = self.kv().hgetall(&keys::dentry(parent)).await?;
        let mut dentries = Vec::with_capacity(entries.len());
        for (name, data) in entries {
            let record: DentryData = serde_json::from_slice(&data)?;
            dentries.push(Dentry {
                name,
                ino: record.ino,
                typ: record.typ,
            });
        }
        Ok(dentries)
    }

    pub async fn directory_length(&self, parent: Ino) -> Result<u64, FsError> {
        Ok(self.kv().hlen(&keys::dentry(parent)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::test_support::test_meta;
    use crate::meta::ROOT_INODE;

    #[tokio::test]
    async fn dentry_roundtrip() {
        let meta = test_meta().await;

        assert!(meta.get_dentry(ROOT_INODE, "a").await.unwrap().is_none());
        meta.set_dentry(ROOT_INODE, "a", 5, FileType::Regular)
            .await
            .unwrap();

        let dentry = meta.get_dentry(ROOT_INODE, "a").await.unwrap().unwrap();
        assert_eq!(dentry.ino, 5);
        assert_eq!(dentry.typ, FileType::Regular);
        assert_eq!(dentry.name, "a");

        assert_eq!(meta.directory_length(ROOT_INODE).await.unwrap(), 1);
        meta.del_dentry(ROOT_INODE, "a").await.unwrap();
        assert_eq!(meta.directory_length(ROOT_INODE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_all_entries() {
        let meta = test_meta().await;
        meta.set_dentry(ROOT_INODE, "x", 2, FileType::Regular)
            .await
            .unwrap();
        meta.set_dentry(ROOT_INODE, "y", 3, FileType::Directory)
            .await
            .unwrap();

        let mut names: Vec<String> = meta
            .get_all_dentries(ROOT_INODE)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["x", "y"]);
    }
}
