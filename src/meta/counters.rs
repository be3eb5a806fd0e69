//! Filesystem-level counters backing statfs.

use super::{keys, Meta};
use crate::errors::FsError;

impl Meta {
    async fn counter(&self, key: &str) -> Result<u64, FsError> {
        match self.kv().get(key).await? {
            None => Ok(0),
            Some(data) => std::str::from_utf8(&data)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| FsError::Io(format!("counter {key} is not an integer"))),
        }
    }

    async fn set_counter(&self, key: &str, value: u64) -> Result<(), FsError> {
        self.kv().set(key, value.to_string().as_bytes()).await?;
        Ok(())
    }

    pub async fn total_inode_count(&self) -> Result<u64, FsError> {
        self.counter(keys::TOTAL_INODE).await
    }

    pub async fn set_total_inode_count(&self, count: u64) -> Result<(), FsError> {
        self.set_counter(keys::TOTAL_INODE, count).await
    }

    /// High-water mark of allocated inode ids.
    pub async fn cur_inode_count(&self) -> Result<u64, FsError> {
        self.counter(keys::NEXT_INODE).await
    }

    pub async fn used_space(&self) -> Result<u64, FsError> {
        // IncrBy can momentarily drive the counter negative under racing
        // updates; clamp rather than propagating a bogus huge value.
        match self.kv().get(keys::USED_SPACE).await? {
            None => Ok(0),
            Some(data) => {
                let value = std::str::from_utf8(&data)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or_else(|| FsError::Io("usedspace is not an integer".into()))?;
                Ok(value.max(0) as u64)
            }
        }
    }

    pub async fn update_used_space(&self, delta: i64) -> Result<(), FsError> {
        if delta == 0 {
            return Ok(());
        }
        self.kv().incr_by(keys::USED_SPACE, delta).await?;
        Ok(())
    }

    pub async fn total_space(&self) -> Result<u64, FsError> {
        self.counter(keys::TOTAL_SPACE).await
    }

    pub async fn set_total_space(&self, space: u64) -> Result<(), FsError> {
        self.set_counter(keys::TOTAL_SPACE, space).await
    }
}
