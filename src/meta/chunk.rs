//! Chunk map: one list per inode, index = page number.
//!
//! The list is append-only with last-element mutation: page `n` may be
//! written when the list holds exactly `n` entries (append) or more
//! (in-place update). A zero-length element stands for an erased page and
//! is reported as absent.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{keys, Ino, Meta};
use crate::errors::FsError;

/// One persisted page: where it sits in the file and which object holds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkAttr {
    pub offset: u64,
    pub length: u64,
    #[serde(rename = "storagePath")]
    pub storage_path: String,
}

impl Meta {
    pub async fn get_chunk_meta(
        &self,
        ino: Ino,
        page_number: u64,
    ) -> Result<Option<ChunkAttr>, FsError> {
        let Some(data) = self
            .kv()
            .lindex(&keys::chunk(ino), page_number as i64)
            .await?
        else {
            return Ok(None);
        };
        let chunk: ChunkAttr = serde_json::from_slice(&data)?;
        if chunk.length == 0 {
            return Ok(None);
        }
        Ok(Some(chunk))
    }

    pub async fn set_chunk_meta(
        &self,
        ino: Ino,
        page_number: u64,
        offset: u64,
        length: u64,
        storage_path: &str,
    ) -> Result<(), FsError> {
        debug!(ino, page_number, offset, length, storage_path, "set chunk meta");

        let data = serde_json::to_vec(&ChunkAttr {
            offset,
            length,
            storage_path: storage_path.to_string(),
        })?;

        let key = keys::chunk(ino);
        let list_len = self.kv().llen(&key).await?;
        if page_number == list_len {
            self.kv().rpush(&key, &data).await?;
        } else if page_number < list_len {
            self.kv().lset(&key, page_number as i64, &data).await?;
        } else {
            error!(ino, page_number, list_len, "chunk index beyond end of list");
            return Err(FsError::Io("chunk index beyond end of list".into()));
        }
        Ok(())
    }

    /// Erase one page's entry: pop when it is the tail, otherwise leave a
    /// zero-length placeholder which readers treat as absent.
    pub async fn drop_chunk_meta(&self, ino: Ino, page_number: u64) -> Result<(), FsError> {
        let key = keys::chunk(ino);
        let list_len = self.kv().llen(&key).await?;
        if page_number >= list_len {
            return Ok(());
        }
        if page_number == list_len - 1 {
            self.kv().rpop(&key).await?;
            return Ok(());
        }
        let data = serde_json::to_vec(&ChunkAttr {
            offset: page_number * crate::page::PAGE_SIZE as u64,
            length: 0,
            storage_path: String::new(),
        })?;
        self.kv().lset(&key, page_number as i64, &data).await?;
        Ok(())
    }

    /// Trim the chunk list to a new file length expressed as the last page
    /// number and the bytes used on that page. A zero `last_page_length`
    /// drops the boundary page entirely.
    pub async fn truncate_chunk_meta(
        &self,
        ino: Ino,
        last_page: u64,
        last_page_length: u64,
    ) -> Result<(), FsError> {
        debug!(ino, last_page, last_page_length, "truncate chunk meta");

        let key = keys::chunk(ino);
        if self.kv().llen(&key).await? == 0 {
            return Ok(());
        }

        self.kv().ltrim(&key, 0, last_page as i64).await?;

        if last_page_length == 0 {
            self.kv().rpop(&key).await?;
            return Ok(());
        }

        if let Some(data) = self.kv().lindex(&key, last_page as i64).await? {
            let mut chunk: ChunkAttr = serde_json::from_slice(&data)?;
            chunk.length = last_page_length;
            let data = serde_json::to_vec(&chunk)?;
            self.kv().lset(&key, last_page as i64, &data).await?;
        }
        Ok(())
    }

    pub async fn chunk_count(&self, ino: Ino) -> Result<u64, FsError> {
        Ok(self.kv().llen(&keys::chunk(ino)).await?)
    }
}
