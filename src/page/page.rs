use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::error;

use super::PAGE_SIZE;
use crate::errors::FsError;
use crate::meta::Ino;
use crate::store::object::chunk_path;
use crate::store::DataSource;

struct PageState {
    data: Vec<u8>,
    clean: bool,
    /// Bytes of the buffer that hold file content, `0..=PAGE_SIZE`.
    size: usize,
}

/// One cached page of file content. Reads share the guard; writes,
/// truncates and flushes are exclusive.
pub struct Page {
    page_number: u64,
    state: RwLock<PageState>,
}

impl Page {
    pub fn new(page_number: u64) -> Self {
        Self {
            page_number,
            state: RwLock::new(PageState {
                data: vec![0; PAGE_SIZE],
                clean: true,
                size: 0,
            }),
        }
    }

    /// A page loaded from the object store; `content` is the persisted
    /// chunk, at most `PAGE_SIZE` bytes.
    pub fn with_content(page_number: u64, content: &[u8]) -> Self {
        let mut page = Self::new(page_number);
        let state = page.state.get_mut();
        state.data[..content.len()].copy_from_slice(content);
        state.size = content.len();
        page
    }

    pub fn page_number(&self) -> u64 {
        self.page_number
    }

    pub async fn is_dirty(&self) -> bool {
        !self.state.read().await.clean
    }

    pub async fn used_size(&self) -> usize {
        self.state.read().await.size
    }

    /// Copy `data` into the buffer at `offset`, extending the used size
    /// when the write lands past it.
    pub async fn write(&self, offset: usize, data: &[u8]) {
        debug_assert!(offset + data.len() <= PAGE_SIZE);
        let mut state = self.state.write().await;
        state.data[offset..offset + data.len()].copy_from_slice(data);
        state.clean = false;
        if state.size < offset + data.len() {
            state.size = offset + data.len();
        }
    }

    /// Copy up to `dest.len()` bytes starting at `offset` into `dest`.
    /// Returns the bytes copied, zero when `offset` is at or past the
    /// used size.
    pub async fn read(&self, offset: usize, dest: &mut [u8]) -> usize {
        let state = self.state.read().await;
        let available = state.size.saturating_sub(offset);
        let n = available.min(dest.len());
        dest[..n].copy_from_slice(&state.data[offset..offset + n]);
        n
    }

    /// Shrink the used size; growing is a no-op.
    pub async fn truncate(&self, size: usize) {
        let mut state = self.state.write().await;
        if state.size > size {
            state.size = size;
            state.clean = false;
        }
    }

    /// Persist the page: PUT the used bytes under a fresh chunk key, then
    /// record it in the chunk map. A page flushed empty erases its chunk
    /// entry instead. Clean pages return immediately.
    pub async fn fsync(&self, source: &DataSource, ino: Ino) -> Result<(), FsError> {
        let mut state = self.state.write().await;
        if state.clean {
            return Ok(());
        }

        if state.size == 0 {
            source.meta.drop_chunk_meta(ino, self.page_number).await?;
            state.clean = true;
            return Ok(());
        }

        let path = chunk_path(ino, self.page_number);
        let payload = Bytes::copy_from_slice(&state.data[..state.size]);
        if let Err(e) = source.data.put(&path, payload).await {
            error!(ino, page = self.page_number, "chunk data put failed: {e}");
            return Err(e);
        }
        if let Err(e) = source
            .meta
            .set_chunk_meta(
                ino,
                self.page_number,
                self.page_number * PAGE_SIZE as u64,
                state.size as u64,
                &path,
            )
            .await
        {
            error!(ino, page = self.page_number, "chunk metadata update failed: {e}");
            return Err(e);
        }

        state.clean = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_extends_used_size_and_dirties() {
        let page = Page::new(0);
        assert!(!page.is_dirty().await);

        page.write(0, b"hello").await;
        assert!(page.is_dirty().await);
        assert_eq!(page.used_size().await, 5);

        // A write inside the used range does not shrink it.
        page.write(1, b"E").await;
        assert_eq!(page.used_size().await, 5);

        let mut buf = [0u8; 16];
        let n = page.read(0, &mut buf).await;
        assert_eq!(&buf[..n], b"hEllo");
    }

    #[tokio::test]
    async fn read_is_bounded_by_used_size() {
        let page = Page::new(0);
        page.write(0, b"abc").await;

        let mut buf = [0u8; 2];
        assert_eq!(page.read(0, &mut buf).await, 2);
        assert_eq!(&buf, b"ab");

        let mut buf = [0u8; 8];
        assert_eq!(page.read(3, &mut buf).await, 0);
        assert_eq!(page.read(100, &mut buf).await, 0);
    }

    #[tokio::test]
    async fn truncate_only_shrinks() {
        let page = Page::new(0);
        page.write(0, b"0123456789").await;

        page.truncate(4).await;
        assert_eq!(page.used_size().await, 4);

        page.truncate(100).await;
        assert_eq!(page.used_size().await, 4);
    }

    #[tokio::test]
    async fn loaded_page_starts_clean() {
        let page = Page::with_content(3, b"body");
        assert_eq!(page.page_number(), 3);
        assert_eq!(page.used_size().await, 4);
        assert!(!page.is_dirty().await);
    }
}
