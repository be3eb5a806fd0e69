use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error};

use super::{MemAttr, Page, PAGE_SIZE, POOL_PAGES};
use crate::errors::FsError;
use crate::meta::{align4k, Ino, SetAttrRequest};
use crate::store::DataSource;

/// Per-inode bounded page cache with write-back semantics.
///
/// `write`/`read`/`setattr` take the guard shared (pages carry their own
/// locks); `fsync` and truncation take it exclusively so a flush observes
/// every cached page without racing eviction.
pub struct Pool {
    ino: Ino,
    source: DataSource,
    guard: RwLock<()>,
    pages: Mutex<LruCache<u64, Arc<Page>>>,
    mem_attr: MemAttr,
}

impl Pool {
    pub async fn new(source: DataSource, ino: Ino) -> Result<Self, FsError> {
        let attr = source.meta.getattr(ino).await?;
        Ok(Self {
            ino,
            source,
            guard: RwLock::new(()),
            pages: Mutex::new(LruCache::new(
                NonZeroUsize::new(POOL_PAGES).expect("pool holds at least one page"),
            )),
            mem_attr: MemAttr::new(attr),
        })
    }

    pub fn mem_attr(&self) -> &MemAttr {
        &self.mem_attr
    }

    /// Write `data` at `off`, splitting across pages. Returns the bytes
    /// written; a failure mid-way reports the progress made.
    pub async fn write(&self, data: &[u8], off: u64) -> Result<u32, FsError> {
        let _guard = self.guard.read().await;

        let total = data.len() as u64;
        let mut left = total;
        let mut cur_offset = off;
        let mut data_offset = 0usize;

        while left > 0 {
            let page_number = cur_offset / PAGE_SIZE as u64;
            let page_offset = (cur_offset % PAGE_SIZE as u64) as usize;
            let len = ((PAGE_SIZE - page_offset) as u64).min(left) as usize;

            let page = match self.get_page(page_number).await {
                Ok(page) => page,
                Err(e) => {
                    let written = total - left;
                    if written > 0 {
                        return Ok(written as u32);
                    }
                    return Err(e);
                }
            };
            page.write(page_offset, &data[data_offset..data_offset + len])
                .await;

            left -= len as u64;
            data_offset += len;
            cur_offset = (page_number + 1) * PAGE_SIZE as u64;
            self.mem_attr.update_length_if_more(off + (total - left));
        }

        self.mem_attr.touch_mtime();
        Ok(total as u32)
    }

    /// Read into `dest` starting at `off`. Stops at end of file or when a
    /// page runs out before its boundary. Returns the bytes read.
    pub async fn read(&self, dest: &mut [u8], off: u64) -> Result<usize, FsError> {
        let _guard = self.guard.read().await;

        let file_length = self.mem_attr.length();
        let mut total = dest.len() as u64;
        if file_length < total {
            total = file_length;
        }

        let mut left = total;
        let mut cur_offset = off;
        let mut data_offset = 0usize;

        while left > 0 {
            let page_number = cur_offset / PAGE_SIZE as u64;
            let page_offset = (cur_offset % PAGE_SIZE as u64) as usize;

            let Some(page) = self.check_page(page_number).await? else {
                debug!(ino = self.ino, page_number, "chunk not found, stopping read");
                break;
            };

            let want = ((PAGE_SIZE - page_offset) as u64).min(left) as usize;
            let n = page
                .read(page_offset, &mut dest[data_offset..data_offset + want])
                .await;

            left -= n as u64;
            data_offset += n;
            cur_offset = (page_number + 1) * PAGE_SIZE as u64;

            if n < want {
                break;
            }
        }

        Ok((total - left) as usize)
    }

    /// Flush every cached page, persist the attribute overlay, and settle
    /// the chunk map and space accounting against the stored length.
    pub async fn fsync(&self) -> Result<(), FsError> {
        let _guard = self.guard.write().await;

        let mut attr = match self.source.meta.getattr(self.ino).await {
            Ok(attr) => attr,
            // Concurrent unlink: nothing durable left to update.
            Err(FsError::NotFound) => {
                debug!(ino = self.ino, "fsync: inode gone, ignoring");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        // Ascending page order: appends to the chunk list are only legal
        // at its tail.
        let mut pages: Vec<(u64, Arc<Page>)> = {
            let cache = self.pages.lock().await;
            cache
                .iter()
                .map(|(number, page)| (*number, page.clone()))
                .collect()
        };
        pages.sort_by_key(|(number, _)| *number);
        for (_, page) in pages {
            page.fsync(&self.source, self.ino).await?;
        }

        let old_length = attr.length;
        self.mem_attr.copy_to_attr(&mut attr);
        self.source.meta.setattr_directly(self.ino, &attr).await?;

        let new_length = attr.length;
        if new_length < old_length {
            self.source
                .meta
                .truncate_chunk_meta(
                    self.ino,
                    new_length / PAGE_SIZE as u64,
                    new_length % PAGE_SIZE as u64,
                )
                .await?;
        }
        let delta = align4k(new_length) as i64 - align4k(old_length) as i64;
        self.source.meta.update_used_space(delta).await?;

        Ok(())
    }

    /// Apply a setattr to the overlay; a shrink invalidates cached pages
    /// past the cut before the caller observes success.
    pub async fn setattr(&self, req: &SetAttrRequest) -> Result<(), FsError> {
        let _guard = self.guard.write().await;
        if let Some(size) = self.mem_attr.apply(req) {
            self.truncate_with_lock(size).await;
        }
        Ok(())
    }

    /// Drop cached pages beyond `size`. The caller holds the exclusive
    /// guard. The on-disk chunk map is untouched; fsync settles it.
    pub async fn truncate_with_lock(&self, size: u64) {
        let last_page = size / PAGE_SIZE as u64;
        let last_page_length = (size % PAGE_SIZE as u64) as usize;

        let mut cache = self.pages.lock().await;
        let cached: Vec<u64> = cache.iter().map(|(number, _)| *number).collect();
        for page_number in cached {
            if page_number > last_page || (last_page_length == 0 && page_number == last_page) {
                cache.pop(&page_number);
            } else if page_number == last_page {
                if let Some(page) = cache.peek(&page_number) {
                    page.clone().truncate(last_page_length).await;
                }
            }
        }
    }

    /// Truncate the cache from outside the pool's own lock discipline.
    pub async fn truncate(&self, size: u64) {
        let _guard = self.guard.write().await;
        self.truncate_with_lock(size).await;
    }

    /// Get the page for writing, loading it from the store on a miss. A
    /// page entirely past the current length starts fresh without a load.
    async fn get_page(&self, page_number: u64) -> Result<Arc<Page>, FsError> {
        let mut cache = self.pages.lock().await;
        if let Some(page) = cache.get(&page_number) {
            return Ok(page.clone());
        }

        let page = if self.beyond_length(page_number) {
            Arc::new(Page::new(page_number))
        } else {
            match self.load_page(page_number).await? {
                Some(page) => page,
                None => Arc::new(Page::new(page_number)),
            }
        };

        let evicted = cache.push(page_number, page.clone());
        drop(cache);
        self.write_back(evicted).await;
        Ok(page)
    }

    /// Like `get_page` but reports absence instead of allocating, for the
    /// read path.
    async fn check_page(&self, page_number: u64) -> Result<Option<Arc<Page>>, FsError> {
        if self.beyond_length(page_number) {
            return Ok(None);
        }

        let mut cache = self.pages.lock().await;
        if let Some(page) = cache.get(&page_number) {
            return Ok(Some(page.clone()));
        }

        let Some(page) = self.load_page(page_number).await? else {
            return Ok(None);
        };

        let evicted = cache.push(page_number, page.clone());
        drop(cache);
        self.write_back(evicted).await;
        Ok(Some(page))
    }

    fn beyond_length(&self, page_number: u64) -> bool {
        self.mem_attr.length() <= page_number * PAGE_SIZE as u64
    }

    /// Fetch the persisted chunk, if the chunk map has one.
    async fn load_page(&self, page_number: u64) -> Result<Option<Arc<Page>>, FsError> {
        let Some(chunk) = self
            .source
            .meta
            .get_chunk_meta(self.ino, page_number)
            .await?
        else {
            return Ok(None);
        };

        let content = self
            .source
            .data
            .get_range(&chunk.storage_path, 0, chunk.length)
            .await?;
        Ok(Some(Arc::new(Page::with_content(page_number, &content))))
    }

    /// Write-back-on-evict. Best effort: a failure loses the page and is
    /// only logged.
    async fn write_back(&self, evicted: Option<(u64, Arc<Page>)>) {
        if let Some((page_number, page)) = evicted {
            if let Err(e) = page.fsync(&self.source, self.ino).await {
                error!(ino = self.ino, page_number, "page write-back on evict failed: {e}");
            }
        }
    }
}
