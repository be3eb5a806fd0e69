//! Shared per-inode open state and the background flusher.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::error;

use super::ref_file::RefFile;
use crate::errors::FsError;
use crate::meta::{Attr, Ino, SetAttrRequest};
use crate::page::Pool;
use crate::store::DataSource;
use crate::task::spawn_named;

const FLUSH_PERIOD: Duration = Duration::from_secs(10);

/// How the bytes of this file are stored: through the page pool, or as a
/// single ref blob. Both sides answer the same handle capability set.
enum FileBackend {
    Paged(Arc<Pool>),
    Ref(RefFile),
}

/// One open file, shared by every handle on the inode. Carries a strictly
/// positive reference count while handles exist and a cancellable
/// background fsync for the paged case.
pub struct OpenFile {
    pub ino: Ino,
    source: DataSource,
    backend: FileBackend,
    refs: Mutex<i64>,
    cancel: CancellationToken,
}

impl OpenFile {
    pub async fn paged(source: DataSource, ino: Ino) -> Result<Arc<Self>, FsError> {
        let pool = Arc::new(Pool::new(source.clone(), ino).await?);
        let cancel = CancellationToken::new();
        spawn_flusher(ino, pool.clone(), cancel.clone());
        Ok(Arc::new(Self {
            ino,
            source,
            backend: FileBackend::Paged(pool),
            refs: Mutex::new(0),
            cancel,
        }))
    }

    pub async fn ref_backed(source: DataSource, ino: Ino) -> Result<Arc<Self>, FsError> {
        let file = RefFile::new(source.clone(), ino).await?;
        Ok(Arc::new(Self {
            ino,
            source,
            backend: FileBackend::Ref(file),
            refs: Mutex::new(0),
            cancel: CancellationToken::new(),
        }))
    }

    pub fn add_ref(&self) {
        *self.refs.lock().unwrap() += 1;
    }

    /// Drop one reference, returning how many remain. Going negative is an
    /// invariant violation.
    pub fn un_ref(&self) -> Result<i64, FsError> {
        let mut refs = self.refs.lock().unwrap();
        *refs -= 1;
        if *refs < 0 {
            error!(ino = self.ino, refs = *refs, "file ref count went negative");
            return Err(FsError::Io("file ref count went negative".into()));
        }
        Ok(*refs)
    }

    /// Stop the background flusher. Called once, when the last handle is
    /// released.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn pool(&self) -> Option<&Arc<Pool>> {
        match &self.backend {
            FileBackend::Paged(pool) => Some(pool),
            FileBackend::Ref(_) => None,
        }
    }

    pub async fn write(&self, data: &[u8], off: u64) -> Result<u32, FsError> {
        match &self.backend {
            FileBackend::Paged(pool) => pool.write(data, off).await,
            FileBackend::Ref(file) => Ok(file.write(data, off).await),
        }
    }

    pub async fn read(&self, dest: &mut [u8], off: u64) -> Result<usize, FsError> {
        match &self.backend {
            FileBackend::Paged(pool) => pool.read(dest, off).await,
            FileBackend::Ref(file) => Ok(file.read(dest, off).await),
        }
    }

    pub async fn fsync(&self) -> Result<(), FsError> {
        match &self.backend {
            FileBackend::Paged(pool) => pool.fsync().await,
            FileBackend::Ref(file) => file.fsync().await,
        }
    }

    /// Kernel-initiated flush on close; same work as fsync.
    pub async fn flush(&self) -> Result<(), FsError> {
        self.fsync().await
    }

    /// Stored attributes with the in-memory overlay applied.
    pub async fn getattr(&self) -> Result<Attr, FsError> {
        match &self.backend {
            FileBackend::Paged(pool) => {
                let mut attr = self.source.meta.getattr(self.ino).await?;
                pool.mem_attr().copy_to_attr(&mut attr);
                Ok(attr)
            }
            FileBackend::Ref(file) => file.getattr().await,
        }
    }

    pub async fn setattr(&self, req: &SetAttrRequest) -> Result<Attr, FsError> {
        match &self.backend {
            FileBackend::Paged(pool) => {
                pool.setattr(req).await?;

                // Size rides in the overlay until fsync; the rest is the
                // metadata engine's authoritative record.
                let mut meta_req = req.clone();
                meta_req.size = None;
                let mut attr = if meta_req.is_empty() {
                    self.source.meta.getattr(self.ino).await?
                } else {
                    self.source.meta.setattr_fields(self.ino, &meta_req).await?
                };
                pool.mem_attr().copy_to_attr(&mut attr);
                Ok(attr)
            }
            FileBackend::Ref(file) => file.setattr(req).await,
        }
    }
}

fn spawn_flusher(ino: Ino, pool: Arc<Pool>, cancel: CancellationToken) {
    spawn_named(&format!("flush-{ino}"), async move {
        let start = tokio::time::Instant::now() + FLUSH_PERIOD;
        let mut ticker = tokio::time::interval_at(start, FLUSH_PERIOD);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = pool.fsync().await {
                        error!(ino, "background page pool fsync failed: {e}");
                    }
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{FileType, Meta, ROOT_INODE};
    use crate::store::kv::MemoryKv;
    use crate::store::object::DataStore;

    async fn fixture() -> (DataSource, Ino) {
        let meta = Arc::new(Meta::new(Arc::new(MemoryKv::new())));
        meta.init().await.unwrap();
        let source = DataSource::new(meta, Arc::new(DataStore::new_in_memory()));
        let (_, ino) = source
            .meta
            .mknod(ROOT_INODE, FileType::Regular, "f", 0o644, 0)
            .await
            .unwrap();
        (source, ino)
    }

    #[tokio::test]
    async fn refcount_round_trip() {
        let (source, ino) = fixture().await;
        let file = OpenFile::paged(source, ino).await.unwrap();

        file.add_ref();
        file.add_ref();
        assert_eq!(file.un_ref().unwrap(), 1);
        assert_eq!(file.un_ref().unwrap(), 0);
        assert!(file.un_ref().is_err());
        file.shutdown();
    }

    #[tokio::test]
    async fn getattr_sees_unflushed_length() {
        let (source, ino) = fixture().await;
        let file = OpenFile::paged(source.clone(), ino).await.unwrap();

        file.write(b"not yet flushed", 0).await.unwrap();

        // The store still says zero, the handle already sees the write.
        assert_eq!(source.meta.getattr(ino).await.unwrap().length, 0);
        assert_eq!(file.getattr().await.unwrap().length, 15);

        file.fsync().await.unwrap();
        assert_eq!(source.meta.getattr(ino).await.unwrap().length, 15);
        file.shutdown();
    }

    #[tokio::test]
    async fn setattr_mode_is_durable_without_fsync() {
        let (source, ino) = fixture().await;
        let file = OpenFile::paged(source.clone(), ino).await.unwrap();

        let attr = file
            .setattr(&SetAttrRequest {
                mode: Some(0o600),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(attr.mode, 0o600);
        assert_eq!(source.meta.getattr(ino).await.unwrap().mode, 0o600);
        file.shutdown();
    }
}
