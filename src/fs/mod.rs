//! The filesystem proper: process-wide open-file registry, handle table,
//! node-kind dispatch and the FUSE surface.

pub mod file;
pub mod node;
pub mod ref_file;

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rfuse3::raw::{MountHandle, Session};
use rfuse3::MountOptions;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::FsError;
use crate::meta::{current_ids, Dentry, Ino, ROOT_INODE};
use crate::store::DataSource;
use file::OpenFile;
use node::NodeKind;

#[derive(Debug, Clone, Copy)]
pub struct NodeInfo {
    pub kind: NodeKind,
    pub parent: Ino,
}

/// A materialized directory listing, iterated by the kernel via its
/// readdir cookie.
pub struct DirSnapshot {
    pub entries: Vec<Dentry>,
}

/// The mounted filesystem. Owns the open-file registry; everything else
/// reaches storage through the shared [`DataSource`].
pub struct GitFs {
    source: DataSource,
    files: Mutex<HashMap<Ino, Arc<OpenFile>>>,
    handles: DashMap<u64, Arc<OpenFile>>,
    dir_handles: DashMap<u64, Arc<DirSnapshot>>,
    next_handle: AtomicU64,
    nodes: DashMap<Ino, NodeInfo>,
}

impl GitFs {
    /// Build the filesystem over an initialized data source. Bootstraps
    /// the root inode and verifies the object bucket is reachable.
    pub async fn new(source: DataSource) -> Result<Self, FsError> {
        source.meta.init().await?;
        source.data.init().await?;

        let fs = Self {
            source,
            files: Mutex::new(HashMap::new()),
            handles: DashMap::new(),
            dir_handles: DashMap::new(),
            next_handle: AtomicU64::new(1),
            nodes: DashMap::new(),
        };
        fs.register_node(ROOT_INODE, NodeKind::Regular, ROOT_INODE);
        Ok(fs)
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    pub(crate) fn register_node(&self, ino: Ino, kind: NodeKind, parent: Ino) {
        self.nodes.insert(ino, NodeInfo { kind, parent });
    }

    pub(crate) fn forget_node(&self, ino: Ino) {
        self.nodes.remove(&ino);
    }

    pub(crate) fn node_kind(&self, ino: Ino) -> NodeKind {
        self.nodes
            .get(&ino)
            .map(|info| info.kind)
            .unwrap_or(NodeKind::Regular)
    }

    pub(crate) fn parent_of(&self, ino: Ino) -> Ino {
        self.nodes
            .get(&ino)
            .map(|info| info.parent)
            .unwrap_or(ROOT_INODE)
    }

    /// Open `ino` through the page pool, constructing the shared file (and
    /// its background flusher) on first open. Returns a handle id.
    pub async fn open_file(&self, ino: Ino) -> Result<u64, FsError> {
        let mut files = self.files.lock().await;
        let file = match files.get(&ino) {
            Some(file) => file.clone(),
            None => {
                let file = OpenFile::paged(self.source.clone(), ino).await?;
                files.insert(ino, file.clone());
                file
            }
        };
        file.add_ref();
        drop(files);
        Ok(self.install_handle(file))
    }

    /// Open `ino` as a ref-store-backed file (HEAD-style symrefs and
    /// descendants of `refs/`).
    pub async fn open_ref_file(&self, ino: Ino) -> Result<u64, FsError> {
        let mut files = self.files.lock().await;
        let file = match files.get(&ino) {
            Some(file) => file.clone(),
            None => {
                let file = OpenFile::ref_backed(self.source.clone(), ino).await?;
                files.insert(ino, file.clone());
                file
            }
        };
        file.add_ref();
        drop(files);
        Ok(self.install_handle(file))
    }

    fn install_handle(&self, file: Arc<OpenFile>) -> u64 {
        let fh = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.handles.insert(fh, file);
        fh
    }

    pub(crate) fn handle(&self, fh: u64) -> Option<Arc<OpenFile>> {
        self.handles.get(&fh).map(|entry| entry.value().clone())
    }

    /// Look up the shared open file for `ino`, if any handle keeps it
    /// alive.
    pub(crate) async fn open_file_for(&self, ino: Ino) -> Option<Arc<OpenFile>> {
        self.files.lock().await.get(&ino).cloned()
    }

    /// Close one handle. The last close releases the inode from the
    /// registry and cancels its flusher.
    pub async fn release_handle(&self, fh: u64) -> Result<(), FsError> {
        let Some((_, file)) = self.handles.remove(&fh) else {
            return Err(FsError::NotFound);
        };

        let mut files = self.files.lock().await;
        let remaining = file.un_ref()?;
        if remaining == 0 {
            files.remove(&file.ino);
            file.shutdown();
        }
        debug!(ino = file.ino, fh, remaining, "release");
        Ok(())
    }

    pub(crate) fn install_dir_handle(&self, snapshot: DirSnapshot) -> u64 {
        let fh = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.dir_handles.insert(fh, Arc::new(snapshot));
        fh
    }

    pub(crate) fn dir_handle(&self, fh: u64) -> Option<Arc<DirSnapshot>> {
        self.dir_handles.get(&fh).map(|entry| entry.value().clone())
    }

    pub(crate) fn release_dir_handle(&self, fh: u64) {
        self.dir_handles.remove(&fh);
    }
}

/// Mount `fs` at `mountpoint` and hand back the session handle. Root
/// mounts enable allow-other with kernel-side permission checks.
pub async fn mount(fs: GitFs, mountpoint: &Path) -> std::io::Result<MountHandle> {
    let (uid, gid) = current_ids();

    let mut options = MountOptions::default();
    options.fs_name("tinygitfs").uid(uid).gid(gid);
    if uid == 0 {
        options.allow_other(true).default_permissions(true);
    }

    let session = Session::new(options);
    if uid == 0 {
        session.mount(fs, mountpoint).await
    } else {
        session.mount_with_unprivileged(fs, mountpoint).await
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::test_fs;
    use super::*;

    #[tokio::test]
    async fn handles_share_one_file_per_inode() {
        let fs = test_fs().await;
        let (_, ino) = fs
            .source()
            .meta
            .mknod(ROOT_INODE, crate::meta::FileType::Regular, "f", 0o644, 0)
            .await
            .unwrap();

        let fh1 = fs.open_file(ino).await.unwrap();
        let fh2 = fs.open_file(ino).await.unwrap();
        assert_ne!(fh1, fh2);

        let a = fs.handle(fh1).unwrap();
        let b = fs.handle(fh2).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        // Writes through one handle are visible through the other.
        a.write(b"shared", 0).await.unwrap();
        let mut buf = vec![0u8; 16];
        let n = b.read(&mut buf, 0).await.unwrap();
        assert_eq!(&buf[..n], b"shared");

        fs.release_handle(fh1).await.unwrap();
        assert!(fs.open_file_for(ino).await.is_some());
        fs.release_handle(fh2).await.unwrap();
        assert!(fs.open_file_for(ino).await.is_none());
    }

    #[tokio::test]
    async fn releasing_unknown_handle_fails() {
        let fs = test_fs().await;
        assert!(fs.release_handle(77).await.is_err());
    }
}
