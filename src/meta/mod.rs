//! Metadata engine: inodes, dentries, chunk maps and filesystem counters
//! over the key-value store.

pub mod attr;
pub mod chunk;
pub mod counters;
pub mod dir;
pub mod keys;
pub mod namespace;
pub mod refs;

use std::sync::Arc;

pub use attr::{Attr, FileType, SetAttrRequest};
pub use chunk::ChunkAttr;
pub use dir::Dentry;

use crate::errors::FsError;
use crate::store::kv::KvStore;

pub type Ino = u64;

pub const ROOT_INODE: Ino = 1;

/// Default capacity seeded for both `totalinode` and `totalspace`.
pub const DEFAULT_CAPACITY: u64 = 1 << 30;

/// `usedspace` accounting granularity.
const SPACE_ALIGNMENT: u64 = 4096;

pub fn align4k(length: u64) -> u64 {
    length.div_ceil(SPACE_ALIGNMENT) * SPACE_ALIGNMENT
}

/// Stateless per-call access to the metadata store. One instance is shared
/// by every node, file and pool in the mount.
pub struct Meta {
    kv: Arc<dyn KvStore>,
}

impl Meta {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub(crate) fn kv(&self) -> &dyn KvStore {
        self.kv.as_ref()
    }

    /// Create the root inode and capacity counters iff the root does not
    /// already exist. Safe to call on every mount.
    pub async fn init(&self) -> Result<(), FsError> {
        if self.kv.get(&keys::inode(ROOT_INODE)).await?.is_some() {
            return Ok(());
        }

        let (uid, gid) = current_ids();
        let mut root = Attr::new(FileType::Directory, 0o755, uid, gid, 0);
        root.nlink = 2;
        root.length = 4096;
        self.setattr_directly(ROOT_INODE, &root).await?;

        self.set_total_inode_count(DEFAULT_CAPACITY).await?;
        self.set_total_space(DEFAULT_CAPACITY).await?;
        Ok(())
    }
}

pub(crate) fn current_ids() -> (u32, u32) {
    // SAFETY: getuid/getgid are always safe to call.
    unsafe { (libc::getuid(), libc::getgid()) }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::store::kv::MemoryKv;

    pub async fn test_meta() -> Meta {
        let meta = Meta::new(Arc::new(MemoryKv::new()));
        meta.init().await.unwrap();
        meta
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::test_meta;
    use super::*;

    #[test]
    fn alignment() {
        assert_eq!(align4k(0), 0);
        assert_eq!(align4k(1), 4096);
        assert_eq!(align4k(4096), 4096);
        assert_eq!(align4k(4097), 8192);
    }

    #[tokio::test]
    async fn init_seeds_root_and_capacity() {
        let meta = test_meta().await;

        let root = meta.getattr(ROOT_INODE).await.unwrap();
        assert_eq!(root.typ, FileType::Directory);
        assert_eq!(root.mode, 0o755);
        assert_eq!(root.nlink, 2);
        assert_eq!(root.length, 4096);

        assert_eq!(meta.total_inode_count().await.unwrap(), DEFAULT_CAPACITY);
        assert_eq!(meta.total_space().await.unwrap(), DEFAULT_CAPACITY);
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let meta = test_meta().await;

        let (_, ino) = meta
            .mknod(ROOT_INODE, FileType::Regular, "probe", 0o644, 0)
            .await
            .unwrap();

        meta.init().await.unwrap();
        assert!(meta.getattr(ino).await.is_ok());
        let root = meta.getattr(ROOT_INODE).await.unwrap();
        assert_eq!(root.nlink, 3);
    }
}
