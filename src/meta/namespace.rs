//! Namespace operations: node creation, hard links, unlink, rmdir, rename.

use tracing::{debug, error};

use super::{align4k, current_ids, keys, Attr, FileType, Ino, Meta};
use crate::errors::FsError;

impl Meta {
    /// Allocate a fresh inode id. The counter skips the root's id 1;
    /// wrapping it around is treated as fatal by callers up the stack.
    async fn next_inode(&self) -> Result<Ino, FsError> {
        let ino = self.kv().incr(keys::NEXT_INODE).await?;
        let ino = if ino == 1 {
            self.kv().incr(keys::NEXT_INODE).await?
        } else {
            ino
        };
        if ino <= 1 {
            error!(ino, "inode counter out of range");
            return Err(FsError::Io("inode counter out of range".into()));
        }
        Ok(ino as Ino)
    }

    /// Create a new inode of `typ` under `parent`. Seeds the attribute
    /// record, inserts the dentry and bumps the parent's link count.
    pub async fn mknod(
        &self,
        parent: Ino,
        typ: FileType,
        name: &str,
        mode: u32,
        rdev: u32,
    ) -> Result<(Attr, Ino), FsError> {
        let ino = self.next_inode().await?;

        let (uid, gid) = current_ids();
        let mut attr = Attr::new(typ, mode as u16, uid, gid, rdev);
        match typ {
            FileType::Directory => {
                attr.nlink = 2;
                attr.length = 4096;
            }
            FileType::Symlink => {
                attr.nlink = 1;
                attr.length = name.len() as u64;
            }
            _ => {
                attr.nlink = 1;
                attr.length = 0;
            }
        }

        if self.get_dentry(parent, name).await?.is_some() {
            return Err(FsError::Exists);
        }

        self.setattr_directly(ino, &attr).await?;
        self.set_dentry(parent, name, ino, typ).await?;
        self.ref_inode(parent).await?;

        debug!(parent, name, ino, ?typ, "mknod");
        Ok((attr, ino))
    }

    /// Hard-link `target` under `parent`/`name`. Directories are rejected.
    pub async fn link(&self, parent: Ino, target: Ino, name: &str) -> Result<Attr, FsError> {
        self.link_internal(parent, target, name, false).await
    }

    async fn link_internal(
        &self,
        parent: Ino,
        target: Ino,
        name: &str,
        allow_directory: bool,
    ) -> Result<Attr, FsError> {
        if self.get_dentry(parent, name).await?.is_some() {
            return Err(FsError::Exists);
        }

        let mut attr = self.getattr(target).await?;
        if !allow_directory && attr.typ.is_directory() {
            return Err(FsError::IsDirectory);
        }

        attr.nlink += 1;
        self.setattr_directly(target, &attr).await?;
        self.set_dentry(parent, name, target, attr.typ).await?;
        self.ref_inode(parent).await?;
        Ok(attr)
    }

    /// Remove the name and, when the last link goes away, the inode record
    /// with its chunk map, ref blob and space accounting.
    pub async fn unlink(&self, parent: Ino, name: &str) -> Result<(), FsError> {
        self.unlink_internal(parent, name, false).await
    }

    async fn unlink_internal(
        &self,
        parent: Ino,
        name: &str,
        allow_directory: bool,
    ) -> Result<(), FsError> {
        let dentry = self
            .get_dentry(parent, name)
            .await?
            .ok_or(FsError::NotFound)?;
        if !allow_directory && dentry.typ.is_directory() {
            return Err(FsError::IsDirectory);
        }

        let mut attr = self.getattr(dentry.ino).await?;
        attr.nlink -= 1;

        self.del_dentry(parent, name).await?;
        if attr.nlink == 0 {
            self.delete_inode(dentry.ino).await?;
            self.kv().del(&keys::chunk(dentry.ino)).await?;
            self.kv().del(&keys::git_ref(dentry.ino)).await?;
            if attr.typ == FileType::Regular && attr.length > 0 {
                self.update_used_space(-(align4k(attr.length) as i64))
                    .await?;
            }
        } else {
            self.setattr_directly(dentry.ino, &attr).await?;
        }

        let mut parent_attr = self.getattr(parent).await?;
        parent_attr.nlink -= 1;
        self.setattr_directly(parent, &parent_attr).await?;

        debug!(parent, name, ino = dentry.ino, "unlink");
        Ok(())
    }

    /// Remove an empty directory. `nlink == 2` is the emptiness test.
    pub async fn rmdir(&self, parent: Ino, name: &str) -> Result<(), FsError> {
        let dentry = self
            .get_dentry(parent, name)
            .await?
            .ok_or(FsError::NotFound)?;
        let attr = self.getattr(dentry.ino).await?;
        if !attr.typ.is_directory() {
            return Err(FsError::NotPermitted);
        }
        if attr.nlink != 2 {
            return Err(FsError::NotEmpty);
        }

        self.del_dentry(parent, name).await?;
        self.delete_inode(dentry.ino).await?;

        let mut parent_attr = self.getattr(parent).await?;
        parent_attr.nlink -= 1;
        self.setattr_directly(parent, &parent_attr).await?;

        debug!(parent, name, ino = dentry.ino, "rmdir");
        Ok(())
    }

    /// Move `old` under `parent` to `new` under `new_parent`.
    ///
    /// Internally link-new-then-unlink-old; a crash between the two leaves
    /// the inode reachable under both names. Not atomic across clients.
    pub async fn rename(
        &self,
        parent: Ino,
        old_name: &str,
        new_parent: Ino,
        new_name: &str,
    ) -> Result<(), FsError> {
        if parent == new_parent && old_name == new_name {
            return Ok(());
        }

        let dentry = self
            .get_dentry(parent, old_name)
            .await?
            .ok_or(FsError::NotFound)?;

        if let Some(existing) = self.get_dentry(new_parent, new_name).await? {
            if existing.typ.is_directory() {
                return Err(FsError::IsDirectory);
            }
            if dentry.typ.is_directory() {
                return Err(FsError::NotDirectory);
            }
            self.unlink(new_parent, new_name).await?;
        }

        self.link_internal(new_parent, dentry.ino, new_name, true)
            .await?;
        self.unlink_internal(parent, old_name, true).await?;
        Ok(())
    }
}
