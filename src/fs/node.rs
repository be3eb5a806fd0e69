//! Node-kind dispatch and the FUSE protocol surface.
//!
//! Node kinds are chosen at lookup time from the parent's kind and the
//! child's name: a directory named `.git` becomes a repository node, its
//! HEAD-family children and everything under `refs/` route to the ref
//! store instead of the page pool.

use std::ffi::{OsStr, OsString};
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use rfuse3::raw::reply::{
    DirectoryEntry, DirectoryEntryPlus, FileAttr, ReplyAttr, ReplyCreated, ReplyData,
    ReplyDirectory, ReplyDirectoryPlus, ReplyEntry, ReplyInit, ReplyOpen, ReplyStatFs, ReplyWrite,
};
use rfuse3::raw::{Filesystem, Request};
use rfuse3::Result as FuseResult;
use rfuse3::{Errno, FileType as FuseFileType, SetAttr, Timestamp};
use tracing::{debug, error};

use super::{DirSnapshot, GitFs};
use crate::errors::FsError;
use crate::meta::{Attr, FileType, Ino, SetAttrRequest};
use crate::page::PAGE_SIZE;

const TTL: Duration = Duration::from_secs(1);
const NAME_LEN: u32 = 255;
const BLK_SIZE: u32 = 0x10000;

/// Git-style symbolic references living directly inside `.git/`.
const SYM_REF_NAMES: [&str; 6] = [
    "HEAD",
    "HEAD.lock",
    "FETCH_HEAD",
    "FETCH_HEAD.lock",
    "ORIG_HEAD",
    "ORIG_HEAD.lock",
];

/// Tagged node variant, replacing per-kind node objects with one dispatch
/// table keyed at lookup time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Ordinary file or directory.
    Regular,
    /// A directory named `.git`.
    GitRepo,
    /// `refs/` under a repository, and directories below it.
    GitRefs,
    /// A file below `refs/`, stored whole in the ref store.
    GitRef,
    /// HEAD-family files, stored whole in the ref store.
    GitSymRef,
}

impl NodeKind {
    /// Classify a child found under a node of this kind.
    pub fn child(self, name: &str, typ: FileType) -> NodeKind {
        if typ.is_directory() && name == ".git" {
            return NodeKind::GitRepo;
        }
        match self {
            NodeKind::GitRepo => {
                if !typ.is_directory() && SYM_REF_NAMES.contains(&name) {
                    NodeKind::GitSymRef
                } else if typ.is_directory() && name == "refs" {
                    NodeKind::GitRefs
                } else {
                    NodeKind::Regular
                }
            }
            NodeKind::GitRefs => {
                if typ.is_directory() {
                    NodeKind::GitRefs
                } else {
                    NodeKind::GitRef
                }
            }
            _ => NodeKind::Regular,
        }
    }

    /// Whether files of this kind bypass the page pool.
    pub fn is_ref_backed(self) -> bool {
        matches!(self, NodeKind::GitRef | NodeKind::GitSymRef)
    }
}

pub(crate) fn to_fuse_kind(typ: FileType) -> FuseFileType {
    match typ {
        FileType::Regular => FuseFileType::RegularFile,
        FileType::Directory => FuseFileType::Directory,
        FileType::Symlink => FuseFileType::Symlink,
        FileType::Fifo => FuseFileType::NamedPipe,
        FileType::BlockDevice => FuseFileType::BlockDevice,
        FileType::CharDevice => FuseFileType::CharDevice,
        FileType::Socket => FuseFileType::Socket,
    }
}

pub(crate) fn to_fuse_attr(ino: Ino, attr: &Attr) -> FileAttr {
    let size = match attr.typ {
        FileType::Regular | FileType::Directory | FileType::Symlink => attr.length,
        _ => 0,
    };
    let atime = Timestamp::new(attr.atime as i64, attr.atimensec);
    let mtime = Timestamp::new(attr.mtime as i64, attr.mtimensec);
    let ctime = Timestamp::new(attr.ctime as i64, attr.ctimensec);
    FileAttr {
        ino,
        size,
        blocks: (size + 511) >> 9,
        atime,
        mtime,
        ctime,
        #[cfg(target_os = "macos")]
        crtime: ctime,
        kind: to_fuse_kind(attr.typ),
        perm: attr.mode,
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        rdev: attr.rdev,
        #[cfg(target_os = "macos")]
        flags: 0,
        blksize: BLK_SIZE,
    }
}

fn to_setattr_request(set_attr: &SetAttr) -> SetAttrRequest {
    SetAttrRequest {
        mode: set_attr.mode,
        uid: set_attr.uid,
        gid: set_attr.gid,
        size: set_attr.size,
        atime: set_attr.atime.map(|t| (t.sec as u64, t.nsec)),
        ctime: set_attr.ctime.map(|t| (t.sec as u64, t.nsec)),
    }
}

impl GitFs {
    fn reply_entry(&self, ino: Ino, attr: &Attr) -> ReplyEntry {
        ReplyEntry {
            ttl: TTL,
            attr: to_fuse_attr(ino, attr),
            generation: 1,
        }
    }

    /// Materialize a directory listing with `.` and `..` in front; entry
    /// offsets are resume cookies for the kernel.
    async fn dir_listing(
        &self,
        ino: Ino,
        snapshot: Option<&DirSnapshot>,
    ) -> Result<Vec<(Ino, FileType, OsString, i64)>, FsError> {
        let mut listing = vec![
            (ino, FileType::Directory, OsString::from("."), 1),
            (
                self.parent_of(ino),
                FileType::Directory,
                OsString::from(".."),
                2,
            ),
        ];

        let fetched;
        let entries = match snapshot {
            Some(snapshot) => &snapshot.entries,
            None => {
                fetched = self.source().meta.get_all_dentries(ino).await?;
                &fetched
            }
        };
        for (index, dentry) in entries.iter().enumerate() {
            listing.push((
                dentry.ino,
                dentry.typ,
                OsString::from(dentry.name.clone()),
                index as i64 + 3,
            ));
        }
        Ok(listing)
    }

    /// Setattr without an open handle: write straight to the metadata
    /// engine, invalidating any cached pages past a shrink first.
    async fn setattr_node(&self, ino: Ino, req: &SetAttrRequest) -> Result<Attr, FsError> {
        let meta = &self.source().meta;

        if self.node_kind(ino).is_ref_backed() {
            let mut attr = meta.getattr(ino).await?;
            req.apply_without_size(&mut attr);
            if let Some(size) = req.size {
                attr.length = size;
                if let Some(data) = meta.ref_get(ino).await? {
                    if data.len() as u64 > size {
                        meta.ref_set(ino, &data[..size as usize]).await?;
                    }
                }
            }
            meta.setattr_directly(ino, &attr).await?;
            return Ok(attr);
        }

        if let Some(size) = req.size {
            let current = meta.getattr(ino).await?.length;
            if size < current {
                if let Some(file) = self.open_file_for(ino).await {
                    if let Some(pool) = file.pool() {
                        pool.truncate(size).await;
                        pool.mem_attr().update_length(size);
                    }
                }
            }
        }
        meta.setattr_fields(ino, req).await
    }
}

#[allow(refining_impl_trait_reachable)]
impl Filesystem for GitFs {
    async fn init(&self, _req: Request) -> FuseResult<ReplyInit> {
        Ok(ReplyInit::default())
    }

    async fn destroy(&self, _req: Request) {}

    async fn lookup(&self, _req: Request, parent: u64, name: &OsStr) -> FuseResult<ReplyEntry> {
        let name = name.to_string_lossy();
        debug!(parent, name = %name, "lookup");

        let dentry = self
            .source()
            .meta
            .get_dentry(parent, &name)
            .await
            .map_err(Errno::from)?
            .ok_or_else(|| Errno::from(libc::ENOENT))?;
        let attr = self
            .source()
            .meta
            .getattr(dentry.ino)
            .await
            .map_err(Errno::from)?;

        let kind = self.node_kind(parent).child(&name, attr.typ);
        self.register_node(dentry.ino, kind, parent);

        Ok(self.reply_entry(dentry.ino, &attr))
    }

    async fn getattr(
        &self,
        _req: Request,
        ino: u64,
        fh: Option<u64>,
        _flags: u32,
    ) -> FuseResult<ReplyAttr> {
        debug!(ino, fh = ?fh, "getattr");

        let attr = match fh.and_then(|fh| self.handle(fh)) {
            Some(file) => file.getattr().await.map_err(Errno::from)?,
            None => self.source().meta.getattr(ino).await.map_err(Errno::from)?,
        };
        Ok(ReplyAttr {
            ttl: TTL,
            attr: to_fuse_attr(ino, &attr),
        })
    }

    async fn setattr(
        &self,
        _req: Request,
        ino: u64,
        fh: Option<u64>,
        set_attr: SetAttr,
    ) -> FuseResult<ReplyAttr> {
        debug!(ino, fh = ?fh, set_attr = ?set_attr, "setattr");

        let req = to_setattr_request(&set_attr);
        let attr = match fh.and_then(|fh| self.handle(fh)) {
            Some(file) => file.setattr(&req).await.map_err(Errno::from)?,
            None => self.setattr_node(ino, &req).await.map_err(Errno::from)?,
        };
        Ok(ReplyAttr {
            ttl: TTL,
            attr: to_fuse_attr(ino, &attr),
        })
    }

    async fn mknod(
        &self,
        _req: Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        rdev: u32,
    ) -> FuseResult<ReplyEntry> {
        let name = name.to_string_lossy();
        debug!(parent, name = %name, mode, rdev, "mknod");

        let typ = FileType::from_mode(mode).ok_or_else(|| Errno::from(libc::EPERM))?;
        let (attr, ino) = self
            .source()
            .meta
            .mknod(parent, typ, &name, mode & 0o7777, rdev)
            .await
            .map_err(Errno::from)?;

        let kind = self.node_kind(parent).child(&name, typ);
        self.register_node(ino, kind, parent);

        Ok(self.reply_entry(ino, &attr))
    }

    async fn mkdir(
        &self,
        _req: Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
    ) -> FuseResult<ReplyEntry> {
        let name = name.to_string_lossy();
        debug!(parent, name = %name, mode, umask, "mkdir");

        let mode = (mode & 0o7777) & !(umask & 0o777);
        let (attr, ino) = self
            .source()
            .meta
            .mknod(parent, FileType::Directory, &name, mode, 0)
            .await
            .map_err(Errno::from)?;

        let kind = self.node_kind(parent).child(&name, FileType::Directory);
        self.register_node(ino, kind, parent);

        Ok(self.reply_entry(ino, &attr))
    }

    async fn create(
        &self,
        _req: Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        flags: u32,
    ) -> FuseResult<ReplyCreated> {
        let name = name.to_string_lossy();
        debug!(parent, name = %name, mode, flags, "create");

        let (attr, ino) = self
            .source()
            .meta
            .mknod(parent, FileType::Regular, &name, mode & 0o7777, 0)
            .await
            .map_err(Errno::from)?;

        let kind = self.node_kind(parent).child(&name, FileType::Regular);
        self.register_node(ino, kind, parent);

        let fh = if kind.is_ref_backed() {
            self.open_ref_file(ino).await.map_err(Errno::from)?
        } else {
            self.open_file(ino).await.map_err(Errno::from)?
        };

        Ok(ReplyCreated {
            ttl: TTL,
            attr: to_fuse_attr(ino, &attr),
            generation: 1,
            fh,
            flags: 0,
        })
    }

    async fn open(&self, _req: Request, ino: u64, flags: u32) -> FuseResult<ReplyOpen> {
        debug!(ino, flags, "open");

        let attr = self.source().meta.getattr(ino).await.map_err(Errno::from)?;
        if attr.typ.is_directory() {
            return Err(libc::EISDIR.into());
        }

        let fh = if self.node_kind(ino).is_ref_backed() {
            self.open_ref_file(ino).await.map_err(Errno::from)?
        } else {
            self.open_file(ino).await.map_err(Errno::from)?
        };
        Ok(ReplyOpen { fh, flags })
    }

    async fn read(
        &self,
        _req: Request,
        ino: u64,
        fh: u64,
        offset: u64,
        size: u32,
    ) -> FuseResult<ReplyData> {
        debug!(ino, fh, offset, size, "read");

        let file = self.handle(fh).ok_or_else(|| Errno::from(libc::EBADF))?;
        let mut buf = vec![0u8; size as usize];
        let n = file.read(&mut buf, offset).await.map_err(|e| {
            error!(ino, "page pool read failed: {e}");
            Errno::from(libc::EIO)
        })?;
        buf.truncate(n);
        Ok(ReplyData {
            data: Bytes::from(buf),
        })
    }

    async fn write(
        &self,
        _req: Request,
        ino: u64,
        fh: u64,
        offset: u64,
        data: &[u8],
        _write_flags: u32,
        _flags: u32,
    ) -> FuseResult<ReplyWrite> {
        debug!(ino, fh, offset, len = data.len(), "write");

        let file = self.handle(fh).ok_or_else(|| Errno::from(libc::EBADF))?;
        let written = file.write(data, offset).await.map_err(|e| {
            error!(ino, "page pool write failed: {e}");
            Errno::from(libc::EIO)
        })?;
        Ok(ReplyWrite { written })
    }

    async fn flush(&self, _req: Request, ino: u64, fh: u64, _lock_owner: u64) -> FuseResult<()> {
        debug!(ino, fh, "flush");
        let file = self.handle(fh).ok_or_else(|| Errno::from(libc::EBADF))?;
        file.flush().await.map_err(|e| {
            error!(ino, "flush failed: {e}");
            Errno::from(libc::EIO)
        })
    }

    async fn fsync(&self, _req: Request, ino: u64, fh: u64, _datasync: bool) -> FuseResult<()> {
        debug!(ino, fh, "fsync");
        let file = self.handle(fh).ok_or_else(|| Errno::from(libc::EBADF))?;
        file.fsync().await.map_err(|e| {
            error!(ino, "fsync failed: {e}");
            Errno::from(libc::EIO)
        })
    }

    async fn release(
        &self,
        _req: Request,
        ino: u64,
        fh: u64,
        _flags: u32,
        _lock_owner: u64,
        _flush: bool,
    ) -> FuseResult<()> {
        debug!(ino, fh, "release");
        self.release_handle(fh).await.map_err(Errno::from)
    }

    async fn opendir(&self, _req: Request, ino: u64, _flags: u32) -> FuseResult<ReplyOpen> {
        debug!(ino, "opendir");

        let attr = self.source().meta.getattr(ino).await.map_err(Errno::from)?;
        if !attr.typ.is_directory() {
            return Err(libc::ENOTDIR.into());
        }

        let entries = self
            .source()
            .meta
            .get_all_dentries(ino)
            .await
            .map_err(Errno::from)?;
        let fh = self.install_dir_handle(DirSnapshot { entries });
        Ok(ReplyOpen { fh, flags: 0 })
    }

    async fn readdir<'a>(
        &'a self,
        _req: Request,
        ino: u64,
        fh: u64,
        offset: i64,
    ) -> FuseResult<ReplyDirectory<BoxStream<'a, FuseResult<DirectoryEntry>>>> {
        debug!(ino, fh, offset, "readdir");

        let snapshot = self.dir_handle(fh);
        let listing = self
            .dir_listing(ino, snapshot.as_deref())
            .await
            .map_err(Errno::from)?;

        let entries: Vec<DirectoryEntry> = listing
            .into_iter()
            .filter(|(_, _, _, cookie)| *cookie > offset)
            .map(|(ino, typ, name, cookie)| DirectoryEntry {
                inode: ino,
                kind: to_fuse_kind(typ),
                name,
                offset: cookie,
            })
            .collect();

        let boxed: BoxStream<'a, FuseResult<DirectoryEntry>> =
            Box::pin(stream::iter(entries.into_iter().map(Ok)));
        Ok(ReplyDirectory { entries: boxed })
    }

    async fn readdirplus<'a>(
        &'a self,
        _req: Request,
        ino: u64,
        fh: u64,
        offset: u64,
        _lock_owner: u64,
    ) -> FuseResult<ReplyDirectoryPlus<BoxStream<'a, FuseResult<DirectoryEntryPlus>>>> {
        debug!(ino, fh, offset, "readdirplus");

        let snapshot = self.dir_handle(fh);
        let listing = self
            .dir_listing(ino, snapshot.as_deref())
            .await
            .map_err(Errno::from)?;

        let mut entries = Vec::with_capacity(listing.len());
        for (entry_ino, typ, name, cookie) in listing {
            if cookie <= offset as i64 {
                continue;
            }
            let attr = match self.source().meta.getattr(entry_ino).await {
                Ok(attr) => attr,
                Err(FsError::NotFound) => continue,
                Err(e) => return Err(e.into()),
            };
            entries.push(DirectoryEntryPlus {
                inode: entry_ino,
                generation: 1,
                kind: to_fuse_kind(typ),
                name,
                offset: cookie,
                attr: to_fuse_attr(entry_ino, &attr),
                entry_ttl: TTL,
                attr_ttl: TTL,
            });
        }

        let boxed: BoxStream<'a, FuseResult<DirectoryEntryPlus>> =
            Box::pin(stream::iter(entries.into_iter().map(Ok)));
        Ok(ReplyDirectoryPlus { entries: boxed })
    }

    async fn releasedir(&self, _req: Request, ino: u64, fh: u64, _flags: u32) -> FuseResult<()> {
        debug!(ino, fh, "releasedir");
        self.release_dir_handle(fh);
        Ok(())
    }

    async fn fsyncdir(&self, _req: Request, _ino: u64, _fh: u64, _datasync: bool) -> FuseResult<()> {
        Ok(())
    }

    async fn statfs(&self, _req: Request, _ino: u64) -> FuseResult<ReplyStatFs> {
        let meta = &self.source().meta;
        let total_inodes = meta.total_inode_count().await.map_err(Errno::from)?;
        let cur_inodes = meta.cur_inode_count().await.map_err(Errno::from)?;
        let used_space = meta.used_space().await.map_err(Errno::from)?;
        let total_space = meta.total_space().await.map_err(Errno::from)?;

        let bsize = PAGE_SIZE as u32;
        let bfree = total_space.saturating_sub(used_space) / PAGE_SIZE as u64;
        debug!(
            total_inodes,
            cur_inodes, used_space, total_space, "statfs"
        );

        Ok(ReplyStatFs {
            blocks: total_space / PAGE_SIZE as u64,
            bfree,
            bavail: bfree,
            files: total_inodes,
            ffree: total_inodes.saturating_sub(cur_inodes),
            bsize,
            namelen: NAME_LEN,
            frsize: bsize,
        })
    }

    /// Bit test against the mode triads. Succeeds when any of the
    /// owner/group/other triads carries every requested bit; the caller's
    /// uid/gid are not consulted.
    async fn access(&self, _req: Request, ino: u64, mask: u32) -> FuseResult<()> {
        debug!(ino, mask, "access");

        let attr = self.source().meta.getattr(ino).await.map_err(Errno::from)?;
        let wanted = mask & 0o7;
        if wanted == 0 {
            return Ok(());
        }

        let mode = u32::from(attr.mode);
        for shift in [6u32, 3, 0] {
            if (mode >> shift) & wanted == wanted {
                return Ok(());
            }
        }
        Err(libc::EACCES.into())
    }

    async fn link(
        &self,
        _req: Request,
        ino: u64,
        new_parent: u64,
        new_name: &OsStr,
    ) -> FuseResult<ReplyEntry> {
        let new_name = new_name.to_string_lossy();
        debug!(ino, new_parent, new_name = %new_name, "link");

        let attr = self
            .source()
            .meta
            .link(new_parent, ino, &new_name)
            .await
            .map_err(Errno::from)?;

        let kind = self.node_kind(new_parent).child(&new_name, attr.typ);
        self.register_node(ino, kind, new_parent);

        Ok(self.reply_entry(ino, &attr))
    }

    async fn symlink(
        &self,
        _req: Request,
        parent: u64,
        name: &OsStr,
        link: &OsStr,
    ) -> FuseResult<ReplyEntry> {
        let name = name.to_string_lossy();
        let target = link.to_string_lossy();
        debug!(parent, name = %name, target = %target, "symlink");

        let meta = &self.source().meta;
        let (_, ino) = meta
            .mknod(parent, FileType::Symlink, &name, 0o777, 0)
            .await
            .map_err(Errno::from)?;
        meta.ref_set(ino, target.as_bytes())
            .await
            .map_err(Errno::from)?;

        let mut attr = meta.getattr(ino).await.map_err(Errno::from)?;
        attr.length = target.len() as u64;
        meta.setattr_directly(ino, &attr)
            .await
            .map_err(Errno::from)?;

        self.register_node(ino, NodeKind::Regular, parent);
        Ok(self.reply_entry(ino, &attr))
    }

    async fn readlink(&self, _req: Request, ino: u64) -> FuseResult<ReplyData> {
        debug!(ino, "readlink");

        let target = self
            .source()
            .meta
            .ref_get(ino)
            .await
            .map_err(Errno::from)?
            .ok_or_else(|| Errno::from(libc::ENOENT))?;
        Ok(ReplyData {
            data: Bytes::from(target),
        })
    }

    async fn unlink(&self, _req: Request, parent: u64, name: &OsStr) -> FuseResult<()> {
        let name = name.to_string_lossy();
        debug!(parent, name = %name, "unlink");

        let dentry = self
            .source()
            .meta
            .get_dentry(parent, &name)
            .await
            .map_err(Errno::from)?
            .ok_or_else(|| Errno::from(libc::ENOENT))?;

        self.source()
            .meta
            .unlink(parent, &name)
            .await
            .map_err(Errno::from)?;

        if matches!(
            self.source().meta.getattr(dentry.ino).await,
            Err(FsError::NotFound)
        ) {
            self.forget_node(dentry.ino);
        }
        Ok(())
    }

    async fn rmdir(&self, _req: Request, parent: u64, name: &OsStr) -> FuseResult<()> {
        let name = name.to_string_lossy();
        debug!(parent, name = %name, "rmdir");

        let dentry = self
            .source()
            .meta
            .get_dentry(parent, &name)
            .await
            .map_err(Errno::from)?
            .ok_or_else(|| Errno::from(libc::ENOENT))?;

        self.source()
            .meta
            .rmdir(parent, &name)
            .await
            .map_err(Errno::from)?;
        self.forget_node(dentry.ino);
        Ok(())
    }

    async fn rename(
        &self,
        _req: Request,
        parent: u64,
        name: &OsStr,
        new_parent: u64,
        new_name: &OsStr,
    ) -> FuseResult<()> {
        let name = name.to_string_lossy();
        let new_name = new_name.to_string_lossy();
        debug!(parent, name = %name, new_parent, new_name = %new_name, "rename");

        let dentry = self
            .source()
            .meta
            .get_dentry(parent, &name)
            .await
            .map_err(Errno::from)?
            .ok_or_else(|| Errno::from(libc::ENOENT))?;

        self.source()
            .meta
            .rename(parent, &name, new_parent, &new_name)
            .await
            .map_err(Errno::from)?;

        // The node may classify differently under its new name.
        let kind = self.node_kind(new_parent).child(&new_name, dentry.typ);
        self.register_node(dentry.ino, kind, new_parent);
        Ok(())
    }

    async fn forget(&self, _req: Request, _ino: u64, _nlookup: u64) {}

    async fn batch_forget(&self, _req: Request, _inodes: &[(u64, u64)]) {}

    async fn interrupt(&self, _req: Request, _unique: u64) -> FuseResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_repo_children_classify() {
        let repo = NodeKind::GitRepo;
        assert_eq!(repo.child("HEAD", FileType::Regular), NodeKind::GitSymRef);
        assert_eq!(
            repo.child("ORIG_HEAD.lock", FileType::Regular),
            NodeKind::GitSymRef
        );
        assert_eq!(repo.child("refs", FileType::Directory), NodeKind::GitRefs);
        assert_eq!(repo.child("config", FileType::Regular), NodeKind::Regular);
        assert_eq!(repo.child("objects", FileType::Directory), NodeKind::Regular);
        // A directory that happens to be called HEAD is nothing special.
        assert_eq!(repo.child("HEAD", FileType::Directory), NodeKind::Regular);
    }

    #[test]
    fn refs_subtree_classifies() {
        let refs = NodeKind::GitRefs;
        assert_eq!(refs.child("heads", FileType::Directory), NodeKind::GitRefs);
        assert_eq!(refs.child("main", FileType::Regular), NodeKind::GitRef);
    }

    #[test]
    fn dot_git_directory_becomes_repo() {
        assert_eq!(
            NodeKind::Regular.child(".git", FileType::Directory),
            NodeKind::GitRepo
        );
        assert_eq!(
            NodeKind::Regular.child(".git", FileType::Regular),
            NodeKind::Regular
        );
        assert_eq!(
            NodeKind::GitRefs.child(".git", FileType::Directory),
            NodeKind::GitRepo
        );
    }

    #[test]
    fn ref_backed_kinds() {
        assert!(NodeKind::GitRef.is_ref_backed());
        assert!(NodeKind::GitSymRef.is_ref_backed());
        assert!(!NodeKind::Regular.is_ref_backed());
        assert!(!NodeKind::GitRepo.is_ref_backed());
        assert!(!NodeKind::GitRefs.is_ref_backed());
    }

    #[test]
    fn fuse_attr_conversion() {
        let mut attr = Attr::new(FileType::Regular, 0o644, 1000, 1000, 0);
        attr.length = 1024;
        attr.nlink = 1;

        let fattr = to_fuse_attr(42, &attr);
        assert_eq!(fattr.ino, 42);
        assert_eq!(fattr.size, 1024);
        assert_eq!(fattr.blocks, 2);
        assert_eq!(fattr.perm, 0o644);
        assert_eq!(fattr.uid, 1000);
        assert!(matches!(fattr.kind, FuseFileType::RegularFile));

        let dir = Attr::new(FileType::Directory, 0o755, 0, 0, 0);
        assert!(matches!(
            to_fuse_attr(1, &dir).kind,
            FuseFileType::Directory
        ));
    }
}
