use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::{keys, Ino, Meta};
use crate::errors::FsError;

/// Node type, wire-encoded as a small integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum FileType {
    Regular = 1,
    Directory = 2,
    Symlink = 3,
    Fifo = 4,
    BlockDevice = 5,
    CharDevice = 6,
    Socket = 7,
}

impl From<FileType> for u8 {
    fn from(typ: FileType) -> Self {
        typ as u8
    }
}

impl TryFrom<u8> for FileType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FileType::Regular),
            2 => Ok(FileType::Directory),
            3 => Ok(FileType::Symlink),
            4 => Ok(FileType::Fifo),
            5 => Ok(FileType::BlockDevice),
            6 => Ok(FileType::CharDevice),
            7 => Ok(FileType::Socket),
            other => Err(format!("unknown file type {other}")),
        }
    }
}

impl FileType {
    /// Extract the node type from a full `st_mode`.
    pub fn from_mode(mode: u32) -> Option<FileType> {
        match mode & libc::S_IFMT {
            libc::S_IFREG => Some(FileType::Regular),
            libc::S_IFDIR => Some(FileType::Directory),
            libc::S_IFLNK => Some(FileType::Symlink),
            libc::S_IFIFO => Some(FileType::Fifo),
            libc::S_IFBLK => Some(FileType::BlockDevice),
            libc::S_IFCHR => Some(FileType::CharDevice),
            libc::S_IFSOCK => Some(FileType::Socket),
            _ => None,
        }
    }

    pub fn is_directory(self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// Inode record, JSON-serialized under `i<ino>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attr {
    #[serde(default)]
    pub flags: u8,
    #[serde(rename = "type")]
    pub typ: FileType,
    #[serde(default)]
    pub mode: u16,
    #[serde(default)]
    pub uid: u32,
    #[serde(default)]
    pub gid: u32,
    #[serde(default)]
    pub atime: u64,
    #[serde(default)]
    pub mtime: u64,
    #[serde(default)]
    pub ctime: u64,
    #[serde(default)]
    pub atimensec: u32,
    #[serde(default)]
    pub mtimensec: u32,
    #[serde(default)]
    pub ctimensec: u32,
    #[serde(default)]
    pub nlink: u32,
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub rdev: u32,
}

impl Attr {
    /// Seed a fresh record with all three timestamps set to now.
    pub fn new(typ: FileType, mode: u16, uid: u32, gid: u32, rdev: u32) -> Self {
        let (secs, nanos) = now();
        Self {
            flags: 0,
            typ,
            mode,
            uid,
            gid,
            atime: secs,
            mtime: secs,
            ctime: secs,
            atimensec: nanos,
            mtimensec: nanos,
            ctimensec: nanos,
            nlink: 0,
            length: 0,
            rdev,
        }
    }

    pub fn touch_mtime(&mut self) {
        let (secs, nanos) = now();
        self.mtime = secs;
        self.mtimensec = nanos;
        self.atime = secs;
        self.atimensec = nanos;
    }
}

pub fn now() -> (u64, u32) {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (elapsed.as_secs(), elapsed.subsec_nanos())
}

/// Partial attribute update from a kernel setattr.
#[derive(Debug, Clone, Default)]
pub struct SetAttrRequest {
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub size: Option<u64>,
    pub atime: Option<(u64, u32)>,
    pub ctime: Option<(u64, u32)>,
}

impl SetAttrRequest {
    pub fn is_empty(&self) -> bool {
        self.mode.is_none()
            && self.uid.is_none()
            && self.gid.is_none()
            && self.size.is_none()
            && self.atime.is_none()
            && self.ctime.is_none()
    }

    /// Apply everything except the size, which the callers handle because
    /// it has cache and chunk-map consequences.
    pub fn apply_without_size(&self, attr: &mut Attr) {
        if let Some((secs, nanos)) = self.atime {
            attr.atime = secs;
            attr.atimensec = nanos;
        }
        if let Some((secs, nanos)) = self.ctime {
            attr.ctime = secs;
            attr.ctimensec = nanos;
        }
        if let Some(uid) = self.uid {
            attr.uid = uid;
        }
        if let Some(gid) = self.gid {
            attr.gid = gid;
        }
        if let Some(mode) = self.mode {
            attr.mode = mode as u16;
        }
    }
}

impl Meta {
    pub async fn getattr(&self, ino: Ino) -> Result<Attr, FsError> {
        let data = self
            .kv()
            .get(&keys::inode(ino))
            .await?
            .ok_or(FsError::NotFound)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Whole-record replace.
    pub async fn setattr_directly(&self, ino: Ino, attr: &Attr) -> Result<(), FsError> {
        let data = serde_json::to_vec(attr)?;
        self.kv().set(&keys::inode(ino), &data).await?;
        Ok(())
    }

    /// Read-apply-write of the fields a kernel setattr may carry. A shrink
    /// trims the chunk map before the record is rewritten.
    pub async fn setattr_fields(&self, ino: Ino, req: &SetAttrRequest) -> Result<Attr, FsError> {
        let mut attr = self.getattr(ino).await?;
        req.apply_without_size(&mut attr);
        if let Some(size) = req.size {
            if size < attr.length {
                let last_page = size / crate::page::PAGE_SIZE as u64;
                let last_page_length = size % crate::page::PAGE_SIZE as u64;
                self.truncate_chunk_meta(ino, last_page, last_page_length)
                    .await?;
            }
            attr.length = size;
        }
        self.setattr_directly(ino, &attr).await?;
        Ok(attr)
    }

    /// Bump `nlink` by one (a new dentry points here).
    pub(crate) async fn ref_inode(&self, ino: Ino) -> Result<(), FsError> {
        let mut attr = self.getattr(ino).await?;
        attr.nlink += 1;
        self.setattr_directly(ino, &attr).await
    }

    pub(crate) async fn delete_inode(&self, ino: Ino) -> Result<(), FsError> {
        self.kv().del(&keys::inode(ino)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::test_support::test_meta;
    use crate::meta::ROOT_INODE;

    #[test]
    fn file_type_wire_codes() {
        assert_eq!(u8::from(FileType::Regular), 1);
        assert_eq!(u8::from(FileType::Socket), 7);
        assert_eq!(FileType::try_from(2).unwrap(), FileType::Directory);
        assert!(FileType::try_from(0).is_err());
        assert!(FileType::try_from(8).is_err());
    }

    #[test]
    fn file_type_from_mode() {
        assert_eq!(FileType::from_mode(libc::S_IFREG | 0o644), Some(FileType::Regular));
        assert_eq!(FileType::from_mode(libc::S_IFDIR | 0o755), Some(FileType::Directory));
        assert_eq!(FileType::from_mode(libc::S_IFIFO), Some(FileType::Fifo));
        assert_eq!(FileType::from_mode(0o644), None);
    }

    #[test]
    fn attr_json_roundtrip() {
        let attr = Attr::new(FileType::Regular, 0o644, 1000, 1000, 0);
        let data = serde_json::to_vec(&attr).unwrap();
        let parsed: Attr = serde_json::from_slice(&data).unwrap();
        assert_eq!(parsed.typ, FileType::Regular);
        assert_eq!(parsed.mode, 0o644);
        assert_eq!(parsed.atime, attr.atime);

        // The type tag rides in the "type" field as an integer.
        let value: serde_json::Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(value["type"], 1);
    }

    #[tokio::test]
    async fn getattr_missing_is_not_found() {
        let meta = test_meta().await;
        assert!(matches!(meta.getattr(999).await, Err(FsError::NotFound)));
    }

    #[tokio::test]
    async fn setattr_fields_applies_subset() {
        let meta = test_meta().await;
        let (_, ino) = meta
            .mknod(ROOT_INODE, FileType::Regular, "f", 0o644, 0)
            .await
            .unwrap();

        let req = SetAttrRequest {
            mode: Some(0o600),
            uid: Some(7),
            ..Default::default()
        };
        let attr = meta.setattr_fields(ino, &req).await.unwrap();
        assert_eq!(attr.mode, 0o600);
        assert_eq!(attr.uid, 7);

        let reread = meta.getattr(ino).await.unwrap();
        assert_eq!(reread.mode, 0o600);
        assert_eq!(reread.uid, 7);
    }

    #[tokio::test]
    async fn setattr_fields_shrink_trims_chunks() {
        let meta = test_meta().await;
        let (_, ino) = meta
            .mknod(ROOT_INODE, FileType::Regular, "f", 0o644, 0)
            .await
            .unwrap();
        let page = crate::page::PAGE_SIZE as u64;
        meta.set_chunk_meta(ino, 0, 0, page, "chunks/x/0/a").await.unwrap();
        meta.set_chunk_meta(ino, 1, page, page, "chunks/x/1/a").await.unwrap();
        let mut attr = meta.getattr(ino).await.unwrap();
        attr.length = 2 * page;
        meta.setattr_directly(ino, &attr).await.unwrap();

        let req = SetAttrRequest {
            size: Some(100),
            ..Default::default()
        };
        let attr = meta.setattr_fields(ino, &req).await.unwrap();
        assert_eq!(attr.length, 100);

        let chunk = meta.get_chunk_meta(ino, 0).await.unwrap().unwrap();
        assert_eq!(chunk.length, 100);
        assert!(meta.get_chunk_meta(ino, 1).await.unwrap().is_none());
    }
}
