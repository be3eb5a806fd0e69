use std::sync::Mutex;

use crate::meta::{Attr, SetAttrRequest};

/// In-memory view of an inode's attributes while pages are dirty.
///
/// Writes extend the length here so reads through the same open observe it
/// before the chunk map catches up at flush time. Only length and times
/// propagate back to the stored record; mode/uid/gid stay authoritative in
/// the metadata engine.
pub struct MemAttr {
    attr: Mutex<Attr>,
}

impl MemAttr {
    pub fn new(attr: Attr) -> Self {
        Self {
            attr: Mutex::new(attr),
        }
    }

    pub fn length(&self) -> u64 {
        self.attr.lock().unwrap().length
    }

    pub fn update_length(&self, length: u64) {
        self.attr.lock().unwrap().length = length;
    }

    pub fn update_length_if_more(&self, length: u64) {
        let mut attr = self.attr.lock().unwrap();
        if length > attr.length {
            attr.length = length;
        }
    }

    pub fn touch_mtime(&self) {
        self.attr.lock().unwrap().touch_mtime();
    }

    /// Apply a setattr to the overlay. Returns the new size when it shrank,
    /// so the pool can drop cached pages past the cut.
    pub fn apply(&self, req: &SetAttrRequest) -> Option<u64> {
        let mut attr = self.attr.lock().unwrap();
        req.apply_without_size(&mut attr);
        if let Some(size) = req.size {
            let previous = attr.length;
            attr.length = size;
            if size < previous {
                return Some(size);
            }
        }
        None
    }

    /// Propagate length and times onto `dst`.
    pub fn copy_to_attr(&self, dst: &mut Attr) {
        let attr = self.attr.lock().unwrap();
        dst.length = attr.length;
        dst.atime = attr.atime;
        dst.atimensec = attr.atimensec;
        dst.mtime = attr.mtime;
        dst.mtimensec = attr.mtimensec;
        dst.ctime = attr.ctime;
        dst.ctimensec = attr.ctimensec;
    }

    /// Refresh the overlay's length and times from a stored record.
    pub fn copy_from_attr(&self, src: &Attr) {
        let mut attr = self.attr.lock().unwrap();
        attr.length = src.length;
        attr.atime = src.atime;
        attr.atimensec = src.atimensec;
        attr.mtime = src.mtime;
        attr.mtimensec = src.mtimensec;
        attr.ctime = src.ctime;
        attr.ctimensec = src.ctimensec;
    }
}
