//! On-store key layout.
//!
//! One inode record per `i<ino>`, a dentry hash per directory under
//! `d<parent>`, the chunk list under `c<ino>`, git ref blobs under
//! `r<ino>`, and four top-level counters.

use super::Ino;

pub const TOTAL_INODE: &str = "totalinode";
pub const NEXT_INODE: &str = "nextinode";
pub const USED_SPACE: &str = "usedspace";
pub const TOTAL_SPACE: &str = "totalspace";

pub fn inode(ino: Ino) -> String {
    format!("i{ino}")
}

pub fn dentry(parent: Ino) -> String {
    format!("d{parent}")
}

pub fn chunk(ino: Ino) -> String {
    format!("c{ino}")
}

pub fn git_ref(ino: Ino) -> String {
    format!("r{ino}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shapes() {
        assert_eq!(inode(1), "i1");
        assert_eq!(dentry(42), "d42");
        assert_eq!(chunk(7), "c7");
        assert_eq!(git_ref(9), "r9");
    }
}
