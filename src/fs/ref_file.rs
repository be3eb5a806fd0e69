//! Ref-store-backed files: HEAD-style symrefs and everything under
//! `refs/`. The whole body lives as one opaque value in the metadata
//! store; no pages, no objects.

use tokio::sync::Mutex;

use crate::errors::FsError;
use crate::meta::{Attr, Ino, SetAttrRequest};
use crate::store::DataSource;

struct RefState {
    buf: Vec<u8>,
    clean: bool,
}

pub struct RefFile {
    ino: Ino,
    source: DataSource,
    state: Mutex<RefState>,
}

impl RefFile {
    /// Initialize the private buffer from the ref store; a missing value
    /// starts the file empty.
    pub async fn new(source: DataSource, ino: Ino) -> Result<Self, FsError> {
        let buf = match source.meta.ref_get(ino).await? {
            Some(data) => data,
            None => Vec::with_capacity(36),
        };
        Ok(Self {
            ino,
            source,
            state: Mutex::new(RefState { buf, clean: true }),
        })
    }

    pub async fn write(&self, data: &[u8], off: u64) -> u32 {
        let mut state = self.state.lock().await;
        let end = off as usize + data.len();
        if state.buf.len() < end {
            state.buf.resize(end, 0);
        }
        state.buf[off as usize..end].copy_from_slice(data);
        state.clean = false;
        data.len() as u32
    }

    pub async fn read(&self, dest: &mut [u8], off: u64) -> usize {
        let state = self.state.lock().await;
        let available = state.buf.len().saturating_sub(off as usize);
        let n = available.min(dest.len());
        dest[..n].copy_from_slice(&state.buf[off as usize..off as usize + n]);
        n
    }

    /// Write the buffer back as one value and refresh the stored length.
    pub async fn fsync(&self) -> Result<(), FsError> {
        let mut state = self.state.lock().await;
        if !state.clean {
            self.source.meta.ref_set(self.ino, &state.buf).await?;
            state.clean = true;
        }

        let mut attr = self.source.meta.getattr(self.ino).await?;
        attr.length = state.buf.len() as u64;
        self.source.meta.setattr_directly(self.ino, &attr).await?;
        Ok(())
    }

    pub async fn getattr(&self) -> Result<Attr, FsError> {
        self.source.meta.getattr(self.ino).await
    }

    /// Apply a setattr directly to the stored record; a shrink also trims
    /// the private buffer so the next flush persists the cut.
    pub async fn setattr(&self, req: &SetAttrRequest) -> Result<Attr, FsError> {
        let mut state = self.state.lock().await;

        let mut attr = self.source.meta.getattr(self.ino).await?;
        req.apply_without_size(&mut attr);
        if let Some(size) = req.size {
            attr.length = size;
        }
        self.source.meta.setattr_directly(self.ino, &attr).await?;

        if state.buf.len() as u64 > attr.length {
            state.buf.truncate(attr.length as usize);
            state.clean = false;
        }
        Ok(attr)
    }
}
