use rfuse3::Errno;

/// Transport-level failure talking to the metadata store.
///
/// "Key absent" is never an error here: lookups return `Ok(None)` so callers
/// can tell a missing record from a broken connection.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("kv transport error: {0}")]
    Transport(String),
}

impl From<redis::RedisError> for KvError {
    fn from(err: redis::RedisError) -> Self {
        KvError::Transport(err.to_string())
    }
}

/// Filesystem error taxonomy. Everything below the node layer speaks this
/// type; the FUSE boundary collapses it to an errno.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("file exists")]
    Exists,
    #[error("is a directory")]
    IsDirectory,
    #[error("not a directory")]
    NotDirectory,
    #[error("directory not empty")]
    NotEmpty,
    #[error("operation not permitted")]
    NotPermitted,
    #[error("permission denied")]
    AccessDenied,
    #[error("no space left on device")]
    NoSpace,
    #[error("read-only file system")]
    ReadOnly,
    #[error("invalid argument")]
    Invalid,
    #[error("i/o error: {0}")]
    Io(String),
}

impl FsError {
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::Exists => libc::EEXIST,
            FsError::IsDirectory => libc::EISDIR,
            FsError::NotDirectory => libc::ENOTDIR,
            FsError::NotEmpty => libc::ENOTEMPTY,
            FsError::NotPermitted => libc::EPERM,
            FsError::AccessDenied => libc::EACCES,
            FsError::NoSpace => libc::ENOSPC,
            FsError::ReadOnly => libc::EROFS,
            FsError::Invalid => libc::EINVAL,
            FsError::Io(_) => libc::EIO,
        }
    }
}

impl From<KvError> for FsError {
    fn from(err: KvError) -> Self {
        let KvError::Transport(message) = err;
        // Redis reports memory exhaustion with an "OOM" prefix.
        if message.starts_with("OOM") {
            FsError::NoSpace
        } else {
            FsError::Io(message)
        }
    }
}

impl From<serde_json::Error> for FsError {
    fn from(err: serde_json::Error) -> Self {
        FsError::Io(format!("record encoding: {err}"))
    }
}

impl From<object_store::Error> for FsError {
    fn from(err: object_store::Error) -> Self {
        FsError::Io(format!("object store: {err}"))
    }
}

impl From<FsError> for Errno {
    fn from(err: FsError) -> Self {
        Errno::from(err.errno())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oom_transport_maps_to_nospace() {
        let err: FsError = KvError::Transport("OOM command not allowed".into()).into();
        assert_eq!(err.errno(), libc::ENOSPC);

        let err: FsError = KvError::Transport("connection refused".into()).into();
        assert_eq!(err.errno(), libc::EIO);
    }

    #[test]
    fn errno_mapping_is_posix() {
        assert_eq!(FsError::NotFound.errno(), libc::ENOENT);
        assert_eq!(FsError::Exists.errno(), libc::EEXIST);
        assert_eq!(FsError::NotEmpty.errno(), libc::ENOTEMPTY);
        assert_eq!(FsError::NotDirectory.errno(), libc::ENOTDIR);
    }
}
