use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use crate::fs::{self, GitFs};
use crate::meta::Meta;
use crate::store::kv::RedisKv;
use crate::store::object::{DataOption, DataStore};
use crate::store::DataSource;

/// Build the filesystem, mount it, and block until unmount. SIGINT and
/// SIGTERM unmount cleanly.
pub async fn run_mount(dir: &Path, metadata_url: &str, data_option: DataOption) -> Result<()> {
    let kv = RedisKv::connect(metadata_url)
        .await
        .with_context(|| format!("connect metadata store {metadata_url}"))?;
    let meta = Arc::new(Meta::new(Arc::new(kv)));
    let data = Arc::new(DataStore::open(&data_option).context("open object store")?);

    let gitfs = GitFs::new(DataSource::new(meta, data))
        .await
        .context("initialize filesystem")?;

    let mut mount_handle = fs::mount(gitfs, dir)
        .await
        .with_context(|| format!("mount {}", dir.display()))?;
    info!(dir = %dir.display(), "mounted");

    let mut sigterm = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
    let handle = &mut mount_handle;

    tokio::select! {
        res = handle => {
            res.context("filesystem session ended")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT, unmounting");
            if let Err(e) = mount_handle.unmount().await {
                error!("unmount failed: {e}");
                return Err(e.into());
            }
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, unmounting");
            if let Err(e) = mount_handle.unmount().await {
                error!("unmount failed: {e}");
                return Err(e.into());
            }
        }
    }

    Ok(())
}
