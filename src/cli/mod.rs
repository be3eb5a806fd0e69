use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod mount;

#[derive(Parser)]
#[command(name = "tinygitfs")]
#[command(author, version, about = "Mount a git-aware filesystem backed by Redis and S3", long_about = None)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub loglevel: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mount the filesystem
    Mount {
        /// Mount point
        dir: PathBuf,
        /// Show FUSE operation tracing
        #[arg(long)]
        debug: bool,
        /// Metadata store URL, e.g. redis://127.0.0.1:6379/0
        #[arg(long)]
        metadata: String,
        /// Object store endpoint URL
        #[arg(long)]
        endpoint: String,
        /// Bucket holding the file contents
        #[arg(long)]
        bucket: String,
        /// Access key for object storage
        #[arg(long, env = "ACCESS_KEY", default_value = "")]
        access_key: String,
        /// Secret key for object storage
        #[arg(long, env = "SECRET_KEY", default_value = "")]
        secret_key: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
