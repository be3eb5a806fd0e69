use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod cli;
mod errors;
mod fs;
mod meta;
mod page;
mod store;
mod task;

#[cfg(test)]
mod posix_tests;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse_args();

    match cli.command {
        cli::Commands::Mount {
            dir,
            debug,
            metadata,
            endpoint,
            bucket,
            access_key,
            secret_key,
        } => {
            let loglevel = if debug { "debug" } else { cli.loglevel.as_str() };
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_new(loglevel).unwrap_or_else(|_| EnvFilter::new("info")),
                )
                .init();

            let option = store::object::DataOption {
                endpoint,
                bucket,
                access_key,
                secret_key,
            };
            cli::mount::run_mount(&dir, &metadata, option).await?;
        }
    }

    Ok(())
}
