use clap::Parser;
use tracing_subscriber::EnvFilter;
use xc_deployer::{cli::Cli, config::ConfigFile};

/// The log filter used when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str = "info";

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let Cli { config, command } = Cli::parse();

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = ConfigFile::load(&config)?;
    command.run(&config).await?;

    Ok(())
}
