use cipherline::config::NetworkConfig;
use cipherline::error::Result;
use cipherline::transport::start_server;
use cipherline::utils::logging::init_logging;
use cipherline::utils::metrics::init_metrics;

/// Usage: `cipherline [config.toml]`; without a file, settings come from the environment.
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("cipherline: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => NetworkConfig::from_file(path)?,
        None => NetworkConfig::from_env()?,
    };

    init_logging(&config.logging)?;
    config.validate_strict()?;
    init_metrics();

    start_server(config).await
}
