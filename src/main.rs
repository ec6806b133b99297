//! Broadcast hub - Entry Point
//!
//! Reads the configuration, starts logging, and hands off to the front door.

use std::env;

use tracing_subscriber::EnvFilter;

use broadcast_hub::{server, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=broadcast_hub=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("broadcast_hub=info")),
        )
        .init();

    // Bind address and overflow policy from command line or defaults
    let config = Config::from_args(env::args())?;

    server::run(config).await?;

    Ok(())
}
