//! Hexstage terminal client.
//!
//! Composition root: loads configuration, starts the theater, issues
//! `START_GAME` and hands the terminal to a line-oriented dialog front end.
//!
//! ```bash
//! HEXSTAGE_CONTENT_ROOT=./content cargo run -p hexstage-client
//! ```

mod logging;
mod terminal;

use anyhow::Result;
use runtime::{RuntimeConfig, Theater};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // 1. Load configuration from environment
    let config = RuntimeConfig::from_env();

    // 2. Setup logging
    let log_file = logging::setup_logging(std::env::var("HEXSTAGE_SESSION_ID").ok())?;

    tracing::info!("Starting hexstage client");
    tracing::info!("Content root: {}", config.content_root.display());
    tracing::info!("Test case: {}", config.test_case);
    tracing::info!("Save dir: {:?}", config.save_dir);

    // 3. Build the theater
    let theater = Theater::builder().config(config).build().await?;

    // 4. Run the terminal front end until the player quits
    println!("Logging to {}", log_file.display());
    terminal::run(&theater).await?;

    theater.shutdown().await?;
    tracing::info!("Client shutdown complete");
    Ok(())
}
