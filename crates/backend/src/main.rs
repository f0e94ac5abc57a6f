//! # Abalone Backend - Main Entry Point
//!
//! Serves abalone age predictions over HTTP.

use abalone_backend::BackendCliOptions;
use abalone_shared::Result;
use clap::Parser;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    let options = BackendCliOptions::parse();
    options.logging.init_logging()?;

    if let Err(e) = options.run().await {
        error!(error = %e, "Backend server exited with an error");
        return Err(e);
    }
    Ok(())
}
