//! Anchorage CLI
//!
//! Re-anchors the annotations of a document fixture and prints the resulting
//! persistence records as JSON.
//!
//! Usage: `anchorage <fixture.json>`

use std::path::PathBuf;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use anchorage::config::EngineConfig;
use anchorage::fixture::DocumentFixture;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "anchorage=debug".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();
    let config = EngineConfig::from_env();

    let path: PathBuf = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: anchorage <fixture.json>")?;

    tracing::info!("Starting Anchorage v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %path.display(), "Loading fixture");

    let fixture = DocumentFixture::load(&path)
        .with_context(|| format!("failed to load fixture {}", path.display()))?;
    let output = fixture.run(&config).await?;

    let refined: usize = output.reports.iter().map(|r| r.refined.len()).sum();
    tracing::info!(pages = output.reports.len(), refined, "Re-anchoring finished");

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
