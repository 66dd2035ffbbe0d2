//! Signalhub Server – Einstiegspunkt

use anyhow::Result;
use signalhub_server::{config::ServerConfig, Server};

/// Pfad der Konfigurationsdatei, wenn `SIGNALHUB_CONFIG` fehlt
const STANDARD_CONFIG: &str = "signalhub.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad =
        std::env::var("SIGNALHUB_CONFIG").unwrap_or_else(|_| STANDARD_CONFIG.to_string());
    let config = ServerConfig::laden(&config_pfad)?;
    config.logging.initialisieren()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        format = %config.logging.format,
        "Signalhub wird initialisiert"
    );

    Server::neu(config).starten().await
}
