//! CLI helper functions

use crate::client::GoogleAdsClient;
use crate::config::Config;
use crate::runner::SyncRunner;
use crate::storage::NdjsonDirSink;
use crate::streams::select_streams;
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use std::sync::Arc;

/// Load and validate the config file.
pub fn load_config(path: &str) -> Result<Arc<Config>> {
    log::debug!("Loading config from {}", path.bright_black());
    let config = Config::load(path)?;
    Ok(Arc::new(config))
}

/// Redeem the refresh token once to verify credentials.
pub async fn check_auth(config: Arc<Config>) -> Result<()> {
    let client = GoogleAdsClient::new(config)?;
    let token = client
        .access_token()
        .await
        .context("Token exchange failed")?;
    log::info!("✓ Obtained access token {}", mask(&token).bright_black());
    Ok(())
}

/// List the report streams active for the config.
pub fn list_streams(config: &Config) {
    let streams = select_streams(config);
    log::info!("{} active report stream(s):", streams.len().cyan());
    for stream in &streams {
        let replication = match stream.replication_key() {
            Some(key) => format!(" (replication key: {})", key),
            None => String::new(),
        };
        log::info!("  {}{}", stream.name().green(), replication);
    }
    if !config.enable_click_view_report_stream {
        log::info!(
            "  {} is disabled; set enable_click_view_report_stream to include it",
            "ga_click_view_report".bright_black()
        );
    }
}

/// Run a full extraction into `output_dir`, one NDJSON file per stream.
pub async fn run_sync(config: Arc<Config>, output_dir: &str) -> Result<()> {
    log::info!(
        "Syncing {} through {}",
        config.start_date.to_string().cyan(),
        config.end_date.to_string().cyan()
    );

    let client = GoogleAdsClient::new(config)?;
    let sink = NdjsonDirSink::new(output_dir)?;
    let mut runner = SyncRunner::new(client, sink);
    let summary = runner.sync().await?;

    log::info!(
        "✓ Wrote {} record(s) to {}",
        summary.total_records().cyan(),
        output_dir.bright_black()
    );
    for stream in summary.truncated_streams() {
        log::warn!("Stream {} finished with partial output", stream.yellow());
    }
    Ok(())
}

/// Keep enough of a token to recognize it in logs, nothing more.
fn mask(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{}…", prefix)
}
