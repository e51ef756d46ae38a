//! CLI command handlers

use crate::api::run_api_server;
use crate::config::Config;
use crate::spreadsheet::read_first_sheet;
use anyhow::Context;
use std::path::Path;
use tracing::info;

/// Extracts the invoice data of a workbook file and renders it as JSON.
pub fn extract(file: &Path, month: &str, config: &Config, pretty: bool) -> anyhow::Result<String> {
    let engine = config.engine()?;
    let sheet = read_first_sheet(file)?;
    let extraction = engine
        .process(Some(&sheet), Some(month))
        .with_context(|| format!("Extract '{}' failed", file.display()))?;
    info!(
        file = %file.display(),
        records = extraction.invoices_data.len(),
        "Workbook extracted"
    );
    let json = if pretty {
        serde_json::to_string_pretty(&extraction)?
    } else {
        serde_json::to_string(&extraction)?
    };
    Ok(json)
}

/// Serves the upload API until shutdown.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    run_api_server(config).await
}
