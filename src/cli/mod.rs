//! Command line interface: argument definitions and dispatch

pub mod commands;

pub use commands::{extract, serve};

use crate::config::{Config, DEFAULT_MAX_UPLOAD_BYTES};
use crate::invoice::MatchPolicy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "invoice-sheet")]
#[command(about = "Extract invoice records from loosely formatted spreadsheets")]
#[command(long_about = "Invoice Sheet - extract invoice records from supplier workbooks

The first sheet of an .xlsx, .xls or .ods workbook is scanned for:
  - the invoicing month in cell A1
  - a block of '<Currency> Rate' / value pairs from row 3
  - a header row naming every mandatory field, followed by invoice lines

COMMANDS:
  extract  - Print the extracted invoice data of a workbook as JSON
  serve    - Run the HTTP upload service (POST /api/v1/upload)

EXAMPLES:
  invoice-sheet extract march.xlsx --month 2024-03 --pretty
  invoice-sheet extract march.ods --month 2024-03 --field Customer --field Status
  invoice-sheet serve --host 0.0.0.0 --port 3000")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract invoice data from a workbook file
    Extract {
        /// Workbook file (.xlsx, .xlsm, .xls, .ods)
        file: PathBuf,

        /// Invoicing month the sheet must belong to (YYYY-MM)
        #[arg(short, long)]
        month: String,

        #[command(flatten)]
        engine: EngineArgs,

        /// Pretty-print the JSON output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Run the HTTP upload service
    Serve {
        /// Host address to bind to (use 0.0.0.0 for all interfaces)
        #[arg(short = 'H', long, default_value = "127.0.0.1", env = "INVOICE_SHEET_HOST")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value_t = 3000, env = "INVOICE_SHEET_PORT")]
        port: u16,

        /// Largest accepted upload body in bytes
        #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "INVOICE_SHEET_MAX_UPLOAD_BYTES")]
        max_upload_bytes: usize,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(clap::Args, Debug)]
pub struct EngineArgs {
    /// Mandatory field (repeatable); defaults to the nine invoice sheet fields
    #[arg(short, long = "field", value_delimiter = ',', env = "INVOICE_SHEET_FIELDS")]
    pub fields: Vec<String>,

    /// How column labels are matched against fields: substring or exact
    #[arg(long, default_value_t = MatchPolicy::Substring, env = "INVOICE_SHEET_MATCH_POLICY")]
    pub match_policy: MatchPolicy,
}

impl EngineArgs {
    /// Overrides the engine settings of `config` with the given arguments
    pub fn apply(self, config: &mut Config) {
        if !self.fields.is_empty() {
            config.mandatory_fields = self.fields;
        }
        config.match_policy = self.match_policy;
    }
}

/// Runs the parsed command line to completion.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::default();

    match cli.command {
        Commands::Extract {
            file,
            month,
            engine,
            pretty,
        } => {
            engine.apply(&mut config);
            let json = tokio::task::spawn_blocking(move || extract(&file, &month, &config, pretty)).await??;
            println!("{}", json);
            Ok(())
        }

        Commands::Serve {
            host,
            port,
            max_upload_bytes,
            engine,
        } => {
            engine.apply(&mut config);
            config.host = host;
            config.port = port;
            config.max_upload_bytes = max_upload_bytes;
            serve(config).await
        }
    }
}
