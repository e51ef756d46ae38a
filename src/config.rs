//! Service configuration
//!
//! Defaults match the upload service: `127.0.0.1:3000`, a 10 MiB upload cap,
//! the nine invoice sheet fields and substring matching. The binary overrides
//! them from command-line arguments and `INVOICE_SHEET_*` environment variables.

use crate::invoice::InvoiceEngine;
use crate::invoice::InvoiceError;
use crate::invoice::MandatoryFields;
use crate::invoice::MatchPolicy;
use crate::invoice::DEFAULT_FIELDS;

/// Largest accepted upload body
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    /// Field names as labelled in the sheets; normalized when the engine is built
    pub mandatory_fields: Vec<String>,
    pub match_policy: MatchPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            mandatory_fields: DEFAULT_FIELDS.iter().map(|field| field.to_string()).collect(),
            match_policy: MatchPolicy::default(),
        }
    }
}

impl Config {
    /// `host:port` to bind the service to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builds the engine for the configured fields and policy.
    pub fn engine(&self) -> Result<InvoiceEngine, InvoiceError> {
        let fields = MandatoryFields::new(&self.mandatory_fields)?;
        Ok(InvoiceEngine::with_policy(fields, self.match_policy))
    }
}
