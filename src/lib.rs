//! # Invoice Sheet
//!
//! Extracts structured invoice records from loosely formatted spreadsheet
//! uploads, where the position of the header row, the column order and the
//! presence of a currency-rate table are not fixed in advance.
//!
//! ## Features
//!
//! - **Workbook decoding**: reads the first sheet of `.xlsx`/`.xlsm`, `.xls`
//!   and `.ods` workbooks, from disk or from uploaded bytes, detected by content
//! - **Header discovery**: finds the header row by matching mandatory field
//!   names against column labels (substring or exact matching)
//! - **Currency conversion**: reads the `"<Currency> Rate"` block above the
//!   data and converts every line total
//! - **Validation**: keeps lines that are ready for invoicing and reports
//!   missing mandatory fields per record
//! - **HTTP service**: `POST /api/v1/upload` answering with JSON
//!
//! ## Example
//!
//! ```no_run
//! use invoice_sheet::invoice::InvoiceEngine;
//! use invoice_sheet::spreadsheet::read_first_sheet;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sheet = read_first_sheet("march.xlsx")?;
//! let extraction = InvoiceEngine::default().process(Some(&sheet), Some("2024-03"))?;
//! println!("{}", serde_json::to_string_pretty(&extraction)?);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
mod helpers;
pub mod invoice;
pub mod spreadsheet;

pub use error::InvoiceSheetError;
pub use error::Result;
pub use invoice::InvoiceEngine;
pub use invoice::InvoiceExtraction;
pub use spreadsheet::CellGrid;
pub use spreadsheet::Sheet;
