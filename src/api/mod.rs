//! Invoice upload HTTP service
//!
//! `POST /api/v1/upload` takes a multipart form with the workbook (`file`)
//! and the declared month (`invoicingMonth`) and answers with the extracted
//! invoice data. Run with `invoice-sheet serve`.

pub mod handlers;
pub mod server;

pub use server::router;
pub use server::run_api_server;
pub use server::AppState;
