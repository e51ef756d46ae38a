//! API request handlers

use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use super::server::AppState;
use crate::error::InvoiceSheetError;
use crate::invoice::{require_period, InvoiceEngine, InvoiceError, InvoiceExtraction};
use crate::spreadsheet::read_first_sheet_from_bytes;

/// Multipart field carrying the workbook
pub const FILE_FIELD: &str = "file";
/// Multipart field carrying the declared `YYYY-MM` month
pub const MONTH_FIELD: &str = "invoicingMonth";

/// Error body: `{ "success": false, "error": "..." }`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

/// Failures of an upload request
#[derive(Debug)]
pub enum ApiError {
    /// Malformed or oversized multipart body
    Multipart(MultipartError),
    /// Undecodable workbook or rejected sheet
    Extraction(InvoiceSheetError),
    /// The extraction task did not complete
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Multipart(error) => error.status(),
            ApiError::Extraction(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Multipart(error) => error.body_text(),
            ApiError::Extraction(error) => error.to_string(),
            ApiError::Internal(message) => message.to_owned(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        ApiError::Multipart(error)
    }
}

impl From<InvoiceSheetError> for ApiError {
    fn from(error: InvoiceSheetError) -> Self {
        ApiError::Extraction(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        warn!(status = status.as_u16(), "Upload rejected: {}", message);
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

/// Workbook received in the `file` field
#[derive(Debug)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// POST /api/v1/upload - Extract invoice data from an uploaded workbook
///
/// Expects multipart form with:
/// - file: `.xlsx`, `.xls` or `.ods` workbook (required, first sheet is read)
/// - invoicingMonth: month the sheet must belong to, `YYYY-MM` (required)
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<InvoiceExtraction>, ApiError> {
    let mut file: Option<UploadedFile> = None;
    let mut period: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            FILE_FIELD => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await?;
                file = Some(UploadedFile {
                    name: file_name,
                    bytes: bytes.to_vec(),
                });
            }
            MONTH_FIELD => period = Some(field.text().await?),
            _ => {}
        }
    }

    let engine = Arc::clone(&state.engine);
    let extraction = tokio::task::spawn_blocking(move || extract_upload(&engine, file, period.as_deref()))
        .await
        .map_err(|error| ApiError::Internal(format!("Extraction task failed: {}", error)))??;

    info!(
        records = extraction.invoices_data.len(),
        rates = extraction.currency_rates.len(),
        "Upload processed"
    );
    Ok(Json(extraction))
}

/// Decodes the uploaded workbook and runs the engine on its first sheet.
/// Missing inputs are reported before any decoding.
pub fn extract_upload(
    engine: &InvoiceEngine,
    file: Option<UploadedFile>,
    period: Option<&str>,
) -> Result<InvoiceExtraction, InvoiceSheetError> {
    let file = file.ok_or(InvoiceError::MissingDocument)?;
    let period = require_period(period)?;

    let sheet = read_first_sheet_from_bytes(&file.name, file.bytes)?;
    Ok(engine.process(Some(&sheet), Some(period))?)
}

/// Root endpoint response
#[derive(Serialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Serialize)]
pub struct EndpointInfo {
    pub path: String,
    pub method: String,
    pub description: String,
}

/// GET / - Service info
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(RootResponse {
        name: "Invoice Sheet Service".to_string(),
        version: state.version.clone(),
        endpoints: vec![
            EndpointInfo {
                path: "/health".to_string(),
                method: "GET".to_string(),
                description: "Health check endpoint".to_string(),
            },
            EndpointInfo {
                path: "/api/v1/upload".to_string(),
                method: "POST".to_string(),
                description: "Extract invoice data from a workbook (multipart: file, invoicingMonth)".to_string(),
            },
        ],
    })
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health - Health check
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
    })
}
