//! # Spreadsheet Decoding Module
//!
//! Decodes Office Open XML (`.xlsx`, `.xlsm`), OpenDocument (`.ods`) and
//! legacy binary Excel (`.xls`) workbooks into a [`Sheet`]: a sparse grid of
//! cells addressable by zero-based (row, column), each rendered to its display
//! text.
//!
//! Only the first worksheet of a workbook is materialised. The format is
//! detected from the package content, so uploads without a meaningful file
//! name are handled the same way as files on disk.
use crate::error::InvoiceSheetError;
use crate::error::ResultMessage;
use crate::helpers::reader::SourceReader;
use crate::helpers::zip::ZipHelper;
use std::path::Path;
use thiserror::Error;
use zip::ZipArchive;

pub(crate) mod cell;
mod excel;
mod ods;
pub mod range;
pub(crate) mod reference;
mod sheet;
pub(crate) mod xls;
mod xlsx;

pub use sheet::Sheet;

/// Errors raised while opening or decoding a workbook.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Cannot detect spreadsheet format of '{0}'")]
    UnsupportedFormat(String),

    #[error("'{0}' is a compound document without a workbook stream (an encrypted package?)")]
    CompoundDocumentError(String),

    #[error("'{0}' is password protected")]
    PasswordProtectedError(String),

    #[error("Missing workbook part '{0}'")]
    FileError(String),

    #[error("Workbook '{0}' contains no worksheet")]
    SpreadsheetEmptyError(String),

    #[error("Worksheet of '{0}' exceeds the sheet size limits")]
    SheetTooLargeError(String),
}

/// Read access to a rectangular grid of display texts.
///
/// Absent cells read as the empty string; reads never fail.
pub trait CellGrid {
    /// Display text of the cell at zero-based `(row, col)`, empty if absent or blank.
    fn cell_text(&self, row: usize, col: usize) -> String;

    /// Zero-based index of the last row within the declared bounds, 0 without bounds.
    fn last_row(&self) -> usize;

    /// Whether the grid carries any bounding information at all.
    fn has_bounds(&self) -> bool;
}

/// A workbook opened for reading.
pub trait Spreadsheet {
    /// Returns the name of the workbook (file name or upload name)
    fn name(&self) -> String;

    /// Returns the worksheet names in workbook order
    fn sheet_names(&self) -> Vec<String>;

    /// Decodes the first worksheet
    fn read_first_sheet(&mut self) -> Result<Sheet, InvoiceSheetError>;
}

/// Opens a workbook file from disk.
pub fn open_spreadsheet<P: AsRef<Path>>(path: P) -> Result<Box<dyn Spreadsheet>, InvoiceSheetError> {
    let name = path.as_ref().to_string_lossy().to_string();
    let reader = SourceReader::open(path.as_ref()).with_prefix(&format!("Open '{}' failed", name))?;
    detect_spreadsheet(&name, reader)
}

/// Opens a workbook received as bytes, e.g. a multipart upload.
pub fn open_spreadsheet_from_bytes(name: &str, bytes: Vec<u8>) -> Result<Box<dyn Spreadsheet>, InvoiceSheetError> {
    detect_spreadsheet(name, SourceReader::from_bytes(bytes))
}

/// Opens a workbook from disk and decodes its first worksheet.
pub fn read_first_sheet<P: AsRef<Path>>(path: P) -> Result<Sheet, InvoiceSheetError> {
    open_spreadsheet(path)?.read_first_sheet()
}

/// Decodes the first worksheet of an uploaded workbook.
pub fn read_first_sheet_from_bytes(name: &str, bytes: Vec<u8>) -> Result<Sheet, InvoiceSheetError> {
    open_spreadsheet_from_bytes(name, bytes)?.read_first_sheet()
}

/// Picks the workbook reader from the package content.
fn detect_spreadsheet(name: &str, mut reader: SourceReader) -> Result<Box<dyn Spreadsheet>, InvoiceSheetError> {
    if reader.is_compound_document()? {
        return Ok(Box::new(xls::XlsSpreadsheet::open(name, reader)?));
    }
    if !reader.is_zip_package()? {
        Err(SpreadsheetError::UnsupportedFormat(name.to_owned()))?
    }

    let zip = ZipArchive::new(reader)?;
    if zip.contains("xl/workbook.xml") {
        Ok(Box::new(xlsx::XlsxSpreadsheet::open(name, zip)?))
    } else if zip.contains("content.xml") && zip.contains("mimetype") {
        Ok(Box::new(ods::OdsSpreadsheet::open(name, zip)?))
    } else {
        Err(SpreadsheetError::UnsupportedFormat(name.to_owned()).into())
    }
}
