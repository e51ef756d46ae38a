use crate::error::InvoiceSheetError;
use crate::helpers::reader::SourceReader;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::reference::MAX_COLUMNS;
use crate::spreadsheet::reference::MAX_ROWS;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::io::Read;
use zip::ZipArchive;

/// ODS file MIME type identifier
const MIME_TYPE: &[u8] = b"application/vnd.oasis.opendocument.spreadsheet";
/// XML element name for table (sheet)
const TABLE: QName = QName(b"table:table");
/// XML element name for table row
const TABLE_ROW: QName = QName(b"table:table-row");
/// XML element name for table cell
const TABLE_CELL: QName = QName(b"table:table-cell");
/// XML element name for covered table cell (merged cells)
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
/// XML element name for annotations (comments)
const ANNOTATION: QName = QName(b"office:annotation");
/// XML element name for paragraph text
const PARAGRAPH: QName = QName(b"text:p");
/// XML element name for string (space) text
const STRING: QName = QName(b"text:s");
/// Manifest entry and its encryption marker
const FILE_ENTRY: QName = QName(b"manifest:file-entry");
const ENCRYPTION_DATA: QName = QName(b"manifest:encryption-data");
/// Most cells one table may expand to
const MAX_SHEET_CELLS: usize = 1 << 20;
/// Most characters one cell text may hold
const MAX_CELL_TEXT: usize = 32_767;

/// An OpenDocument spreadsheet (.ods)
pub(crate) struct OdsSpreadsheet {
    /// Workbook name (file name or upload name)
    pub(crate) name: String,
    /// ZIP package containing the document parts
    zip: ZipArchive<SourceReader>,
    /// Table names in document order
    sheets: Vec<String>,
}

impl OdsSpreadsheet {
    /// Validates the MIME type and encryption state of an opened package
    ///
    /// # Arguments
    /// * `name` - Workbook name used in error messages
    /// * `zip` - Package holding `content.xml`
    ///
    /// # Returns
    /// * `Result<OdsSpreadsheet, InvoiceSheetError>` - The document with its table
    ///   names, or an unsupported, password protected or empty workbook error
    pub(crate) fn open(name: &str, mut zip: ZipArchive<SourceReader>) -> Result<Self, InvoiceSheetError> {
        if !has_spreadsheet_mime(&mut zip)? {
            Err(SpreadsheetError::UnsupportedFormat(name.to_owned()))?;
        }
        if is_password_protected(&mut zip)? {
            Err(SpreadsheetError::PasswordProtectedError(name.to_owned()))?;
        }
        let sheets = load_table_names(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(name.to_owned()))?
        }
        Ok(OdsSpreadsheet {
            name: name.to_owned(),
            zip,
            sheets,
        })
    }
}

impl Spreadsheet for OdsSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.to_owned()
    }

    /// Reads the first `table:table` of `content.xml`, expanding repeated rows and columns.
    ///
    /// Repeated blank cells only advance the position. Repeated value cells are
    /// materialised, and a repetition reaching past row 1,048,576, column 16,384
    /// or the per-table cell allowance fails with
    /// [`SpreadsheetError::SheetTooLargeError`].
    fn read_first_sheet(&mut self) -> Result<Sheet, InvoiceSheetError> {
        let mut reader = self.zip
            .xml_reader("content.xml")?
            .ok_or_else(|| SpreadsheetError::FileError("content.xml".to_owned()))?;

        let mut sheet = None::<Sheet>;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut row_count = 1usize;
        let mut col_count = 1usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        let mut element_context = false; // Inside a string cell's paragraphs
        let mut comment_context = false; // Inside an annotation of that cell
        match_xml_events!(reader => {
            Event::Start(event) if sheet.is_none() && event.name() == TABLE => {
                let name = event.get_attribute_value("table:name")?.unwrap_or_default();
                sheet = Some(Sheet::new(&name));
            }
            Event::End(event) if event.name() == TABLE => break,
            Event::Start(event) if sheet.is_some() && event.name() == TABLE_ROW => {
                row_count = event.parse_attribute_value("table:number-rows-repeated")?.unwrap_or(1);
                col = 0;
            }
            Event::End(event) if sheet.is_some() && event.name() == TABLE_ROW => {
                row = row.saturating_add(row_count).min(MAX_ROWS);
            }
            Event::Start(event) if sheet.is_some() && (event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL) => {
                value.clear();
                col_count = event.parse_attribute_value::<usize>("table:number-columns-repeated")?.unwrap_or(1);
                let value_type = event.get_attribute_value("office:value-type")?;
                kind = match value_type.as_deref() {
                    Some("boolean") => CellType::Boolean,
                    Some("date") => CellType::IsoDateTime,
                    Some("time") => CellType::IsoDuration,
                    Some("string") => {
                        let is_error = event.get_attribute_value("calcext:value-type")?
                            .map(|cow| cow == "error")
                            .unwrap_or(false);
                        if is_error { CellType::Error } else { CellType::InlineString }
                    }
                    Some(_) => CellType::Number,
                    None => CellType::Empty,
                };
                match kind {
                    CellType::InlineString | CellType::Error => element_context = true,
                    CellType::Boolean => {
                        let truthy = event.get_attribute_value("office:boolean-value")?
                            .map(|cow| cow != "false" && cow != "0")
                            .unwrap_or(false);
                        value.push_str(if truthy { "1" } else { "0" });
                    }
                    CellType::IsoDateTime => if let Some(data) = event.get_attribute_value("office:date-value")? {
                        value.push_str(&data);
                    },
                    CellType::IsoDuration => if let Some(data) = event.get_attribute_value("office:time-value")? {
                        value.push_str(&data);
                    },
                    CellType::Number => if let Some(data) = event.get_attribute_value("office:value")? {
                        value.push_str(&data);
                    },
                    _ => (),
                }
            }
            Event::End(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                if let Some(sheet) = sheet.as_mut() {
                    if kind != CellType::Empty && !value.is_empty() {
                        let row_end = row.checked_add(row_count).filter(|end| *end <= MAX_ROWS);
                        let col_end = col.checked_add(col_count).filter(|end| *end <= MAX_COLUMNS);
                        let expanded = sheet.cells.len().saturating_add(row_count.saturating_mul(col_count));
                        let (row_end, col_end) = match (row_end, col_end) {
                            (Some(row_end), Some(col_end)) if expanded <= MAX_SHEET_CELLS => (row_end, col_end),
                            _ => Err(SpreadsheetError::SheetTooLargeError(self.name.to_owned()))?,
                        };
                        for cell_row in row..row_end {
                            for cell_col in col..col_end {
                                sheet.push(Cell {
                                    row: cell_row,
                                    col: cell_col,
                                    kind,
                                    value: value.to_owned(),
                                });
                            }
                        }
                    }
                }
                col = col.saturating_add(col_count).min(MAX_COLUMNS);
                element_context = false;
                comment_context = false;
            }
            Event::Start(event) if element_context && event.name() == ANNOTATION => comment_context = true,
            Event::End(event) if element_context && event.name() == ANNOTATION => comment_context = false,
            Event::Start(event) if element_context && !comment_context && event.name() == PARAGRAPH => {
                if !value.is_empty() {
                    value.push('\n');
                }
            }
            Event::Start(event) if element_context && !comment_context && event.name() == STRING => {
                let count = event.parse_attribute_value::<usize>("text:c")?.unwrap_or(1);
                value.extend(std::iter::repeat(' ').take(count.min(MAX_CELL_TEXT)));
            }
            Event::Text(event) if element_context && !comment_context => value.push_bytes_text(&event)?,
            Event::GeneralRef(event) if element_context && !comment_context => value.push_bytes_ref(&event)?,
        });

        sheet.ok_or_else(|| SpreadsheetError::SpreadsheetEmptyError(self.name.to_owned()).into())
    }
}

/// Checks the `mimetype` part, when present, names an OpenDocument spreadsheet
fn has_spreadsheet_mime(zip: &mut ZipArchive<SourceReader>) -> Result<bool, InvoiceSheetError> {
    if let Some(file) = &mut zip.file("mimetype")? {
        let mut buffer = Vec::with_capacity(MIME_TYPE.len());
        file.read_to_end(&mut buffer)?;
        return Ok(buffer.trim_ascii() == MIME_TYPE);
    }
    Ok(true)
}

/// Collects the `table:name` of every table in `content.xml`
fn load_table_names(zip: &mut ZipArchive<SourceReader>) -> Result<Vec<String>, InvoiceSheetError> {
    let mut reader = zip.xml_reader("content.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("content.xml".to_owned()))?;
    let mut names = Vec::<String>::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TABLE => {
            names.push(event.get_attribute_value("table:name")?.unwrap_or_default().to_string());
        }
    });
    Ok(names)
}

/// Checks if any manifest entry carries encryption data
///
/// # Returns
/// * `Result<bool>` - `true` when a `manifest:file-entry` holds
///   `manifest:encryption-data`, `false` without a manifest
fn is_password_protected(zip: &mut ZipArchive<SourceReader>) -> Result<bool, InvoiceSheetError> {
    let mut reader = match zip.xml_reader("META-INF/manifest.xml")? {
        Some(reader) => reader,
        None => return Ok(false),
    };
    let mut in_file_entry = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == FILE_ENTRY => in_file_entry = true,
        Event::End(event) if event.name() == FILE_ENTRY => in_file_entry = false,
        Event::Start(event) if in_file_entry && event.name() == ENCRYPTION_DATA => return Ok(true),
    });
    Ok(false)
}
