use crate::error::InvoiceSheetError;
use crate::helpers::biff8::Biff8Reader;
use crate::helpers::cfb::Cfb;
use crate::helpers::reader::SourceReader;
use crate::match_biff8_record;
use crate::spreadsheet::cell::to_error_value;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel::load_number_formats;
use crate::spreadsheet::range::Range;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use either::Either;
use std::collections::HashMap;
use thiserror::Error;

// BIFF8 record types
const FORMULA: u16 = 6;        // Formula with its cached result
const EOF: u16 = 10;           // End of a substream
const DATE1904: u16 = 34;      // Date system flag (1904 vs 1900 base)
const FILE_PASS: u16 = 47;     // Workbook encryption
const CODE_PAGE: u16 = 66;     // Character encoding specification
const BOUND_SHEET8: u16 = 133; // Worksheet name and substream position
const MUL_RK: u16 = 189;       // Run of RK numbers in one row
const XF: u16 = 224;           // Extended format, indexed by cells
const SST: u16 = 252;          // Shared string table
const LABEL_SST: u16 = 253;    // Cell referencing the shared string table
const DIMENSIONS: u16 = 512;   // Used range of a worksheet
const NUMBER: u16 = 515;       // Double precision number cell
const LABEL: u16 = 516;        // Inline string cell
const BOOL_ERR: u16 = 517;     // Boolean or error cell
const STRING: u16 = 519;       // String result of the preceding formula
const ARRAY: u16 = 545;        // Array formula body
const TABLE: u16 = 566;        // Data table body
const RK: u16 = 638;           // RK number cell
const FORMAT: u16 = 1054;      // Custom number format definition
const SHR_FMLA: u16 = 1212;    // Shared formula body
const BOF: u16 = 2057;         // Beginning of a substream

/// Errors specific to the legacy binary workbook reader
#[derive(Error, Debug)]
pub enum XlsError {
    #[error("Invalid Code page '{0}'")]
    CodePageError(u16),

    #[error("Invalid Formula value '{0}'")]
    FormulaValueError(u64),
}

/// A legacy binary workbook (.xls, BIFF8 inside a compound file)
pub(crate) struct XlsSpreadsheet {
    /// Workbook name (file name or upload name)
    pub(crate) name: String,
    /// Reader over the `Workbook` stream
    reader: Biff8Reader,
    shared_strings: Vec<String>,
    /// Cell types indexed by XF record, for date detection
    number_formats: Vec<CellType>,
    /// Worksheets as (name, stream position) pairs in workbook order
    sheets: Vec<(String, usize)>,
}

impl XlsSpreadsheet {
    /// Opens a compound document and reads the workbook globals substream.
    ///
    /// # Arguments
    /// * `name` - Workbook name used in error messages
    /// * `source` - Compound document positioned anywhere
    ///
    /// # Returns
    /// * `Result<XlsSpreadsheet, InvoiceSheetError>` - Workbook ready for reading,
    ///   or [`SpreadsheetError::CompoundDocumentError`] when the container holds no
    ///   workbook stream (an encrypted OOXML package, a Word document)
    pub(crate) fn open(name: &str, mut source: SourceReader) -> Result<XlsSpreadsheet, InvoiceSheetError> {
        let cfb = Cfb::new(&mut source)?;
        let stream = match cfb.read("Workbook")? {
            Some(stream) => Some(stream),
            None => cfb.read("Book")?,
        };
        let mut reader = stream
            .map(Biff8Reader::new)
            .ok_or_else(|| SpreadsheetError::CompoundDocumentError(name.to_owned()))?;

        let mut is_1904 = false;
        let mut shared_strings = Vec::new();
        let mut custom_formats: HashMap<String, CellType> = HashMap::new();
        let mut format_indexes: Vec<String> = Vec::new();
        let mut sheets: Vec<(String, usize)> = Vec::new();
        match_biff8_record!(reader => {
            EOF => break,
            FILE_PASS => Err(SpreadsheetError::PasswordProtectedError(name.to_owned()))?,
            DATE1904 if reader.read_u16()? == 1 => is_1904 = true,
            CODE_PAGE => {
                let code_page = reader.read_u16()?;
                reader.encoding = codepage::to_encoding(code_page).ok_or(XlsError::CodePageError(code_page))?;
            }
            FORMAT => {
                let id = reader.read_u16()?;
                let format = reader.read_xl_unicode_string()?;
                custom_formats.insert(id.to_string(), CellType::parse_custom_number_format(&format, is_1904));
            }
            XF => {
                reader.skip(2)?;
                let id = reader.read_u16()?;
                format_indexes.push(id.to_string());
            }
            SST => shared_strings = load_shared_strings(&mut reader)?,
            BOUND_SHEET8 => {
                let pointer = reader.read_usize()?;
                let kind = reader.skip(2)?[1];
                let sheet_name = reader.read_short_xl_unicode_string()?;
                // Chart, macro and module sheets hold no cells
                if kind == 0 {
                    sheets.push((sheet_name, pointer));
                }
            }
        });
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(name.to_owned()))?
        }

        Ok(XlsSpreadsheet {
            name: name.to_owned(),
            reader,
            shared_strings,
            number_formats: load_number_formats(format_indexes, custom_formats, is_1904),
            sheets,
        })
    }

    /// Cell type of an XF index, plain numbers for unknown indexes
    fn number_format(&self, index: usize) -> CellType {
        self.number_formats.get(index).copied().unwrap_or(CellType::Number)
    }
}

impl Spreadsheet for XlsSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// Reads the cell records of the first worksheet substream.
    /// Shared string references are resolved, error cells keep their error text.
    fn read_first_sheet(&mut self) -> Result<Sheet, InvoiceSheetError> {
        let (sheet_name, pointer) = self.sheets.first()
            .cloned()
            .ok_or_else(|| SpreadsheetError::SpreadsheetEmptyError(self.name.to_owned()))?;

        self.reader.goto(pointer);
        if self.reader.next()? != Some(BOF) {
            Err(SpreadsheetError::FileError(sheet_name.to_owned()))?
        }
        let mut sheet = Sheet::new(&sheet_name);
        while let Some(tag) = self.reader.next()? {
            match tag {
                BOF | EOF => break,
                DIMENSIONS => sheet.dimension = read_dimensions(&mut self.reader)?,
                MUL_RK => {
                    let row = self.reader.read_u16()? as usize;
                    let col_lower_bound = self.reader.read_u16()? as usize;
                    let col_upper_bound = self.reader.get_u16_back(2)? as usize;
                    for col in col_lower_bound..=col_upper_bound {
                        let index = self.reader.read_u16()? as usize;
                        let kind = self.number_format(index);
                        let value = self.reader.read_rk_number()?;
                        sheet.push(Cell { row, col, kind, value });
                    }
                }
                BOOL_ERR | NUMBER | RK | LABEL_SST | LABEL | FORMULA => {
                    let row = self.reader.read_u16()? as usize;
                    let col = self.reader.read_u16()? as usize;
                    let (either, value) = match tag {
                        BOOL_ERR => read_bool_or_error_cell(&mut self.reader)?,
                        NUMBER => read_number_cell(&mut self.reader)?,
                        RK => read_rk_cell(&mut self.reader)?,
                        LABEL_SST => read_label_sst_cell(&mut self.reader)?,
                        LABEL => read_label_cell(&mut self.reader)?,
                        _ => read_formula_cell(&mut self.reader)?,
                    };
                    let (kind, value) = match either {
                        Either::Left(CellType::SharedString) => {
                            let text = value.parse::<usize>()
                                .ok()
                                .and_then(|index| self.shared_strings.get(index))
                                .cloned()
                                .unwrap_or_default();
                            (CellType::InlineString, text)
                        }
                        Either::Left(kind) => (kind, value),
                        Either::Right(index) => (self.number_format(index), value),
                    };
                    if !value.is_empty() {
                        sheet.push(Cell { row, col, kind, value });
                    }
                }
                _ => (),
            }
        }
        Ok(sheet)
    }
}

/// Reads the shared string table of an SST record
fn load_shared_strings(reader: &mut Biff8Reader) -> Result<Vec<String>, InvoiceSheetError> {
    let mut shared_strings: Vec<String> = Vec::new();
    reader.skip(4)?;
    let count = reader.read_usize()?;
    for _ in 0..count {
        shared_strings.push(reader.read_xl_unicode_rich_extended_string()?);
    }
    Ok(shared_strings)
}

/// Reads the used range, `None` for an empty worksheet.
/// The stored upper bounds are one past the last used row and column.
fn read_dimensions(reader: &mut Biff8Reader) -> Result<Option<Range>, InvoiceSheetError> {
    let row_lower_bound = reader.read_usize()?;
    let row_upper_bound = reader.read_usize()?;
    let col_lower_bound = reader.read_u16()? as usize;
    let col_upper_bound = reader.read_u16()? as usize;
    if row_upper_bound <= row_lower_bound || col_upper_bound <= col_lower_bound {
        return Ok(None);
    }
    Ok(Some(Range {
        row_lower_bound: Some(row_lower_bound),
        row_upper_bound: Some(row_upper_bound - 1),
        col_lower_bound: Some(col_lower_bound),
        col_upper_bound: Some(col_upper_bound - 1),
    }))
}

/// Reads a BOOL_ERR record: a boolean, or an error code rendered as its text.
fn read_bool_or_error_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), InvoiceSheetError> {
    reader.skip(2)?;
    let value = reader.read_u8()?;
    let flag = reader.read_u8()?;
    Ok(if flag == 0 {
        (Either::Left(CellType::Boolean), value.to_string())
    } else {
        (Either::Left(CellType::Error), to_error_value(value).to_owned())
    })
}

/// Reads a NUMBER record
///
/// # Returns
/// * `Result<(Either<CellType, usize>, String)>` - XF index and numeric value
fn read_number_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), InvoiceSheetError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_f64()?;
    Ok((Either::Right(index), value.to_string()))
}

fn read_rk_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), InvoiceSheetError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_rk_number()?;
    Ok((Either::Right(index), value))
}

/// Reads a LABEL_SST record, whose value is the shared string index
fn read_label_sst_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), InvoiceSheetError> {
    reader.skip(2)?;
    let value = reader.read_usize()?;
    Ok((Either::Left(CellType::SharedString), value.to_string()))
}

fn read_label_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), InvoiceSheetError> {
    reader.skip(2)?;
    let value = reader.read_xl_unicode_string()?;
    Ok((Either::Left(CellType::InlineString), value))
}

/// Reads the cached result of a FORMULA record
///
/// A number is stored inline. Other results are tagged in the low byte with
/// `0xFFFF` in the top bytes: 0 for a string held in the following STRING
/// record, 1 for a boolean, 2 for an error and 3 for an empty string.
///
/// # Arguments
/// * `reader` - BIFF8 reader positioned after the cell row and column
///
/// # Returns
/// * `Result<(Either<CellType, usize>, String)>` - Cell type or XF index, and the result
fn read_formula_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), InvoiceSheetError> {
    let index = reader.read_u16()? as usize;
    let formula = reader.read_u64()?;
    let is_number = (formula & 0xFFFF000000000000) != 0xFFFF000000000000;
    let flag = formula & 0xFF;
    if is_number {
        Ok((Either::Right(index), f64::from_bits(formula).to_string()))
    } else if flag == 0 {
        // Shared, array and table formula bodies may precede the string result
        while let Some(kind) = reader.next()? {
            match kind {
                STRING => {
                    let value = reader.read_xl_unicode_string()?;
                    return Ok((Either::Left(CellType::InlineString), value));
                }
                SHR_FMLA | ARRAY | TABLE => continue,
                _ => break,
            }
        }
        Err(XlsError::FormulaValueError(formula))?
    } else if flag == 1 {
        let value = if (formula & 0xFF0000) > 0 { "1" } else { "0" };
        Ok((Either::Left(CellType::Boolean), value.to_owned()))
    } else if flag == 2 {
        let code = ((formula >> 16) & 0xFF) as u8;
        Ok((Either::Left(CellType::Error), to_error_value(code).to_owned()))
    } else if flag == 3 {
        Ok((Either::Left(CellType::InlineString), String::new()))
    } else {
        Err(XlsError::FormulaValueError(formula))?
    }
}
