use crate::error::InvoiceSheetError;
use crate::spreadsheet::reference::index_to_reference;
use chrono::Duration;
use chrono::NaiveDate;
use iso8601_duration::Duration as IsoDuration;
use std::fmt::Display;
use tracing::debug;

/// Types of cell data in spreadsheet files.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values stored as `1`/`0`
    Boolean,
    /// Numeric values
    Number,
    /// Date/time values stored as numbers from 1900 epoch
    NumberDateTime1900,
    /// Date values stored as numbers from 1900 epoch
    NumberDate1900,
    /// Time values stored as numbers from 1900 epoch
    NumberTime1900,
    /// Date/time values stored as numbers from 1904 epoch
    NumberDateTime1904,
    /// Date values stored as numbers from 1904 epoch
    NumberDate1904,
    /// Time values stored as numbers from 1904 epoch
    NumberTime1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// ISO 8601 duration strings
    IsoDuration,
    /// Inline string values
    InlineString,
    /// Shared string table references, resolved to their text when read
    SharedString,
    /// Error values (`#N/A`, `#DIV/0!`)
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }),
            _ => None,
        }
    }

    /// Parses custom number format strings to determine cell type.
    /// Quoted literals, escapes and bracketed sections (colors, conditions) are ignored.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, false) => Self::NumberTime1900,
            (false, true, true) => Self::NumberTime1904,
            (false, false, _) => Self::Number,
        }
    }
}

/// Maps a binary error code to its displayed text.
pub(crate) fn to_error_value(value: u8) -> &'static str {
    match value {
        0x00 => "#NULL!",
        0x07 => "#DIV/0!",
        0x0F => "#VALUE!",
        0x17 => "#REF!",
        0x1D => "#NAME?",
        0x24 => "#NUM!",
        0x2A => "#N/A",
        0x2B => "#GETTING_DATA",
        _ => "#ERROR!",
    }
}

/// Represents a single cell in a spreadsheet with position, type, and value.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    /// Cell data type
    pub(crate) kind: CellType,
    /// Cell value as stored in the workbook
    pub(crate) value: String,
}

impl Cell {
    /// Returns the Excel-style cell reference (e.g., "A1", "B2").
    pub(crate) fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Renders the cell the way it is displayed, falling back to the stored value.
    fn display_value(&self) -> Result<String, InvoiceSheetError> {
        let value = match self.kind {
            CellType::Boolean => if self.value == "1" { "true" } else { "false" }.to_owned(),
            CellType::NumberDateTime1900 => to_datetime_string(&self.value, false)?,
            CellType::NumberDate1900 => to_date_string(&self.value, false)?,
            CellType::NumberDateTime1904 => to_datetime_string(&self.value, true)?,
            CellType::NumberDate1904 => to_date_string(&self.value, true)?,
            CellType::NumberTime1900 | CellType::NumberTime1904 => to_time_string(&self.value)?,
            CellType::IsoDateTime => self.value.replace('T', " "),
            CellType::IsoDuration => to_duration_string(&self.value)?,
            _ => self.value.to_owned(),
        };
        Ok(value)
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.display_value() {
            Ok(value) => write!(f, "{}", value),
            Err(error) => {
                debug!(cell = %self.reference(), "Keeping stored value: {}", error);
                write!(f, "{}", self.value)
            }
        }
    }
}

/// Converts Excel numeric date to ISO date string.
/// Handles Lotus 1-2-3 leap year bug for 1900 epoch.
fn to_date_string(value: &str, is_1904: bool) -> Result<String, InvoiceSheetError> {
    let days = value.parse::<f64>()?.trunc() as i64;
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).expect("NaiveDate Literal");
    let date = epoch
        .checked_add_signed(Duration::days(days + offset))
        .ok_or_else(|| InvoiceSheetError::WithContextError(format!("Date serial '{}' out of range", value)))?;
    Ok(date.format("%Y-%m-%d").to_string())
}

/// Converts Excel numeric time (fraction of a day) to `HH:MM:SS[.mmm]`.
fn to_time_string(value: &str) -> Result<String, InvoiceSheetError> {
    let factor = value.parse::<f64>()?.fract();
    let mut hours = (factor * 86_400_000f64).round() as i64;
    let milliseconds = hours % 1_000;
    hours /= 1_000;
    let seconds = hours % 60;
    hours /= 60;
    let minutes = hours % 60;
    hours /= 60;
    let timestamp = if milliseconds > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    };
    Ok(timestamp)
}

/// Converts Excel numeric datetime to ISO datetime string.
fn to_datetime_string(value: &str, is_1904: bool) -> Result<String, InvoiceSheetError> {
    let date = to_date_string(value, is_1904)?;
    let time = to_time_string(value)?;
    Ok(format!("{date} {time}"))
}

/// Converts an ISO 8601 duration (`PT13H30M`) to `HH:MM:SS`.
fn to_duration_string(value: &str) -> Result<String, InvoiceSheetError> {
    let duration = value
        .parse::<IsoDuration>()
        .map_err(|_| InvoiceSheetError::WithContextError(format!("Parse '{}' to iso8601 duration failed", value)))?;
    let hours = duration.day as i64 * 24 + duration.hour as i64;
    let minutes = duration.minute as i64;
    let seconds = duration.second as i64;
    Ok(format!("{hours:02}:{minutes:02}:{seconds:02}"))
}
