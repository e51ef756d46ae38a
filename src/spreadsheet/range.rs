use crate::error::InvoiceSheetError;
use crate::spreadsheet::reference::col_to_index;
use crate::spreadsheet::reference::row_to_index;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors related to Excel-style range parsing.
#[derive(Error, Debug)]
pub enum RangeError {
    #[error("Invalid range format '{0}'")]
    FormatError(String),
}

/// Represents an Excel-style cell range with optional boundaries.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Range {
    /// Lower row bound (0-based index), None for unbounded
    pub row_lower_bound: Option<usize>,
    /// Upper row bound (0-based index), None for unbounded
    pub row_upper_bound: Option<usize>,
    /// Lower column bound (0-based index), None for unbounded
    pub col_lower_bound: Option<usize>,
    /// Upper column bound (0-based index), None for unbounded
    pub col_upper_bound: Option<usize>,
}

fn range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Z]*)(\d*)(:([A-Z]*)(\d*))?$").expect("Hardcode regex pattern")
    })
}

impl TryFrom<&str> for Range {
    type Error = InvoiceSheetError;

    /// Parses an Excel-style range string (e.g., "A1", "B2:C5", "A", "1:10").
    /// A single cell reference yields a range whose lower and upper bounds coincide.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.replace('$', "").to_ascii_uppercase();
        let captures = range_pattern()
            .captures(value.as_str())
            .ok_or(RangeError::FormatError(value.to_owned()))?;
        let col_lower_bound = captures.get(1).and_then(|matcher| col_to_index(matcher.as_str()));
        let row_lower_bound = captures.get(2).and_then(|matcher| row_to_index(matcher.as_str()));
        let (col_upper_bound, row_upper_bound) = if captures.get(3).is_some() {
            (
                captures.get(4).and_then(|matcher| col_to_index(matcher.as_str())),
                captures.get(5).and_then(|matcher| row_to_index(matcher.as_str())),
            )
        } else {
            (col_lower_bound, row_lower_bound)
        };
        Ok(Range {
            row_lower_bound,
            row_upper_bound,
            col_lower_bound,
            col_upper_bound,
        })
    }
}

impl Range {
    /// Widens this range so it also covers `other`.
    pub fn union(self, other: Range) -> Range {
        fn pick(a: Option<usize>, b: Option<usize>, f: fn(usize, usize) -> usize) -> Option<usize> {
            match (a, b) {
                (Some(a), Some(b)) => Some(f(a, b)),
                (a, b) => a.or(b),
            }
        }
        Range {
            row_lower_bound: pick(self.row_lower_bound, other.row_lower_bound, usize::min),
            row_upper_bound: pick(self.row_upper_bound, other.row_upper_bound, usize::max),
            col_lower_bound: pick(self.col_lower_bound, other.col_lower_bound, usize::min),
            col_upper_bound: pick(self.col_upper_bound, other.col_upper_bound, usize::max),
        }
    }

    /// Last row covered by the range, when known.
    pub fn last_row(&self) -> Option<usize> {
        self.row_upper_bound.or(self.row_lower_bound)
    }
}
