use crate::invoice::fields::FieldMatcher;
use crate::invoice::fields::MandatoryFields;
use crate::spreadsheet::CellGrid;
use std::collections::BTreeMap;
use tracing::debug;

/// Mandatory field → lower-cased column label that satisfied it.
pub type FieldColumnMapping = BTreeMap<String, String>;

/// A located header row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderRow {
    /// Index of the first data row, directly below the header
    pub start_row: usize,
    /// Lower-cased header labels in column order
    pub columns: Vec<String>,
}

/// Outcome of the header search. `header` is `None` when no row satisfies
/// every mandatory field, in which case the mapping is empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderInfo {
    pub header: Option<HeaderRow>,
    pub field_column_mapping: FieldColumnMapping,
}

impl HeaderInfo {
    pub fn start_row(&self) -> Option<usize> {
        self.header.as_ref().map(|header| header.start_row)
    }

    pub fn columns(&self) -> Option<&[String]> {
        self.header.as_ref().map(|header| header.columns.as_slice())
    }
}

/// Finds the first row, from row 1 to the last row, whose contiguous labels
/// (starting at column 0) satisfy every mandatory field. Row 0 holds the
/// invoicing month and is never a header.
pub fn locate_header<G: CellGrid + ?Sized>(
    sheet: &G,
    fields: &MandatoryFields,
    matcher: &dyn FieldMatcher,
) -> HeaderInfo {
    for row in 1..=sheet.last_row() {
        let columns = read_labels(sheet, row);
        if columns.is_empty() {
            continue;
        }

        let mut mapping = FieldColumnMapping::new();
        for column in &columns {
            for field in fields.iter() {
                if matcher.matches(column, field) {
                    mapping.insert(field.to_owned(), column.to_owned());
                }
            }
        }

        let satisfied = fields
            .iter()
            .all(|field| columns.iter().any(|column| matcher.matches(column, field)));
        if satisfied {
            debug!(row, columns = columns.len(), "header row located");
            return HeaderInfo {
                header: Some(HeaderRow { start_row: row + 1, columns }),
                field_column_mapping: mapping,
            };
        }
    }
    HeaderInfo::default()
}

/// Lower-cased labels of `row`, up to the first empty cell.
fn read_labels<G: CellGrid + ?Sized>(sheet: &G, row: usize) -> Vec<String> {
    let mut labels = Vec::new();
    loop {
        let text = sheet.cell_text(row, labels.len());
        if text.is_empty() {
            return labels;
        }
        labels.push(text.to_lowercase());
    }
}
