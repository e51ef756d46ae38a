use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::range::Range;
use crate::spreadsheet::reference::MAX_ROWS;
use crate::spreadsheet::CellGrid;
use std::collections::HashMap;

/// A decoded worksheet: sparse cells addressable by zero-based (row, column).
#[derive(Clone, Debug, Default)]
pub struct Sheet {
    /// Sheet name
    pub(crate) name: String,
    /// All non-empty cells in the sheet, in reading order
    pub(crate) cells: Vec<Cell>,
    /// Index mapping from (row, column) to cell vector position
    indexes: HashMap<(usize, usize), usize>,
    /// Bounding reference stored by the workbook (`<dimension ref>` for xlsx)
    pub(crate) dimension: Option<Range>,
    /// Actual data range, determined from cell positions
    pub(crate) row_lower_bound: Option<usize>,
    pub(crate) row_upper_bound: Option<usize>,
    pub(crate) col_lower_bound: Option<usize>,
    pub(crate) col_upper_bound: Option<usize>,
}

impl Sheet {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    /// Builds an in-memory sheet from rows of display text.
    /// Empty strings are treated as absent cells.
    pub fn from_rows<R, C>(name: &str, rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let mut sheet = Sheet::new(name);
        for (row, columns) in rows.into_iter().enumerate() {
            for (col, text) in columns.into_iter().enumerate() {
                let text = text.as_ref();
                if !text.is_empty() {
                    sheet.push(Cell {
                        row,
                        col,
                        kind: CellType::InlineString,
                        value: text.to_owned(),
                    });
                }
            }
        }
        sheet
    }

    /// Sheet name as stored in the workbook.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the sheet contains no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a cell to the sheet, updating the data range. A later cell at the
    /// same position replaces the earlier one.
    pub(crate) fn push(&mut self, cell: Cell) {
        self.update_bound(cell.row, cell.col);
        match self.indexes.get(&(cell.row, cell.col)) {
            Some(index) => self.cells[*index] = cell,
            None => {
                self.indexes.insert((cell.row, cell.col), self.cells.len());
                self.cells.push(cell);
            }
        }
    }

    /// Updates the actual data range boundaries based on cell positions.
    fn update_bound(&mut self, row: usize, col: usize) {
        if self.row_lower_bound.map(|row_lower_bound| row < row_lower_bound).unwrap_or(true) {
            self.row_lower_bound = Some(row);
        }
        if self.row_upper_bound.map(|row_upper_bound| row_upper_bound < row).unwrap_or(true) {
            self.row_upper_bound = Some(row);
        }
        if self.col_lower_bound.map(|col_lower_bound| col < col_lower_bound).unwrap_or(true) {
            self.col_lower_bound = Some(col);
        }
        if self.col_upper_bound.map(|col_upper_bound| col_upper_bound < col).unwrap_or(true) {
            self.col_upper_bound = Some(col);
        }
    }

    /// Gets the cell at the specified position, if present.
    pub(crate) fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.indexes
            .get(&(row, col))
            .and_then(|index| self.cells.get(*index))
    }

    /// Bounds of the sheet: the stored bounding reference widened by the
    /// populated range. `None` when neither is known.
    pub fn bounds(&self) -> Option<Range> {
        let populated = self.row_lower_bound.map(|_| Range {
            row_lower_bound: self.row_lower_bound,
            row_upper_bound: self.row_upper_bound,
            col_lower_bound: self.col_lower_bound,
            col_upper_bound: self.col_upper_bound,
        });
        match (self.dimension, populated) {
            (Some(dimension), Some(populated)) => Some(dimension.union(populated)),
            (dimension, populated) => dimension.or(populated),
        }
    }
}

impl CellGrid for Sheet {
    fn cell_text(&self, row: usize, col: usize) -> String {
        self.get(row, col)
            .map(|cell| cell.to_string())
            .unwrap_or_default()
    }

    fn last_row(&self) -> usize {
        self.bounds()
            .and_then(|range| range.last_row())
            .map(|row| row.min(MAX_ROWS - 1))
            .unwrap_or(0)
    }

    fn has_bounds(&self) -> bool {
        self.bounds().is_some()
    }
}
