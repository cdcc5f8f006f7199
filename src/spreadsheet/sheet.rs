use crate::database::value::CellValue;
use crate::error::SheetLoaderError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::SpreadsheetError;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;

/// Represents a sheet from a spreadsheet file as a sparse grid of cells.
#[derive(Debug)]
pub struct Sheet {
    /// Source file name
    pub(crate) file_name: String,
    /// Sheet name as it appears in the workbook
    pub name: String,
    /// All cells in the sheet, in reading order
    pub(crate) cells: Vec<Cell>,
    /// Position of each cell in `cells`, keyed by (row, col)
    indexes: HashMap<(usize, usize), usize>,
    /// Rows holding at least one cell, sorted
    rows: BTreeSet<usize>,
    /// Actual data range (determined from cell data)
    pub(crate) row_lower_bound: Option<usize>,
    pub(crate) row_upper_bound: Option<usize>,
    pub(crate) col_lower_bound: Option<usize>,
    pub(crate) col_upper_bound: Option<usize>,
}

impl Sheet {
    pub(crate) fn new(file_name: &str, name: &str) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            cells: Vec::new(),
            indexes: HashMap::new(),
            rows: BTreeSet::new(),
            row_lower_bound: None,
            row_upper_bound: None,
            col_lower_bound: None,
            col_upper_bound: None,
        }
    }

    /// Returns true if the sheet contains no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a cell to the sheet, updating the data range.
    /// A later cell at the same position replaces the earlier one.
    pub(crate) fn push(&mut self, cell: Cell) {
        self.update_bound(cell.row, cell.col);
        self.rows.insert(cell.row);
        self.indexes.insert((cell.row, cell.col), self.cells.len());
        self.cells.push(cell);
    }

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

    pub(crate) fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.indexes.get(&(row, col)).map(|index| &self.cells[*index])
    }

    fn value(&self, row: usize, col: usize, nulls: &HashSet<String>) -> Result<CellValue, SheetLoaderError> {
        match self.get(row, col) {
            None => Ok(CellValue::Null),
            Some(cell) => Ok(cell.to_value(nulls).map_err(|message| {
                SpreadsheetError::CellValueError(
                    self.file_name.to_owned(),
                    self.name.to_owned(),
                    cell.reference(),
                    message,
                )
            })?),
        }
    }

    fn row_values(&self, row: usize, nulls: &HashSet<String>) -> Result<Vec<CellValue>, SheetLoaderError> {
        match (self.col_lower_bound, self.col_upper_bound) {
            (Some(col_lower), Some(col_upper)) => (col_lower..=col_upper)
                .map(|col| self.value(row, col, nulls))
                .collect(),
            _ => Ok(Vec::new()),
        }
    }

    /// Locates the first row holding a non-null value.
    fn header_row(&self, nulls: &HashSet<String>) -> Result<Option<(usize, Vec<CellValue>)>, SheetLoaderError> {
        for row in self.rows.iter() {
            let values = self.row_values(*row, nulls)?;
            if values.iter().any(|value| !value.is_null()) {
                return Ok(Some((*row, values)));
            }
        }
        Ok(None)
    }

    /// Header titles of the sheet, one per column between the left-most and
    /// the right-most used cell. Blank titles become `unnamed_<n>`.
    /// Returns an empty list for a sheet without any value.
    pub fn header(&self, nulls: &HashSet<String>) -> Result<Vec<String>, SheetLoaderError> {
        let Some((_, values)) = self.header_row(nulls)? else {
            return Ok(Vec::new());
        };
        Ok(values
            .into_iter()
            .enumerate()
            .map(|(index, value)| match value {
                CellValue::Null => format!("unnamed_{}", index + 1),
                CellValue::Text(text) if text.trim().is_empty() => format!("unnamed_{}", index + 1),
                CellValue::Text(text) => text,
                other => other.to_string(),
            })
            .collect())
    }

    /// Data rows below the header, aligned with the header columns.
    pub fn records(&self, nulls: &HashSet<String>, skip_empty_rows: bool) -> Result<Vec<Vec<CellValue>>, SheetLoaderError> {
        let Some((header_row, _)) = self.header_row(nulls)? else {
            return Ok(Vec::new());
        };
        let Some(row_upper_bound) = self.row_upper_bound else {
            return Ok(Vec::new());
        };

        let mut records = Vec::<Vec<CellValue>>::new();
        for row in (header_row + 1)..=row_upper_bound {
            if skip_empty_rows && !self.rows.contains(&row) {
                continue;
            }
            let values = self.row_values(row, nulls)?;
            if skip_empty_rows && values.iter().all(CellValue::is_null) {
                continue;
            }
            records.push(values);
        }
        Ok(records)
    }
}
