use crate::database::column::ColumnDescriptor;
use crate::database::column::ColumnType;
use crate::database::value::CellValue;
use crate::error::SheetLoaderError;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::sheet::Sheet;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Sheet '{sheet}' has more than one column named '{column}' after normalization")]
    DuplicateColumnError { sheet: String, column: String },
}

/// Lowercases a sheet or header name and turns spaces and hyphens into underscores.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase().replace([' ', '-'], "_")
}

/// A sheet turned into a loadable table: normalized names, inferred column
/// types, and the data rows aligned with the columns.
#[derive(Clone, Debug)]
pub struct Table {
    pub name: String,
    pub sheet_name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Builds the table for a sheet, or `None` when the sheet has no header
    /// columns or no data rows.
    pub fn from_sheet(sheet: &Sheet, criteria: &Criteria) -> Result<Option<Table>, SheetLoaderError> {
        let header = sheet.header(&criteria.nulls)?;
        if header.is_empty() {
            return Ok(None);
        }
        let rows = sheet.records(&criteria.nulls, criteria.skip_empty_rows)?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut seen = HashSet::<String>::new();
        let mut columns = Vec::<ColumnDescriptor>::with_capacity(header.len());
        for (index, title) in header.iter().enumerate() {
            let name = normalize_name(title);
            if !seen.insert(name.to_owned()) {
                return Err(TableError::DuplicateColumnError {
                    sheet: sheet.name.to_owned(),
                    column: name,
                }
                .into());
            }
            let kind = ColumnType::infer(rows.iter().map(|row| &row[index]));
            columns.push(ColumnDescriptor {
                name,
                kind,
                is_primary_key: index == 0,
            });
        }

        Ok(Some(Table {
            name: normalize_name(&sheet.name),
            sheet_name: sheet.name.to_owned(),
            columns,
            rows,
        }))
    }

    pub fn primary_key(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|column| column.is_primary_key)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }
}
