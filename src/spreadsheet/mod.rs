//! # Spreadsheet Reading
//!
//! Readers for Office Open XML (.xlsx, .xlsm, .xlam) and OpenDocument (.ods)
//! workbooks. Each reader turns the worksheets it is asked for into [`Sheet`]
//! grids of typed cells; the database side builds tables from those grids.
pub(crate) mod cell;
pub mod criteria;
pub(crate) mod excel;
pub(crate) mod ods;
pub(crate) mod reference;
pub mod sheet;
pub(crate) mod xlsx;

use crate::error::SheetLoaderError;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::ods::OdsSpreadsheet;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Unsupported file format: '{0}'")]
    UnsupportedFormatError(String),

    #[error("Spreadsheet is password protected: '{0}'")]
    SpreadsheetPasswordProtectedError(String),

    #[error("Spreadsheet has no worksheet: '{0}'")]
    SpreadsheetEmptyError(String),

    #[error("Missing part in spreadsheet: '{0}'")]
    FileError(String),

    #[error("Invalid cell value in '{0}' sheet '{1}' at {2}: {3}")]
    CellValueError(String, String, String, String),
}

/// Common interface of the workbook readers.
pub trait Spreadsheet {
    /// Returns the file name (or URL) the workbook was opened from.
    fn name(&self) -> String;

    /// Lists the worksheet names in workbook order.
    fn sheet_names(&mut self) -> Result<Vec<String>, SheetLoaderError>;

    /// Reads the worksheets accepted by the criteria, in workbook order.
    fn read_sheets(&mut self, criteria: &Criteria) -> Result<Vec<Sheet>, SheetLoaderError>;
}

/// Opens a workbook, choosing the reader from the file extension.
/// Query strings and fragments of remote URLs are ignored.
pub fn open_spreadsheet(file_name: &str) -> Result<Box<dyn Spreadsheet>, SheetLoaderError> {
    let path = file_name
        .split(['?', '#'])
        .next()
        .unwrap_or(file_name);
    let extension = Path::new(path)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_ascii_lowercase());

    match extension.as_deref() {
        Some("xlsx") | Some("xlsm") | Some("xlam") => Ok(Box::new(XlsxSpreadsheet::open(file_name)?)),
        Some("ods") => Ok(Box::new(OdsSpreadsheet::open(file_name)?)),
        _ => Err(SpreadsheetError::UnsupportedFormatError(file_name.to_owned()).into()),
    }
}
