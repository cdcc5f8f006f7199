//! # Sheet Loader
//!
//! Imports the sheets of Excel (`.xlsx`, `.xlsm`, `.xlam`) and OpenDocument
//! (`.ods`) workbooks into DuckDB tables, one table per sheet.
//!
//! ## Features
//!
//! - **Table naming**: sheet names and headers are normalized into lowercase
//!   identifiers (`Sales-2024` becomes `sales_2024`)
//! - **Type inference**: each column is typed as Integer, Float, Boolean,
//!   Timestamp or Text from the values of its data rows
//! - **Schema evolution**: new sheet columns are added to existing tables,
//!   existing columns are never dropped or altered
//! - **Transactional loads**: every table is loaded in one transaction
//! - **Record operations**: create, read, update and delete rows of any
//!   imported table by key
//!
//! ## Example
//!
//! ```no_run
//! use duckdb::Connection;
//! use sheet_loader::importer::Importer;
//! use sheet_loader::spreadsheet::criteria::Criteria;
//!
//! let mut connection = Connection::open_in_memory()?;
//! let report = Importer::new(&mut connection, Criteria::default()).import_file("sample_datasets.xlsx")?;
//! for sheet in &report.sheets {
//!     println!("{sheet}");
//! }
//! # Ok::<(), sheet_loader::error::SheetLoaderError>(())
//! ```
pub mod config;
pub mod database;
pub mod demo;
pub mod error;
pub mod importer;
pub mod logging;
pub mod spreadsheet;

pub(crate) mod helpers;

#[cfg(test)]
mod test_support;
