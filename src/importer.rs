//! Drives every sheet of a workbook through table building, schema
//! synchronization and loading.
use crate::database::loader;
use crate::database::schema::synchronize;
use crate::database::schema::SchemaCache;
use crate::database::schema::SyncOutcome;
use crate::database::table::Table;
use crate::error::ResultMessage;
use crate::error::SheetLoaderError;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::open_spreadsheet;
use crate::spreadsheet::sheet::Sheet;
use duckdb::Connection;
use std::fmt::Display;
use tracing::error;
use tracing::info;
use tracing::warn;

#[derive(Clone, Debug, PartialEq)]
pub enum SheetOutcome {
    /// No header column or no data row
    Skipped,
    /// The sheet could not be turned into a table
    Rejected(String),
    SchemaFailed(String),
    Loaded { schema: SyncOutcome, rows: usize },
    LoadFailed { schema: SyncOutcome, error: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SheetReport {
    pub sheet_name: String,
    pub table_name: String,
    pub outcome: SheetOutcome,
}

impl Display for SheetReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}: ", self.sheet_name, self.table_name)?;
        match &self.outcome {
            SheetOutcome::Skipped => write!(f, "skipped (empty)"),
            SheetOutcome::Rejected(error) => write!(f, "rejected ({error})"),
            SheetOutcome::SchemaFailed(error) => write!(f, "schema failed ({error})"),
            SheetOutcome::Loaded { schema, rows } => write!(f, "{} row(s) loaded, {}", rows, describe(schema)),
            SheetOutcome::LoadFailed { schema, error } => write!(f, "load failed ({error}), {}", describe(schema)),
        }
    }
}

fn describe(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Created => "table created".to_owned(),
        SyncOutcome::Evolved { added } => format!("column(s) added: {}", added.join(", ")),
        SyncOutcome::Unchanged => "schema unchanged".to_owned(),
    }
}

/// Per-sheet results of one import run, in sheet order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportReport {
    pub sheets: Vec<SheetReport>,
}

impl ImportReport {
    pub fn rows_loaded(&self) -> usize {
        self.sheets
            .iter()
            .map(|report| match report.outcome {
                SheetOutcome::Loaded { rows, .. } => rows,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SheetReport> {
        self.sheets.iter().filter(|report| {
            matches!(
                report.outcome,
                SheetOutcome::Rejected(_) | SheetOutcome::SchemaFailed(_) | SheetOutcome::LoadFailed { .. }
            )
        })
    }
}

pub struct Importer<'a> {
    connection: &'a mut Connection,
    schema_cache: SchemaCache,
    criteria: Criteria,
}

impl<'a> Importer<'a> {
    pub fn new(connection: &'a mut Connection, criteria: Criteria) -> Self {
        Importer {
            connection,
            schema_cache: SchemaCache::default(),
            criteria,
        }
    }

    pub fn schema_cache(&self) -> &SchemaCache {
        &self.schema_cache
    }

    /// Imports every selected sheet of the workbook.
    ///
    /// Failing to open or read the workbook is an error. Failures of single
    /// sheets are logged and recorded in the report, and the run goes on.
    pub fn import_file(&mut self, file_name: &str) -> Result<ImportReport, SheetLoaderError> {
        let mut spreadsheet = open_spreadsheet(file_name).with_prefix(file_name)?;
        let names = spreadsheet.sheet_names().with_prefix(file_name)?;
        info!("Sheets in {}: {}", spreadsheet.name(), names.join(", "));

        let sheets = spreadsheet.read_sheets(&self.criteria).with_prefix(file_name)?;
        let mut report = ImportReport::default();
        for sheet in &sheets {
            report.sheets.push(self.process_sheet(sheet));
        }
        Ok(report)
    }

    /// Builds, synchronizes and loads one sheet. Each step that fails stops
    /// the sheet and is recorded; nothing is rolled back across sheets.
    pub fn process_sheet(&mut self, sheet: &Sheet) -> SheetReport {
        let mut report = SheetReport {
            sheet_name: sheet.name.to_owned(),
            table_name: crate::database::table::normalize_name(&sheet.name),
            outcome: SheetOutcome::Skipped,
        };

        let table = match Table::from_sheet(sheet, &self.criteria) {
            Ok(Some(table)) => table,
            Ok(None) => {
                info!("Skipping empty sheet '{}'", sheet.name);
                return report;
            }
            Err(e) => {
                warn!("Skipping sheet '{}': {}", sheet.name, e);
                report.outcome = SheetOutcome::Rejected(e.to_string());
                return report;
            }
        };
        info!("Processing sheet '{}' as table '{}'", sheet.name, table.name);

        let schema = match synchronize(self.connection, &mut self.schema_cache, &table) {
            Ok(schema) => schema,
            Err(e) => {
                error!("Schema update for table '{}' failed: {}", table.name, e);
                report.outcome = SheetOutcome::SchemaFailed(e.to_string());
                return report;
            }
        };

        report.outcome = match loader::load(self.connection, &table) {
            Ok(rows) => {
                info!("Loaded {} row(s) into table '{}'", rows, table.name);
                SheetOutcome::Loaded { schema, rows }
            }
            Err(e) => {
                error!("Error loading data into table '{}': {}", table.name, e);
                SheetOutcome::LoadFailed { schema, error: e.to_string() }
            }
        };
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::XlsxBuilder;

    fn count(connection: &Connection, table: &str) -> i64 {
        connection
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn imports_every_sheet_into_its_own_table() {
        let directory = tempfile::tempdir().unwrap();
        let path = XlsxBuilder::new()
            .sheet("Employees", &[
                &["id", "name", "department", "salary"],
                &["1", "Bob", "HR", "50000"],
                &["2", "Eve", "IT", "65000.5"],
            ])
            .sheet("Empty Sheet", &[&["only", "header"]])
            .sheet("Sales-2024", &[&["Order ID", "Shipped"], &["10", "#45292"]])
            .write(directory.path(), "book.xlsx");

        let mut connection = Connection::open_in_memory().unwrap();
        let report = Importer::new(&mut connection, Criteria::default()).import_file(&path).unwrap();

        assert_eq!(report.sheets.len(), 3);
        assert_eq!(report.sheets[0].outcome, SheetOutcome::Loaded { schema: SyncOutcome::Created, rows: 2 });
        assert_eq!(report.sheets[1].outcome, SheetOutcome::Skipped);
        assert_eq!(report.sheets[2].table_name, "sales_2024");
        assert_eq!(report.rows_loaded(), 3);
        assert_eq!(report.failures().count(), 0);

        assert_eq!(count(&connection, "employees"), 2);
        let salary_type: String = connection
            .query_row(
                "SELECT data_type FROM information_schema.columns WHERE table_name = 'employees' AND column_name = 'salary'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(salary_type, "DOUBLE");
        let shipped_type: String = connection
            .query_row(
                "SELECT data_type FROM information_schema.columns WHERE table_name = 'sales_2024' AND column_name = 'shipped'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(shipped_type, "TIMESTAMP");
        let empty_tables: i64 = connection
            .query_row("SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'empty_sheet'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(empty_tables, 0);
    }

    #[test]
    fn second_run_evolves_schema_and_reports_key_conflicts() {
        let directory = tempfile::tempdir().unwrap();
        let first = XlsxBuilder::new()
            .sheet("Employees", &[&["id", "name"], &["1", "Bob"]])
            .write(directory.path(), "first.xlsx");
        let second = XlsxBuilder::new()
            .sheet("Employees", &[&["id", "name", "Start Date"], &["2", "Eve", "#45300"]])
            .sheet("Projects", &[&["code", "budget"], &["P1", "1000"]])
            .write(directory.path(), "second.xlsx");

        let mut connection = Connection::open_in_memory().unwrap();
        let mut importer = Importer::new(&mut connection, Criteria::default());
        importer.import_file(&first).unwrap();
        let report = importer.import_file(&second).unwrap();

        assert_eq!(
            report.sheets[0].outcome,
            SheetOutcome::Loaded { schema: SyncOutcome::Evolved { added: vec!["start_date".into()] }, rows: 1 }
        );
        assert_eq!(report.sheets[1].outcome, SheetOutcome::Loaded { schema: SyncOutcome::Created, rows: 1 });
        assert!(importer.schema_cache().get("employees").unwrap().contains("start_date"));

        // Same rows again: the key from the first column rejects them, other sheets still run
        let again = importer.import_file(&first).unwrap();
        assert!(matches!(again.sheets[0].outcome, SheetOutcome::LoadFailed { schema: SyncOutcome::Unchanged, .. }));
        assert_eq!(again.failures().count(), 1);

        drop(importer);
        assert_eq!(count(&connection, "employees"), 2);
        let start: Option<String> = connection
            .query_row("SELECT CAST(start_date AS VARCHAR) FROM employees WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(start, None);
    }

    #[test]
    fn conflicting_types_surface_as_load_failures() {
        let directory = tempfile::tempdir().unwrap();
        let first = XlsxBuilder::new()
            .sheet("Scores", &[&["id", "score"], &["1", "10"]])
            .write(directory.path(), "first.xlsx");
        let second = XlsxBuilder::new()
            .sheet("Scores", &[&["id", "score"], &["2", "high"]])
            .write(directory.path(), "second.xlsx");

        let mut connection = Connection::open_in_memory().unwrap();
        let mut importer = Importer::new(&mut connection, Criteria::default());
        importer.import_file(&first).unwrap();
        let report = importer.import_file(&second).unwrap();
        assert!(matches!(report.sheets[0].outcome, SheetOutcome::LoadFailed { .. }));
    }

    #[test]
    fn duplicate_headers_reject_only_that_sheet() {
        let directory = tempfile::tempdir().unwrap();
        let path = XlsxBuilder::new()
            .sheet("Broken", &[&["First Name", "first-name"], &["a", "b"]])
            .sheet("Fine", &[&["id"], &["1"]])
            .write(directory.path(), "book.xlsx");

        let mut connection = Connection::open_in_memory().unwrap();
        let report = Importer::new(&mut connection, Criteria::default()).import_file(&path).unwrap();
        assert!(matches!(report.sheets[0].outcome, SheetOutcome::Rejected(_)));
        assert_eq!(report.sheets[1].outcome, SheetOutcome::Loaded { schema: SyncOutcome::Created, rows: 1 });
        assert!(report.sheets[0].to_string().starts_with("Broken -> broken: rejected"));
    }

    #[test]
    fn strict_error_cell_rejects_only_its_sheet() {
        let directory = tempfile::tempdir().unwrap();
        let path = XlsxBuilder::new()
            .sheet("Good", &[&["id", "ratio"], &["1", "0.5"]])
            .sheet("Bad", &[&["id", "ratio"], &["1", "!#DIV/0!"]])
            .write(directory.path(), "book.xlsx");
        let strict = Criteria {
            error_as_null: false,
            ..Criteria::default()
        };

        let mut connection = Connection::open_in_memory().unwrap();
        let report = Importer::new(&mut connection, strict).import_file(&path).unwrap();
        assert_eq!(report.sheets[0].outcome, SheetOutcome::Loaded { schema: SyncOutcome::Created, rows: 1 });
        match &report.sheets[1].outcome {
            SheetOutcome::Rejected(error) => {
                assert!(error.contains("B2"));
                assert!(error.contains("#DIV/0!"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(count(&connection, "good"), 1);
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let mut connection = Connection::open_in_memory().unwrap();
        let error = Importer::new(&mut connection, Criteria::default())
            .import_file("/nonexistent/book.xlsx")
            .unwrap_err();
        assert!(error.to_string().starts_with("/nonexistent/book.xlsx: "));
    }
}
