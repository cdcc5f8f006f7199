//! Command line configuration.
use crate::error::SheetLoaderError;
use crate::spreadsheet::criteria::Criteria;
use clap::Parser;
use glob::Pattern;
use std::collections::HashSet;

/// Imports every sheet of a workbook into DuckDB tables, then walks one
/// table through a record lifecycle.
#[derive(Parser, Debug, Clone)]
#[command(name = "sheet_loader", version, about)]
pub struct Config {
    /// Workbook to import (.xlsx, .xlsm, .xlam or .ods), local path or URL
    #[arg(default_value = "sample_datasets.xlsx")]
    pub file: String,

    /// DuckDB database file, or `:memory:`
    #[arg(long, default_value = "sheet_loader.duckdb")]
    pub database: String,

    /// Only import sheets whose name matches this glob (repeatable)
    #[arg(long = "sheet", value_name = "GLOB")]
    pub sheets: Vec<String>,

    /// Text read as NULL in addition to the empty string (repeatable)
    #[arg(long = "null", value_name = "LITERAL")]
    pub nulls: Vec<String>,

    /// Fail on error cells such as #DIV/0! instead of reading them as NULL
    #[arg(long)]
    pub strict_errors: bool,

    /// Table used for the record lifecycle demo
    #[arg(long, default_value = "employees")]
    pub demo_table: String,

    /// Skip the record lifecycle demo
    #[arg(long)]
    pub skip_demo: bool,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    pub fn is_in_memory(&self) -> bool {
        self.database == ":memory:"
    }

    /// Reading options for the spreadsheet readers.
    pub fn criteria(&self) -> Result<Criteria, SheetLoaderError> {
        let sheet_name_patterns = if self.sheets.is_empty() {
            None
        } else {
            Some(
                self.sheets
                    .iter()
                    .map(|pattern| Pattern::new(pattern))
                    .collect::<Result<Vec<_>, _>>()?,
            )
        };
        let mut nulls = HashSet::from([String::new()]);
        nulls.extend(self.nulls.iter().cloned());
        Ok(Criteria {
            sheet_name_patterns,
            nulls,
            error_as_null: !self.strict_errors,
            ..Criteria::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_bare_run() {
        let config = Config::parse_from(["sheet_loader"]);
        assert_eq!(config.file, "sample_datasets.xlsx");
        assert_eq!(config.database, "sheet_loader.duckdb");
        assert_eq!(config.demo_table, "employees");
        assert!(!config.skip_demo && !config.strict_errors && !config.verbose);

        let criteria = config.criteria().unwrap();
        assert!(criteria.sheet_name_patterns.is_none());
        assert_eq!(criteria.nulls, HashSet::from([String::new()]));
        assert!(criteria.error_as_null);
        assert!(criteria.skip_empty_rows);
    }

    #[test]
    fn flags_shape_the_criteria() {
        let config = Config::parse_from([
            "sheet_loader", "book.ods", "--database", ":memory:", "--sheet", "Emp*", "--sheet", "Orders",
            "--null", "N/A", "--strict-errors", "--skip-demo",
        ]);
        assert_eq!(config.file, "book.ods");
        assert!(config.is_in_memory());
        assert!(config.skip_demo);

        let criteria = config.criteria().unwrap();
        assert!(criteria.accept("Employees"));
        assert!(criteria.accept("Orders"));
        assert!(!criteria.accept("Archive"));
        assert!(criteria.nulls.contains("N/A") && criteria.nulls.contains(""));
        assert!(!criteria.error_as_null);
    }

    #[test]
    fn invalid_sheet_pattern_is_an_error() {
        let config = Config::parse_from(["sheet_loader", "--sheet", "[unclosed"]);
        assert!(matches!(config.criteria(), Err(SheetLoaderError::PatternError(_))));
    }
}
