use crate::database::column::ColumnDescriptor;
use crate::database::column::ColumnType;
use crate::database::quote_ident;
use crate::database::table::Table;
use crate::error::SheetLoaderError;
use duckdb::Connection;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;
use tracing::info;

const COLUMNS_QUERY: &str = "SELECT column_name, data_type FROM information_schema.columns \
    WHERE table_catalog = current_database() AND table_schema = current_schema() AND table_name = ? \
    ORDER BY ordinal_position";

const PRIMARY_KEY_QUERY: &str = "SELECT unnest(constraint_column_names) FROM duckdb_constraints() \
    WHERE database_name = current_database() AND schema_name = current_schema() AND table_name = ? \
    AND constraint_type = 'PRIMARY KEY'";

/// Column used to identify records when a table has no primary key.
pub const FALLBACK_KEY_COLUMN: &str = "id";

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Cannot create table '{table}': {message}")]
    CreateTableError { table: String, message: String },

    #[error("Cannot add column '{column}' to table '{table}': {message}")]
    AddColumnError { table: String, column: String, message: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SchemaColumn {
    pub name: String,
    /// Type name as reported by the database
    pub sql_type: String,
}

impl SchemaColumn {
    pub fn kind(&self) -> Option<ColumnType> {
        ColumnType::parse(&self.sql_type)
    }
}

/// Columns and primary key of a table as currently stored in the database.
#[derive(Clone, Debug, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<SchemaColumn>,
    pub primary_key: Option<String>,
}

impl TableSchema {
    /// Identifiers are case-insensitive in DuckDB.
    pub fn column(&self, name: &str) -> Option<&SchemaColumn> {
        self.columns.iter().find(|column| column.name.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// The primary-key column, or `id` for a table created without one.
    pub fn key_column(&self) -> &str {
        self.primary_key.as_deref().unwrap_or(FALLBACK_KEY_COLUMN)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }
}

/// Reads the live schema of a table; `None` when the table does not exist.
pub fn reflect_table(connection: &Connection, name: &str) -> Result<Option<TableSchema>, SheetLoaderError> {
    let mut statement = connection.prepare(COLUMNS_QUERY)?;
    let columns = statement
        .query_map([name], |row| {
            Ok(SchemaColumn {
                name: row.get(0)?,
                sql_type: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    if columns.is_empty() {
        return Ok(None);
    }

    let mut statement = connection.prepare(PRIMARY_KEY_QUERY)?;
    let keys = statement
        .query_map([name], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(TableSchema {
        name: name.to_owned(),
        columns,
        primary_key: keys.into_iter().next(),
    }))
}

/// Last known schema of each table.
///
/// Entries are only as fresh as the last [`SchemaCache::refresh`] for that
/// table; callers refresh right before acting on a table.
#[derive(Debug, Default)]
pub struct SchemaCache {
    tables: HashMap<String, TableSchema>,
}

impl SchemaCache {
    /// Re-reads the table from the database and returns the fresh entry.
    pub fn refresh(&mut self, connection: &Connection, name: &str) -> Result<Option<&TableSchema>, SheetLoaderError> {
        match reflect_table(connection, name)? {
            Some(schema) => {
                self.tables.insert(name.to_owned(), schema);
                Ok(self.tables.get(name))
            }
            None => {
                self.tables.remove(name);
                Ok(None)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }
}

/// What the synchronizer did to a table.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncOutcome {
    Created,
    Evolved { added: Vec<String> },
    Unchanged,
}

/// Creates the table, or adds the columns it is missing.
///
/// Existing columns are never altered or dropped. All the `ADD COLUMN`
/// statements of one table share a transaction: either every missing column
/// is added or none is.
pub fn synchronize(connection: &mut Connection, cache: &mut SchemaCache, table: &Table) -> Result<SyncOutcome, SheetLoaderError> {
    let existing = cache.refresh(connection, &table.name)?.cloned();
    let outcome = match existing {
        None => {
            create_table(connection, table)?;
            info!("Created table '{}' with {} column(s)", table.name, table.columns.len());
            SyncOutcome::Created
        }
        Some(schema) => {
            let missing: Vec<&ColumnDescriptor> = table
                .columns
                .iter()
                .filter(|column| !schema.contains(&column.name))
                .collect();
            if missing.is_empty() {
                debug!("Table '{}' is up to date", table.name);
                SyncOutcome::Unchanged
            } else {
                add_columns(connection, &table.name, &missing)?;
                let added: Vec<String> = missing.iter().map(|column| column.name.to_owned()).collect();
                for column in &added {
                    info!("Added column '{}' to table '{}'", column, table.name);
                }
                SyncOutcome::Evolved { added }
            }
        }
    };
    if outcome != SyncOutcome::Unchanged {
        cache.refresh(connection, &table.name)?;
    }
    Ok(outcome)
}

fn create_table(connection: &mut Connection, table: &Table) -> Result<(), SheetLoaderError> {
    let definitions = table
        .columns
        .iter()
        .map(ColumnDescriptor::definition)
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("CREATE TABLE {} ({})", quote_ident(&table.name), definitions);
    debug!("DDL: {sql}");

    let error = |e: duckdb::Error| SchemaError::CreateTableError {
        table: table.name.to_owned(),
        message: e.to_string(),
    };
    let transaction = connection.transaction().map_err(error)?;
    transaction.execute_batch(&sql).map_err(error)?;
    transaction.commit().map_err(error)?;
    Ok(())
}

fn add_columns(connection: &mut Connection, table: &str, columns: &[&ColumnDescriptor]) -> Result<(), SheetLoaderError> {
    let transaction = connection.transaction()?;
    for column in columns {
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_ident(table),
            quote_ident(&column.name),
            column.kind.as_sql(),
        );
        debug!("DDL: {sql}");
        transaction.execute_batch(&sql).map_err(|e| SchemaError::AddColumnError {
            table: table.to_owned(),
            column: column.name.to_owned(),
            message: e.to_string(),
        })?;
    }
    transaction.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, kind: ColumnType, is_primary_key: bool) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_owned(),
            kind,
            is_primary_key,
        }
    }

    fn employees(columns: Vec<ColumnDescriptor>) -> Table {
        Table {
            name: "employees".to_owned(),
            sheet_name: "Employees".to_owned(),
            columns,
            rows: Vec::new(),
        }
    }

    #[test]
    fn missing_table_reflects_as_none() {
        let connection = Connection::open_in_memory().unwrap();
        assert_eq!(reflect_table(&connection, "nothing").unwrap(), None);
    }

    #[test]
    fn creates_table_with_primary_key() {
        let mut connection = Connection::open_in_memory().unwrap();
        let mut cache = SchemaCache::default();
        let table = employees(vec![
            column("id", ColumnType::Integer, true),
            column("name", ColumnType::Text, false),
            column("salary", ColumnType::Float, false),
        ]);

        assert_eq!(synchronize(&mut connection, &mut cache, &table).unwrap(), SyncOutcome::Created);

        let schema = cache.get("employees").unwrap();
        assert_eq!(schema.column_names().collect::<Vec<_>>(), vec!["id", "name", "salary"]);
        assert_eq!(schema.primary_key.as_deref(), Some("id"));
        assert_eq!(schema.column("SALARY").and_then(SchemaColumn::kind), Some(ColumnType::Float));
    }

    #[test]
    fn resynchronizing_is_a_no_op() {
        let mut connection = Connection::open_in_memory().unwrap();
        let mut cache = SchemaCache::default();
        let table = employees(vec![column("id", ColumnType::Integer, true)]);

        synchronize(&mut connection, &mut cache, &table).unwrap();
        assert_eq!(synchronize(&mut connection, &mut cache, &table).unwrap(), SyncOutcome::Unchanged);
    }

    #[test]
    fn adds_exactly_the_missing_columns_and_keeps_rows() {
        let mut connection = Connection::open_in_memory().unwrap();
        let mut cache = SchemaCache::default();
        synchronize(&mut connection, &mut cache, &employees(vec![
            column("id", ColumnType::Integer, true),
            column("name", ColumnType::Text, false),
        ])).unwrap();
        connection.execute_batch("INSERT INTO employees VALUES (1, 'Alice')").unwrap();

        let wider = employees(vec![
            column("id", ColumnType::Integer, true),
            column("name", ColumnType::Text, false),
            column("salary", ColumnType::Float, false),
            column("hired", ColumnType::Timestamp, false),
        ]);
        let outcome = synchronize(&mut connection, &mut cache, &wider).unwrap();
        assert_eq!(outcome, SyncOutcome::Evolved { added: vec!["salary".into(), "hired".into()] });

        let (name, salary): (String, Option<f64>) = connection
            .query_row("SELECT name, salary FROM employees WHERE id = 1", [], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap();
        assert_eq!(name, "Alice");
        assert_eq!(salary, None);

        // The key chosen at creation stays even when the sheet's first column changes
        let reordered = employees(vec![column("name", ColumnType::Text, true), column("id", ColumnType::Integer, false)]);
        assert_eq!(synchronize(&mut connection, &mut cache, &reordered).unwrap(), SyncOutcome::Unchanged);
        assert_eq!(cache.get("employees").unwrap().key_column(), "id");
    }

    #[test]
    fn failed_column_rolls_back_the_whole_step() {
        let mut connection = Connection::open_in_memory().unwrap();
        let mut cache = SchemaCache::default();
        synchronize(&mut connection, &mut cache, &employees(vec![column("id", ColumnType::Integer, true)])).unwrap();

        let conflicting = employees(vec![
            column("id", ColumnType::Integer, true),
            column("bonus", ColumnType::Float, false),
            column("bonus", ColumnType::Text, false),
        ]);
        let error = synchronize(&mut connection, &mut cache, &conflicting).unwrap_err();
        assert!(matches!(error, SheetLoaderError::SchemaError(SchemaError::AddColumnError { .. })));

        let schema = reflect_table(&connection, "employees").unwrap().unwrap();
        assert_eq!(schema.column_names().collect::<Vec<_>>(), vec!["id"]);
    }

    #[test]
    fn table_without_primary_key_falls_back_to_id() {
        let connection = Connection::open_in_memory().unwrap();
        connection.execute_batch("CREATE TABLE notes (id BIGINT, body VARCHAR)").unwrap();
        let schema = reflect_table(&connection, "notes").unwrap().unwrap();
        assert_eq!(schema.primary_key, None);
        assert_eq!(schema.key_column(), "id");
    }
}
