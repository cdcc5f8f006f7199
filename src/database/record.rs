use crate::database::quote_ident;
use crate::database::schema::reflect_table;
use crate::database::schema::TableSchema;
use crate::database::value::CellValue;
use crate::error::SheetLoaderError;
use duckdb::params;
use duckdb::types::ToSql;
use duckdb::types::Value;
use duckdb::Connection;
use duckdb::Transaction;
use std::fmt::Display;
use thiserror::Error;
use tracing::error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Table '{table}' has no column '{column}' to identify records")]
    MissingKeyError { table: String, column: String },

    #[error("No known field for table '{0}'")]
    EmptyRecordError(String),

    #[error("Failed to {operation} record in '{table}': {message}")]
    OperationError { operation: String, table: String, message: String },
}

/// Result of an update or delete.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    Applied,
    NotFound,
}

/// Field values of one row, restricted to the columns of its table.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    table: String,
    fields: Vec<(String, CellValue)>,
}

impl Record {
    /// Builds a record from arbitrary key/value pairs.
    ///
    /// Keys are matched case-insensitively against the table's columns and
    /// kept in table order. Unknown keys are dropped with a warning.
    pub fn from_fields<I, K, V>(schema: &TableSchema, fields: I) -> Record
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<CellValue>,
    {
        let mut known = Vec::<(usize, String, CellValue)>::new();
        for (key, value) in fields {
            let key = key.as_ref();
            match schema.columns.iter().position(|column| column.name.eq_ignore_ascii_case(key)) {
                Some(position) => {
                    known.retain(|(existing, _, _)| *existing != position);
                    known.push((position, schema.columns[position].name.to_owned(), value.into()));
                }
                None => warn!("Ignoring unknown field '{}' for table '{}'", key, schema.name),
            }
        }
        known.sort_by_key(|(position, _, _)| *position);
        Record {
            table: schema.name.to_owned(),
            fields: known.into_iter().map(|(_, name, value)| (name, value)).collect(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &[(String, CellValue)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&CellValue> {
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.table)?;
        for (index, (name, value)) in self.fields.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            match value {
                CellValue::Text(text) => write!(f, "{name}='{text}'")?,
                other => write!(f, "{name}={other}")?,
            }
        }
        write!(f, ")")
    }
}

/// Create, read, update and delete on one table, identified by its key column.
///
/// Every operation is its own unit of work: a transaction that is committed
/// when the operation succeeds and rolled back otherwise.
pub struct RecordService<'a> {
    connection: &'a mut Connection,
    schema: TableSchema,
}

impl<'a> RecordService<'a> {
    /// Binds the service to the current schema of `table`, or `None` when the
    /// table does not exist.
    pub fn open(connection: &'a mut Connection, table: &str) -> Result<Option<Self>, SheetLoaderError> {
        let Some(schema) = reflect_table(connection, table)? else {
            return Ok(None);
        };
        if !schema.contains(schema.key_column()) {
            Err(RecordError::MissingKeyError {
                table: schema.name.to_owned(),
                column: schema.key_column().to_owned(),
            })?
        }
        Ok(Some(RecordService { connection, schema }))
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Inserts a record built from the given fields and returns it.
    pub fn create<I, K, V>(&mut self, fields: I) -> Result<Record, SheetLoaderError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<CellValue>,
    {
        let record = Record::from_fields(&self.schema, fields);
        if record.is_empty() {
            Err(RecordError::EmptyRecordError(self.schema.name.to_owned()))?
        }
        let columns = record
            .fields()
            .iter()
            .map(|(name, _)| quote_ident(name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; record.fields().len()].join(", ");
        let sql = format!("INSERT INTO {} ({}) VALUES ({})", quote_ident(&self.schema.name), columns, placeholders);
        self.unit_of_work("create", |transaction, _| {
            let params: Vec<&dyn ToSql> = record.fields().iter().map(|(_, value)| value as &dyn ToSql).collect();
            transaction.execute(&sql, params.as_slice())?;
            Ok(())
        })?;
        Ok(record)
    }

    /// Every record of the table, ordered by key.
    pub fn read_all(&mut self) -> Result<Vec<Record>, SheetLoaderError> {
        let sql = format!("{} ORDER BY {}", self.select_sql(), quote_ident(self.schema.key_column()));
        self.unit_of_work("read", |transaction, schema| {
            let mut statement = transaction.prepare(&sql)?;
            let records = statement
                .query_map([], |row| to_record(schema, row))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
    }

    /// The record with the given key, if any.
    pub fn read(&mut self, id: impl Into<CellValue>) -> Result<Option<Record>, SheetLoaderError> {
        let id = id.into();
        let sql = format!("{} WHERE {} = ?", self.select_sql(), quote_ident(self.schema.key_column()));
        self.unit_of_work("read", |transaction, schema| {
            let mut statement = transaction.prepare(&sql)?;
            let mut records = statement
                .query_map(params![id], |row| to_record(schema, row))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records.pop())
        })
    }

    /// Sets the given fields on the record with the given key.
    /// Unknown fields are ignored; an update with no known field only checks
    /// that the record exists.
    pub fn update<I, K, V>(&mut self, id: impl Into<CellValue>, fields: I) -> Result<Mutation, SheetLoaderError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<CellValue>,
    {
        let id = id.into();
        let changes = Record::from_fields(&self.schema, fields);
        let table = quote_ident(&self.schema.name);
        let key = quote_ident(self.schema.key_column());
        let sql = if changes.is_empty() {
            format!("SELECT COUNT(*) FROM {table} WHERE {key} = ?")
        } else {
            let assignments = changes
                .fields()
                .iter()
                .map(|(name, _)| format!("{} = ?", quote_ident(name)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("UPDATE {table} SET {assignments} WHERE {key} = ?")
        };
        let affected = self.unit_of_work("update", |transaction, _| {
            let mut params: Vec<&dyn ToSql> = changes.fields().iter().map(|(_, value)| value as &dyn ToSql).collect();
            params.push(&id);
            if changes.is_empty() {
                transaction.query_row(&sql, params.as_slice(), |row| row.get::<_, i64>(0)).map(|count| count as usize)
            } else {
                transaction.execute(&sql, params.as_slice())
            }
        })?;
        Ok(if affected == 0 { Mutation::NotFound } else { Mutation::Applied })
    }

    pub fn delete(&mut self, id: impl Into<CellValue>) -> Result<Mutation, SheetLoaderError> {
        let id = id.into();
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote_ident(&self.schema.name),
            quote_ident(self.schema.key_column()),
        );
        let affected = self.unit_of_work("delete", |transaction, _| {
            transaction.execute(&sql, params![id])
        })?;
        Ok(if affected == 0 { Mutation::NotFound } else { Mutation::Applied })
    }

    fn select_sql(&self) -> String {
        let columns = self
            .schema
            .column_names()
            .map(quote_ident)
            .collect::<Vec<_>>()
            .join(", ");
        format!("SELECT {} FROM {}", columns, quote_ident(&self.schema.name))
    }

    /// Runs `work` inside a transaction. The transaction is committed when
    /// `work` succeeds and rolled back when it is dropped on failure.
    fn unit_of_work<T, F>(&mut self, operation: &str, work: F) -> Result<T, SheetLoaderError>
    where
        F: FnOnce(&Transaction<'_>, &TableSchema) -> duckdb::Result<T>,
    {
        let schema = &self.schema;
        let result = self.connection.transaction().and_then(|transaction| {
            let value = work(&transaction, schema)?;
            transaction.commit()?;
            Ok(value)
        });
        result.map_err(|e| {
            error!("Failed to {} record in '{}': {}", operation, schema.name, e);
            RecordError::OperationError {
                operation: operation.to_owned(),
                table: schema.name.to_owned(),
                message: e.to_string(),
            }
            .into()
        })
    }
}

fn to_record(schema: &TableSchema, row: &duckdb::Row<'_>) -> duckdb::Result<Record> {
    let mut fields = Vec::<(String, CellValue)>::with_capacity(schema.columns.len());
    for (index, column) in schema.columns.iter().enumerate() {
        let value: Value = row.get(index)?;
        fields.push((column.name.to_owned(), CellValue::from(value)));
    }
    Ok(Record {
        table: schema.name.to_owned(),
        fields,
    })
}
