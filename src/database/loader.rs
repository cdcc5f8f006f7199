use crate::database::quote_ident;
use crate::database::table::Table;
use crate::database::value::CellValue;
use crate::error::SheetLoaderError;
use duckdb::types::ToSql;
use duckdb::Connection;
use tracing::debug;

/// Appends every row of the table in one transaction and returns the row count.
///
/// Columns are bound by name, so a wider existing table just gets nulls in
/// the columns the sheet does not carry. Rows are never updated or
/// deduplicated; a key violation fails the whole load.
pub fn load(connection: &mut Connection, table: &Table) -> Result<usize, SheetLoaderError> {
    if table.rows.is_empty() {
        return Ok(0);
    }
    let columns = table
        .column_names()
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; table.columns.len()].join(", ");
    let sql = format!("INSERT INTO {} ({}) VALUES ({})", quote_ident(&table.name), columns, placeholders);
    debug!("Insert: {sql}");

    let transaction = connection.transaction()?;
    {
        let mut statement = transaction.prepare(&sql)?;
        for row in &table.rows {
            let values: Vec<CellValue> = row
                .iter()
                .zip(&table.columns)
                .map(|(value, column)| value.clone().coerce(column.kind))
                .collect();
            let params: Vec<&dyn ToSql> = values.iter().map(|value| value as &dyn ToSql).collect();
            statement.execute(params.as_slice())?;
        }
    }
    transaction.commit()?;
    debug!("Inserted {} row(s) into '{}'", table.rows.len(), table.name);
    Ok(table.rows.len())
}
