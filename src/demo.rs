//! Record lifecycle walk-through on one imported table.
use crate::database::record::Mutation;
use crate::database::record::RecordService;
use crate::database::value::CellValue;
use crate::error::SheetLoaderError;
use duckdb::Connection;
use std::io::Write;
use tracing::info;

const DEMO_ID: i64 = 1001;

fn new_record() -> Vec<(&'static str, CellValue)> {
    vec![
        ("id", DEMO_ID.into()),
        ("name", "Alice Smith".into()),
        ("department", "HR".into()),
        ("salary", 60000.into()),
    ]
}

fn changes() -> Vec<(&'static str, CellValue)> {
    vec![("department", "Engineering".into()), ("salary", 75000.into())]
}

/// Creates, lists, reads, updates and deletes a sample record, writing each
/// result to `out`. Failed operations are reported in the output and the
/// walk-through continues. Returns `false` when the table does not exist.
pub fn run_demo<W: Write>(connection: &mut Connection, table: &str, out: &mut W) -> Result<bool, SheetLoaderError> {
    let Some(mut service) = RecordService::open(connection, table)? else {
        info!("'{table}' table not found. Skipping record operations");
        return Ok(false);
    };

    writeln!(out, "\n--- Record lifecycle on '{table}' ---")?;
    match service.create(new_record()) {
        Ok(record) => writeln!(out, "Record added: {record}")?,
        Err(e) => writeln!(out, "Error adding record: {e}")?,
    }

    writeln!(out, "\nAll records:")?;
    match service.read_all() {
        Ok(records) => {
            for record in records {
                writeln!(out, "{record}")?;
            }
        }
        Err(e) => writeln!(out, "Error reading: {e}")?,
    }

    writeln!(out, "\nRecord {DEMO_ID}:")?;
    match service.read(DEMO_ID) {
        Ok(Some(record)) => writeln!(out, "{record}")?,
        Ok(None) => writeln!(out, "Record {DEMO_ID} not found")?,
        Err(e) => writeln!(out, "Error reading: {e}")?,
    }

    writeln!(out, "\nUpdating record {DEMO_ID}:")?;
    match service.update(DEMO_ID, changes()) {
        Ok(Mutation::Applied) => writeln!(out, "Updated record {DEMO_ID}")?,
        Ok(Mutation::NotFound) => writeln!(out, "Record {DEMO_ID} not found")?,
        Err(e) => writeln!(out, "Error updating: {e}")?,
    }

    writeln!(out, "\nDeleting record {DEMO_ID}:")?;
    match service.delete(DEMO_ID) {
        Ok(Mutation::Applied) => writeln!(out, "Deleted record {DEMO_ID}")?,
        Ok(Mutation::NotFound) => writeln!(out, "Record {DEMO_ID} not found")?,
        Err(e) => writeln!(out, "Error deleting: {e}")?,
    }

    Ok(true)
}
