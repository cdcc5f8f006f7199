//! DuckDB side of the import: typed values, column inference, schema
//! synchronization, row loading and the record service.
pub mod column;
pub mod loader;
pub mod record;
pub mod schema;
pub mod table;
pub mod value;

/// Double-quotes an identifier, doubling any embedded quote.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
