use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use duckdb::Connection;
use sheet_loader::config::Config;
use sheet_loader::demo::run_demo;
use sheet_loader::importer::Importer;
use sheet_loader::logging;
use tracing::info;

fn main() -> Result<()> {
    let config = Config::parse();
    logging::init(config.verbose);

    let mut connection = if config.is_in_memory() {
        Connection::open_in_memory().context("Failed to open in-memory database")?
    } else {
        Connection::open(&config.database).with_context(|| format!("Failed to open database '{}'", config.database))?
    };
    info!("Connected to database '{}'", config.database);

    let criteria = config.criteria()?;
    let report = Importer::new(&mut connection, criteria)
        .import_file(&config.file)
        .context("Import failed")?;
    for sheet in &report.sheets {
        println!("{sheet}");
    }
    println!(
        "All sheets processed: {} row(s) loaded, {} failure(s).",
        report.rows_loaded(),
        report.failures().count()
    );

    if !config.skip_demo {
        run_demo(&mut connection, &config.demo_table, &mut std::io::stdout())?;
    }
    Ok(())
}
