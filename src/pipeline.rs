use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::dataset::Dataset;
use crate::db::{self, QueryResult};
use crate::error::{EtlError, Result};
use crate::export;
use crate::extract;
use crate::progress::ProgressLog;
use crate::transform::{self, ConversionTable};

#[derive(Debug)]
pub struct RunSummary {
    pub dataset: Dataset,
    pub reports: Vec<QueryResult>,
}

/// One synchronous run: extract → transform → csv → db → reports.
///
/// Nothing is written unless extraction and transform both succeed.
pub fn run(
    config: &PipelineConfig,
    html: &str,
    rates: Option<&ConversionTable>,
    log: &dyn ProgressLog,
) -> Result<RunSummary> {
    log.milestone("Preliminaries complete. Initiating ETL process");

    let mut dataset = extract::extract_dataset(html, config)?;
    debug!("Extracted dataset:\n{}", dataset);
    log.milestone("Data extraction complete. Initiating Transformation process");

    if !config.derived.is_empty() {
        let rates = rates.ok_or_else(|| {
            EtlError::Config("derived columns configured but no rate table given".into())
        })?;
        transform::transform(
            &mut dataset,
            rates,
            &config.base_column,
            &config.derived,
            config.clean.precision,
        )?;
        debug!("Transformed dataset:\n{}", dataset);
    }
    log.milestone("Data transformation complete. Initiating loading process");

    export::write_csv(&dataset, &config.output_path)?;
    log.milestone("Data saved to CSV file");

    let conn = db::connect(&config.store_name)?;
    log.milestone("SQL Connection initiated.");

    db::write_table(&conn, &config.table_name, &dataset)?;
    log.milestone("Data loaded to Database as table. Running the query");

    let mut reports = Vec::with_capacity(config.reports.len());
    for report in &config.reports {
        reports.push(db::run_report(&conn, &config.table_name, report)?);
    }
    log.milestone("Process Complete.");

    conn.close().map_err(|(_, e)| EtlError::Database(e))?;
    log.milestone("Server Connection closed");

    info!(
        "Run finished: {} rows, {} columns, {} reports",
        dataset.len(),
        dataset.columns().len(),
        reports.len()
    );
    Ok(RunSummary { dataset, reports })
}
