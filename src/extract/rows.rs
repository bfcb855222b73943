use scraper::{ElementRef, Selector};
use serde::Deserialize;
use tracing::{debug, info};

use super::clean::RecordCleaner;
use super::locate::{parse_selector, TableHandle};
use crate::dataset::{Cell, Column, ColumnKind, Dataset, Record};
use crate::error::{EtlError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    /// Whole cell text.
    #[default]
    Cell,
    /// Text of the first link inside the cell.
    Link,
}

/// Which rows count as data, and where the key and value live.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RowRules {
    pub header_rows: usize,
    pub min_cells: usize,
    pub key_column: String,
    pub key_cell: usize,
    #[serde(default)]
    pub key_source: KeySource,
    #[serde(default)]
    pub require_link: bool,
    pub value_column: String,
    pub value_cell: usize,
    /// Rows whose value cell contains one of these are dropped entirely.
    #[serde(default)]
    pub skip_sentinels: Vec<String>,
}

enum Skip {
    TooFewCells(usize),
    NoLink,
    Sentinel,
}

pub fn extract(
    table: TableHandle,
    schema: &[Column],
    rules: &RowRules,
    cleaner: &RecordCleaner,
) -> Result<Dataset> {
    let mut dataset = Dataset::new(schema.to_vec());
    let key_id = dataset.column_id(&rules.key_column)?;
    let value_id = dataset.column_id(&rules.value_column)?;
    if dataset.column(key_id).kind != ColumnKind::Text
        || dataset.column(value_id).kind != ColumnKind::Numeric
    {
        return Err(EtlError::SchemaMismatch(format!(
            "{} must be text and {} numeric",
            rules.key_column, rules.value_column
        )));
    }
    if schema.len() != 2 || key_id == value_id {
        return Err(EtlError::SchemaMismatch(format!(
            "extraction fills exactly {} and {}",
            rules.key_column, rules.value_column
        )));
    }

    let tr = parse_selector("tr")?;
    let td = parse_selector("td")?;
    let link = parse_selector("a")?;

    let mut seen = 0usize;
    let mut skipped = 0usize;
    for (i, row) in table.select(&tr).enumerate().skip(rules.header_rows) {
        seen += 1;
        let cells: Vec<ElementRef> = row.select(&td).collect();

        let outcome = check_row(&cells, rules, &link);
        if let Err(reason) = outcome {
            skipped += 1;
            match reason {
                Skip::TooFewCells(n) => debug!("row {}: {} cells, skipping", i, n),
                Skip::NoLink => debug!("row {}: key cell has no link, skipping", i),
                Skip::Sentinel => debug!("row {}: no-data sentinel, skipping", i),
            }
            continue;
        }

        let key_cell = cells[rules.key_cell];
        let key = match rules.key_source {
            KeySource::Cell => cell_text(key_cell),
            KeySource::Link => key_cell
                .select(&link)
                .next()
                .map(cell_text)
                .unwrap_or_else(|| cell_text(key_cell)),
        };
        let value = cleaner.clean(&cell_text(cells[rules.value_cell]));

        let mut record = vec![Cell::Text(String::new()); 2];
        record[key_id.0] = Cell::Text(key);
        record[value_id.0] = Cell::Number(value);
        dataset.push(Record::new(record))?;
    }

    info!(
        "Extracted {} rows ({} of {} source rows skipped)",
        dataset.len(),
        skipped,
        seen
    );
    Ok(dataset)
}

fn check_row(
    cells: &[ElementRef],
    rules: &RowRules,
    link: &Selector,
) -> std::result::Result<(), Skip> {
    let needed = rules.min_cells.max(rules.key_cell + 1).max(rules.value_cell + 1);
    if cells.len() < needed {
        return Err(Skip::TooFewCells(cells.len()));
    }
    if rules.require_link && cells[rules.key_cell].select(link).next().is_none() {
        return Err(Skip::NoLink);
    }
    let value_text = cell_text(cells[rules.value_cell]);
    if rules.skip_sentinels.iter().any(|s| value_text.contains(s.as_str())) {
        return Err(Skip::Sentinel);
    }
    Ok(())
}

fn cell_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}
