use std::fs;
use std::path::Path;

use tracing::info;

use crate::dataset::Dataset;
use crate::error::Result;

/// Writes `dataset` to `path`, replacing any existing file.
///
/// The first column is an unnamed 0-based row index. Null numbers are empty
/// fields.
pub fn write_csv(dataset: &Dataset, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec![String::new()];
    header.extend(dataset.column_names().map(str::to_string));
    writer.write_record(&header)?;

    for (i, record) in dataset.records().iter().enumerate() {
        let mut row = Vec::with_capacity(record.cells().len() + 1);
        row.push(i.to_string());
        row.extend(record.cells().iter().map(|c| c.to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;

    info!("Wrote {} rows to {:?}", dataset.len(), path);
    Ok(())
}
