use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::Deserialize;
use tracing::info;

use crate::dataset::{Column, ColumnKind};
use crate::db::{validate_ident, Report};
use crate::error::{EtlError, Result};
use crate::extract::clean::CleanRules;
use crate::extract::locate::TableSelector;
use crate::extract::rows::{KeySource, RowRules};
use crate::transform::DerivedColumn;

const BANKS_URL: &str =
    "https://web.archive.org/web/20230908091635/https://en.wikipedia.org/wiki/List_of_largest_banks";
const EXCHANGE_RATES_URL: &str = "https://cf-courses-data.s3.us.cloud-object-storage.appdomain.cloud/IBMSkillsNetwork-PY0221EN-Coursera/labs/v2/exchange_rate.csv";
const GDP_URL: &str = "https://web.archive.org/web/20230902185326/https://en.wikipedia.org/wiki/List_of_countries_by_GDP_%28nominal%29";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// Largest banks by market capitalization, converted to GBP/EUR/INR
    Banks,
    /// Countries by nominal GDP, in billions of USD
    Gdp,
}

/// Everything one pipeline run needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source_url: String,
    pub output_path: PathBuf,
    pub store_name: PathBuf,
    pub table_name: String,
    pub column_schema: Vec<Column>,
    pub log_path: PathBuf,
    /// Local path or http(s) URL of the rate file. `None` when nothing is derived.
    pub rates_source: Option<String>,
    pub table: TableSelector,
    pub rows: RowRules,
    pub clean: CleanRules,
    pub base_column: String,
    pub derived: Vec<DerivedColumn>,
    pub reports: Vec<Report>,
}

/// Settings that may be overridden from a file or `ETL_*` variables.
///
/// Scalars replace the preset value. Sections (`table`, `rows`, `clean`,
/// `derived`, `reports`, `column_schema`) replace the whole preset section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Overrides {
    source_url: Option<String>,
    output_path: Option<PathBuf>,
    store_name: Option<PathBuf>,
    table_name: Option<String>,
    log_path: Option<PathBuf>,
    rates_source: Option<String>,
    base_column: Option<String>,
    column_schema: Option<Vec<Column>>,
    table: Option<TableSelector>,
    rows: Option<RowRules>,
    clean: Option<CleanRules>,
    derived: Option<Vec<DerivedColumn>>,
    reports: Option<Vec<Report>>,
}

impl Preset {
    pub fn config(self) -> PipelineConfig {
        match self {
            Preset::Banks => banks(),
            Preset::Gdp => gdp(),
        }
    }
}

fn banks() -> PipelineConfig {
    PipelineConfig {
        source_url: BANKS_URL.to_string(),
        output_path: PathBuf::from("./Largest_banks_data.csv"),
        store_name: PathBuf::from("Banks.db"),
        table_name: "Largest_banks".to_string(),
        column_schema: vec![Column::text("Name"), Column::numeric("MC_USD_Billion")],
        log_path: PathBuf::from("./code_log.txt"),
        rates_source: Some(EXCHANGE_RATES_URL.to_string()),
        table: TableSelector { css: "table.wikitable".into(), index: 1 },
        rows: RowRules {
            header_rows: 1,
            min_cells: 3,
            key_column: "Name".into(),
            key_cell: 1,
            key_source: KeySource::Cell,
            require_link: false,
            value_column: "MC_USD_Billion".into(),
            value_cell: 2,
            skip_sentinels: Vec::new(),
        },
        clean: CleanRules {
            zero_tokens: vec!["-".into()],
            divisor: Some(1000.0),
            ..CleanRules::default()
        },
        base_column: "MC_USD_Billion".into(),
        derived: vec![
            DerivedColumn::new("MC_GBP_Billion", "GBP"),
            DerivedColumn::new("MC_EUR_Billion", "EUR"),
            DerivedColumn::new("MC_INR_Billion", "INR"),
        ],
        reports: vec![
            Report::SelectAll,
            Report::Average { column: "MC_GBP_Billion".into() },
            Report::TopN {
                columns: vec!["Name".into(), "MC_USD_Billion".into()],
                order_by: "MC_USD_Billion".into(),
                n: 10,
            },
        ],
    }
}

fn gdp() -> PipelineConfig {
    PipelineConfig {
        source_url: GDP_URL.to_string(),
        output_path: PathBuf::from("./Countries_by_GDP.csv"),
        store_name: PathBuf::from("World_Economies.db"),
        table_name: "Countries_by_GDP".to_string(),
        column_schema: vec![Column::text("Country"), Column::numeric("GDP_USD_billions")],
        log_path: PathBuf::from("./etl_project_log.txt"),
        rates_source: None,
        table: TableSelector { css: "tbody".into(), index: 2 },
        rows: RowRules {
            header_rows: 1,
            min_cells: 3,
            key_column: "Country".into(),
            key_cell: 0,
            key_source: KeySource::Link,
            require_link: true,
            value_column: "GDP_USD_billions".into(),
            value_cell: 2,
            skip_sentinels: vec!["—".into()],
        },
        clean: CleanRules {
            divisor: Some(1000.0),
            ..CleanRules::default()
        },
        base_column: "GDP_USD_billions".into(),
        derived: Vec::new(),
        reports: vec![Report::AtLeast {
            column: "GDP_USD_billions".into(),
            min: 100.0,
        }],
    }
}

impl PipelineConfig {
    /// Preset, then an optional config file, then `ETL_*` environment variables.
    pub fn load(preset: Preset, file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("ETL"))
            .build()?;
        let overrides: Overrides = settings.try_deserialize()?;

        let mut cfg = preset.config();
        cfg.apply(overrides);
        cfg.validate()?;
        info!(preset = ?preset, table = %cfg.table_name, "Configuration loaded");
        Ok(cfg)
    }

    fn apply(&mut self, o: Overrides) {
        if let Some(v) = o.source_url {
            self.source_url = v;
        }
        if let Some(v) = o.output_path {
            self.output_path = v;
        }
        if let Some(v) = o.store_name {
            self.store_name = v;
        }
        if let Some(v) = o.table_name {
            self.table_name = v;
        }
        if let Some(v) = o.log_path {
            self.log_path = v;
        }
        if let Some(v) = o.rates_source {
            self.rates_source = Some(v);
        }
        if let Some(v) = o.base_column {
            self.base_column = v;
        }
        if let Some(v) = o.column_schema {
            self.column_schema = v;
        }
        if let Some(v) = o.table {
            self.table = v;
        }
        if let Some(v) = o.rows {
            self.rows = v;
        }
        if let Some(v) = o.clean {
            self.clean = v;
        }
        if let Some(v) = o.derived {
            self.derived = v;
        }
        if let Some(v) = o.reports {
            self.reports = v;
        }
    }

    /// Every name that ends up inside SQL text must be a plain identifier.
    pub fn validate(&self) -> Result<()> {
        validate_ident(&self.table_name)?;
        for col in &self.column_schema {
            validate_ident(&col.name)?;
        }
        for d in &self.derived {
            validate_ident(&d.column)?;
        }
        let base = self
            .column_schema
            .iter()
            .find(|c| c.name == self.base_column)
            .ok_or_else(|| EtlError::UnknownColumn(self.base_column.clone()))?;
        if base.kind != ColumnKind::Numeric {
            return Err(EtlError::Config(format!(
                "base column {} is not numeric",
                self.base_column
            )));
        }
        if !self.derived.is_empty() && self.rates_source.is_none() {
            return Err(EtlError::Config(
                "derived columns configured without a rate source".into(),
            ));
        }
        Ok(())
    }
}
