use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use table_etl::config::{PipelineConfig, Preset};
use table_etl::progress::FileLog;
use table_etl::transform::ConversionTable;
use table_etl::{db, extract, fetch, pipeline};

#[derive(Parser)]
#[command(name = "table_etl", about = "Scrape a Wikipedia table, convert it, load it into SQLite")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, transform, load to CSV + SQLite, then run the reports
    Run {
        #[arg(value_enum)]
        preset: Preset,
        /// Read page HTML from a saved file instead of fetching the source URL
        #[arg(long)]
        html: Option<PathBuf>,
        /// TOML file overriding paths, URLs and table name
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Extract and clean only; print the dataset
    Extract {
        #[arg(value_enum)]
        preset: Preset,
        #[arg(long)]
        html: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Re-run the reports against the table from the last run
    Query {
        #[arg(value_enum)]
        preset: Preset,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { preset, html, config } => {
            let cfg = PipelineConfig::load(preset, config.as_deref())?;
            let page = load_html(&cfg, html.as_deref())?;
            let rates = match &cfg.rates_source {
                Some(source) if !cfg.derived.is_empty() => Some(
                    ConversionTable::load(source)
                        .with_context(|| format!("Failed to load exchange rates from {}", source))?,
                ),
                _ => None,
            };
            let log = FileLog::new(&cfg.log_path);

            let summary = pipeline::run(&cfg, &page, rates.as_ref(), &log)?;
            println!("{}", summary.dataset);
            for report in &summary.reports {
                println!("{}", report);
            }
            println!(
                "{} rows -> {:?} and {:?} (table {}) | log: {:?}",
                summary.dataset.len(),
                cfg.output_path,
                cfg.store_name,
                cfg.table_name,
                log.path()
            );
            Ok(())
        }
        Commands::Extract { preset, html, config, json } => {
            let cfg = PipelineConfig::load(preset, config.as_deref())?;
            let page = load_html(&cfg, html.as_deref())?;
            let dataset = extract::extract_dataset(&page, &cfg)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&dataset)?);
            } else {
                println!("{}", dataset);
                println!("{} rows", dataset.len());
            }
            Ok(())
        }
        Commands::Query { preset, config } => {
            let cfg = PipelineConfig::load(preset, config.as_deref())?;
            if !cfg.store_name.exists() {
                println!("No database at {:?}. Run the pipeline first.", cfg.store_name);
                return Ok(());
            }
            let conn = db::connect(&cfg.store_name)?;
            for report in &cfg.reports {
                println!("{}", db::run_report(&conn, &cfg.table_name, report)?);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn load_html(cfg: &PipelineConfig, file: Option<&Path>) -> anyhow::Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path)),
        None => fetch::fetch_text(&cfg.source_url)
            .with_context(|| format!("Failed to retrieve the page {}", cfg.source_url)),
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
