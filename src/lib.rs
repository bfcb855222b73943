//! Batch ETL for one HTML table: extract, convert, load to CSV and SQLite, report.

pub mod config;
pub mod dataset;
pub mod db;
pub mod error;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod pipeline;
pub mod progress;
pub mod transform;

pub use error::{EtlError, Result};
