//! Output module for product files and run reports
//!
//! This module handles:
//! - Writing scraped products as JSON and/or CSV
//! - Generating markdown reports of a finished scrape
//! - Printing a console summary

mod csv;
mod json;
mod markdown;
pub mod stats;
mod traits;

pub use self::csv::write_csv;
pub use json::write_json;
pub use markdown::{format_run_summary, write_run_summary};
pub use stats::print_summary;
pub use traits::{OutputError, OutputResult};

use crate::crawler::ProductRecord;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Product file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
    Both,
}

impl OutputFormat {
    pub fn writes_json(&self) -> bool {
        matches!(self, Self::Json | Self::Both)
    }

    pub fn writes_csv(&self) -> bool {
        matches!(self, Self::Csv | Self::Both)
    }
}

/// Writes the scraped products to `directory`
///
/// Files are named `products_<YYYYmmdd_HHMMSS>.<ext>` from the local time of
/// the call; the directory is created if missing.
///
/// # Arguments
///
/// * `items` - Products to write
/// * `format` - Which files to produce
/// * `directory` - Destination directory
///
/// # Returns
///
/// * `Ok(Vec<PathBuf>)` - Paths of the files written, JSON first
/// * `Err(OutputError)` - A file could not be created or serialized
pub fn write_output(
    items: &[ProductRecord],
    format: OutputFormat,
    directory: &Path,
) -> OutputResult<Vec<PathBuf>> {
    write_output_at(items, format, directory, Local::now())
}

fn write_output_at(
    items: &[ProductRecord],
    format: OutputFormat,
    directory: &Path,
    timestamp: DateTime<Local>,
) -> OutputResult<Vec<PathBuf>> {
    std::fs::create_dir_all(directory)?;

    let stem = format!("products_{}", timestamp.format("%Y%m%d_%H%M%S"));
    let mut written = Vec::new();

    if format.writes_json() {
        let path = directory.join(format!("{}.json", stem));
        write_json(items, &path)?;
        written.push(path);
    }

    if format.writes_csv() {
        let path = directory.join(format!("{}.csv", stem));
        write_csv(items, &path)?;
        written.push(path);
    }

    for path in &written {
        tracing::info!("Saved {} products to {}", items.len(), path.display());
    }

    Ok(written)
}
