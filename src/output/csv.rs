//! CSV product files

use crate::crawler::ProductRecord;
use crate::output::traits::OutputResult;
use csv::Writer;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

const HEADER: [&str; 6] = ["name", "price", "availability", "image", "url", "rating"];

/// Writes the records as CSV with a header row
///
/// The header is written even when there are no records, so an empty scrape
/// still produces a file downstream tools can read.
pub fn write_csv(items: &[ProductRecord], path: &Path) -> OutputResult<()> {
    let file = File::create(path)?;
    let mut writer = Writer::from_writer(BufWriter::new(file));

    writer.write_record(HEADER)?;
    for item in items {
        let rating = item.rating.map(|r| r.to_string());
        writer.write_record([
            item.name.as_str(),
            item.price.as_str(),
            item.availability.as_deref().unwrap_or(""),
            item.image.as_deref().unwrap_or(""),
            item.url.as_deref().unwrap_or(""),
            rating.as_deref().unwrap_or(""),
        ])?;
    }
    writer.flush()?;

    tracing::debug!("Wrote {} rows to {}", items.len(), path.display());
    Ok(())
}
