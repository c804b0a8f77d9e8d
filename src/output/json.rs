//! JSON product files

use crate::crawler::ProductRecord;
use crate::output::traits::OutputResult;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes the records as a pretty-printed JSON array
///
/// # Arguments
///
/// * `items` - Records to write, in scrape order
/// * `path` - Destination file; replaced if it exists
pub fn write_json(items: &[ProductRecord], path: &Path) -> OutputResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, items)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    tracing::debug!("Wrote {} records to {}", items.len(), path.display());
    Ok(())
}
