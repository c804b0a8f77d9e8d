//! Markdown run reports
//!
//! One report covers every scrape of a run (two in `both` mode), with the
//! stop reason of each so partial runs are easy to spot.

use crate::crawler::ScrapeOutcome;
use crate::output::traits::OutputResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a markdown report of the finished scrapes
///
/// # Arguments
///
/// * `outcomes` - Results of the scrapes, in the order they ran
/// * `config_hash` - Hash of the configuration file, if one was loaded
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(OutputError)` - Failed to write the report
pub fn write_run_summary(
    outcomes: &[ScrapeOutcome],
    config_hash: Option<&str>,
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_run_summary(outcomes, config_hash);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    tracing::info!("Run summary written to {}", output_path.display());
    Ok(())
}

/// Formats the scrapes of a run as markdown
pub fn format_run_summary(outcomes: &[ScrapeOutcome], config_hash: Option<&str>) -> String {
    let mut md = String::new();

    md.push_str("# Catalog-Ripple Run Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!(
        "- **Generated**: {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    if let Some(hash) = config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    let total_items: usize = outcomes.iter().map(|o| o.items.len()).sum();
    let total_pages: u32 = outcomes.iter().map(|o| o.pages_visited).sum();
    md.push_str(&format!("- **Scrapes**: {}\n", outcomes.len()));
    md.push_str(&format!("- **Total Products**: {}\n", total_items));
    md.push_str(&format!("- **Total Pages**: {}\n\n", total_pages));

    md.push_str("## Scrapes\n\n");
    md.push_str("| Mode | Start | Stop Reason | Pages | Products | Elapsed |\n");
    md.push_str("|------|-------|-------------|-------|----------|---------|\n");
    for outcome in outcomes {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {:.1}s |\n",
            outcome.mode,
            outcome.start,
            outcome.stop_reason,
            outcome.pages_visited,
            outcome.items.len(),
            outcome.elapsed.as_secs_f64()
        ));
    }
    md.push('\n');

    let incomplete: Vec<_> = outcomes.iter().filter(|o| !o.is_complete()).collect();
    if !incomplete.is_empty() {
        md.push_str("## Incomplete Scrapes\n\n");
        for outcome in incomplete {
            md.push_str(&format!("- **{}**: {}", outcome.mode, outcome.stop_reason));
            if let Some(location) = &outcome.last_location {
                md.push_str(&format!(" (last page: {})", location));
            }
            md.push('\n');
        }
        md.push('\n');
    }

    md
}
