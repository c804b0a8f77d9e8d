//! Console summary of a finished run

use crate::crawler::ScrapeOutcome;
use std::path::PathBuf;

/// Prints the scrape results to stdout
///
/// # Arguments
///
/// * `outcomes` - Results of the scrapes, in the order they ran
/// * `written` - Product files written for the run
pub fn print_summary(outcomes: &[ScrapeOutcome], written: &[PathBuf]) {
    println!("=== Scrape Summary ===\n");

    for outcome in outcomes {
        println!("{} scrape of {}:", outcome.mode, outcome.start);
        println!("  Stop reason: {}", outcome.stop_reason);
        println!("  Pages visited: {}", outcome.pages_visited);
        println!("  Products: {}", outcome.items.len());
        println!("  Elapsed: {:.1}s", outcome.elapsed.as_secs_f64());
        if !outcome.is_complete() {
            if let Some(location) = &outcome.last_location {
                println!("  Last page: {}", location);
            }
        }
        println!();
    }

    let total: usize = outcomes.iter().map(|o| o.items.len()).sum();
    println!("Total products: {}", total);

    if !written.is_empty() {
        println!("Files:");
        for path in written {
            println!("  - {}", path.display());
        }
    }
}
