use crate::error::CliError;
use engine_processing::importer::ImportOutcome;
use engine_runtime::queue::QueueStatus;
use serde::Serialize;

#[derive(Serialize)]
struct StatusReport<'a> {
    #[serde(flatten)]
    status: &'a QueueStatus,
    report: &'a str,
}

pub fn print_status_json(status: &QueueStatus, report: &str) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(&StatusReport { status, report })
        .map_err(CliError::JsonSerialize)?;
    println!("{json}");
    Ok(())
}

pub fn print_status_table(status: &QueueStatus, report: &str) {
    let tally = &status.tally;
    let length = tally
        .length
        .map(|n| n.to_string())
        .unwrap_or_else(|| "n/a".to_string());
    let last = tally
        .last_status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "n/a".to_string());

    println!("Import queue:");
    println!("-----------------------------");
    println!("{:<16} {}", "Batches", status.batches);
    println!("{:<16} {}", "Queued rows", status.rows);
    println!("{:<16} {}", "Running", status.running);
    println!("{:<16} {}", "Scheduled", status.scheduled);
    println!("{:<16} {} of {}", "Progress", tally.progress, length);
    println!("{:<16} {}", "Inserted", tally.insert);
    println!("{:<16} {}", "Updated", tally.update);
    println!("{:<16} {}", "Skipped", tally.skip);
    println!("{:<16} {}", "Errors", tally.error);
    println!("{:<16} {}", "Last status", last);
    println!();
    println!("{report}");
}

/// Prints the field messages of an inline-imported row. `line` is 1-based
/// and counts data rows only.
pub fn print_row_feedback(line: u64, outcome: &ImportOutcome) {
    for entry in outcome.feedback.iter() {
        eprintln!("row {line} ({}): {entry}", outcome.action);
    }
}
