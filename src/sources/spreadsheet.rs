//! Spreadsheet rows → raw signals.
//!
//! Operations sheet columns: Task, Owner, Due Date, Status, Priority, Notes.
//! Tasks sheet columns: Task, Status, Priority, Assigned To, Notes.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::{Value, json};
use tracing::debug;

use crate::signal::model::{RawSignal, SignalSource};

/// Sender recorded on every spreadsheet signal.
pub const SPREADSHEET_SENDER: &str = "Spreadsheet Monitor";

/// Ranges read on each poll: operations sheet, then tasks sheet.
pub const WATCHED_RANGES: [&str; 2] = ["Operations!A1:F100", "Tasks!A1:E50"];

const MIN_CELLS: usize = 3;

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or_default()
}

/// Overdue, not-completed operations rows become `deadline` signals.
///
/// The header row is skipped, as are rows with fewer than three cells and
/// rows whose due date is empty or not `%Y-%m-%d`.
pub fn operations_rows_to_signals(rows: &[Vec<String>], now: DateTime<Utc>) -> Vec<RawSignal> {
    let now = now.naive_utc();
    let mut signals = Vec::new();

    for (idx, row) in rows.iter().enumerate().skip(1) {
        if row.len() < MIN_CELLS {
            continue;
        }
        let (task, owner, due_date, status) = (cell(row, 0), cell(row, 1), cell(row, 2), cell(row, 3));
        if due_date.is_empty() || status.eq_ignore_ascii_case("completed") {
            continue;
        }
        let due = match NaiveDate::parse_from_str(due_date, "%Y-%m-%d") {
            Ok(d) => d.and_time(NaiveTime::MIN),
            Err(e) => {
                debug!(row = idx + 1, due_date, error = %e, "Skipping row with unparseable due date");
                continue;
            }
        };
        if due >= now {
            continue;
        }

        signals.push(
            RawSignal::new(
                SignalSource::Spreadsheet.as_str(),
                "deadline",
                format!("Overdue Task: {task}"),
                format!("Task \"{task}\" assigned to {owner} was due on {due_date} and is still {status}"),
            )
            .with_sender(SPREADSHEET_SENDER)
            .with_metadata(json!({
                "sheet": "Operations",
                "row": idx + 1,
                "task": task,
                "owner": owner,
                "due_date": due_date,
                "status": status,
            })),
        );
    }
    signals
}

/// High or critical tasks that are not completed/done become
/// `high_priority_task` signals. Header row skipped.
pub fn task_rows_to_signals(rows: &[Vec<String>]) -> Vec<RawSignal> {
    rows.iter()
        .enumerate()
        .skip(1)
        .filter(|(_, row)| row.len() >= MIN_CELLS)
        .filter_map(|(idx, row)| {
            let (task, status, priority) = (cell(row, 0), cell(row, 1), cell(row, 2));
            let urgent = matches!(priority.to_lowercase().as_str(), "high" | "critical");
            let open = !matches!(status.to_lowercase().as_str(), "completed" | "done");
            (urgent && open).then(|| {
                RawSignal::new(
                    SignalSource::Spreadsheet.as_str(),
                    "high_priority_task",
                    format!("High Priority Task: {task}"),
                    format!("Task \"{task}\" has {priority} priority and status is {status}"),
                )
                .with_sender(SPREADSHEET_SENDER)
                .with_metadata(json!({
                    "sheet": "Tasks",
                    "row": idx + 1,
                    "task": task,
                    "status": status,
                    "priority": priority,
                }))
            })
        })
        .collect()
}

/// Cell grid of one entry of a read-range response (`valueRanges[i].values`).
/// Non-string cells are rendered as their JSON text.
pub fn value_range_rows(response: &Value, index: usize) -> Vec<Vec<String>> {
    response["valueRanges"][index]["values"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.as_array()
                        .map(|cells| {
                            cells
                                .iter()
                                .map(|c| match c {
                                    Value::String(s) => s.clone(),
                                    other => other.to_string(),
                                })
                                .collect()
                        })
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default()
}
