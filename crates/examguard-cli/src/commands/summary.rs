//! The `examguard summary` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use examguard_core::model::ExamAttempt;
use examguard_store::JsonFileStore;

pub fn execute(store_dir: PathBuf) -> Result<()> {
    let store = JsonFileStore::new(&store_dir);
    let attempts = store
        .load_all()
        .with_context(|| format!("failed to load attempts from {}", store_dir.display()))?;

    if attempts.is_empty() {
        println!("No attempts found in {}.", store_dir.display());
        return Ok(());
    }

    print_table(&attempts);

    let completed: Vec<_> = attempts.iter().filter_map(|a| a.outcome.as_ref()).collect();
    let auto = completed.iter().filter(|o| o.auto_submitted).count();
    let avg = if completed.is_empty() {
        0.0
    } else {
        completed.iter().map(|o| o.percentage).sum::<f64>() / completed.len() as f64
    };
    println!(
        "{} attempt(s), average {avg:.2}%, {auto} submitted automatically",
        attempts.len()
    );

    Ok(())
}

fn print_table(attempts: &[ExamAttempt]) {
    let mut table = Table::new();
    table.set_header(vec![
        "User",
        "Course",
        "Started",
        "Score",
        "Percentage",
        "Violations",
        "Reason",
    ]);

    for attempt in attempts {
        let started = attempt.started_at.format("%Y-%m-%d %H:%M:%S").to_string();
        match &attempt.outcome {
            Some(o) => table.add_row(vec![
                Cell::new(&attempt.user_id),
                Cell::new(&attempt.course_id),
                Cell::new(started),
                Cell::new(format!("{}/{}", o.score, o.total_marks)),
                Cell::new(format!("{:.2}%", o.percentage)),
                Cell::new(o.violation_count),
                Cell::new(o.submission_reason),
            ]),
            None => table.add_row(vec![
                Cell::new(&attempt.user_id),
                Cell::new(&attempt.course_id),
                Cell::new(started),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("in progress"),
            ]),
        };
    }

    println!("{table}");
}
