//! The `gradesync reconcile` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use comfy_table::{Cell, Table};

use gradesync_core::engine::{BatchOutcome, ExamReconciliation, ReconcileReporter};
use gradesync_core::ReconcileError;

use super::{open_engine, resolve_exam_ids};

/// Console progress reporter.
struct ConsoleReporter;

impl ReconcileReporter for ConsoleReporter {
    fn on_exam_start(&self, exam_id: &str) {
        eprintln!("  Starting: {exam_id}");
    }

    fn on_exam_complete(&self, outcome: &ExamReconciliation) {
        eprintln!(
            "  Done: {} ({} questions, {} writes)",
            outcome.exam_id(),
            outcome.plan.selections.len(),
            outcome.writes()
        );
    }

    fn on_exam_error(&self, exam_id: &str, error: &ReconcileError) {
        if error.is_sync_failure() {
            eprintln!("  ERROR: {exam_id}: stores did not converge");
        } else {
            eprintln!("  ERROR: {exam_id}: {error}");
        }
    }

    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {completed}/{total} reconciled, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(exams: Vec<String>, config_path: Option<PathBuf>) -> Result<()> {
    let engine = open_engine(config_path)?;
    let exam_ids = resolve_exam_ids(&engine, exams).await?;

    if exam_ids.is_empty() {
        println!("No exams to reconcile.");
        return Ok(());
    }

    eprintln!("gradesync: reconciling {} exam(s)", exam_ids.len());
    eprintln!();

    let outcome = engine.reconcile_all(&exam_ids, &ConsoleReporter).await;
    print_summary(&outcome);

    anyhow::ensure!(
        outcome.is_success(),
        "{} of {} exam(s) failed to reconcile",
        outcome.failures.len(),
        exam_ids.len()
    );
    Ok(())
}

fn print_summary(outcome: &BatchOutcome) {
    let mut table = Table::new();
    table.set_header(vec![
        "Exam",
        "Questions",
        "Duplicate groups",
        "Superseded",
        "Violations",
        "Writes",
        "Score",
    ]);

    let mut reconciled: Vec<&ExamReconciliation> = outcome.reconciled.iter().collect();
    reconciled.sort_by(|a, b| a.exam_id().cmp(b.exam_id()));
    for exam in reconciled {
        let plan = &exam.plan;
        let totals = plan.totals();
        table.add_row(vec![
            Cell::new(exam.exam_id()),
            Cell::new(plan.selections.len()),
            Cell::new(plan.duplicate_groups().count()),
            Cell::new(plan.superseded_count()),
            Cell::new(plan.violations.len()),
            Cell::new(exam.writes()),
            Cell::new(format!(
                "{}/{} ({}%)",
                totals.total_score, totals.max_score, totals.percentage
            )),
        ]);
    }

    let mut failures: Vec<_> = outcome.failures.iter().collect();
    failures.sort_by(|a, b| a.exam_id.cmp(&b.exam_id));
    for failure in failures {
        table.add_row(vec![
            Cell::new(&failure.exam_id),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new("FAILED"),
        ]);
    }

    println!("{table}");
}
