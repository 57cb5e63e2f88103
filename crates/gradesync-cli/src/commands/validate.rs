//! The `gradesync validate` command.

use std::path::PathBuf;

use anyhow::Result;

use gradesync_core::parser::{load_snapshots, validate_snapshot};

pub fn execute(snapshot_path: PathBuf, min_text_len: usize) -> Result<()> {
    let snapshots = load_snapshots(&snapshot_path)?;

    let mut total_warnings = 0;

    for snapshot in &snapshots {
        println!(
            "Exam: {} ({} answers, {} primary grades, {} secondary grades)",
            snapshot.exam_id,
            snapshot.answers.len(),
            snapshot.primary_grades.len(),
            snapshot.secondary_grades.len()
        );

        let warnings = validate_snapshot(snapshot, min_text_len);
        for w in &warnings {
            let prefix = w
                .question_index
                .map(|idx| format!("  [q{idx}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All snapshots valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
