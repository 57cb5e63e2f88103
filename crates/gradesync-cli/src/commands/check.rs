//! The `gradesync check` command.

use std::path::PathBuf;

use anyhow::Result;

use gradesync_core::model::GradeRecord;

use super::open_engine;

fn describe(record: Option<&GradeRecord>) -> String {
    match record {
        Some(r) => format!("{}/{}", r.score, r.max_score),
        None => "missing".to_string(),
    }
}

pub async fn execute(exam_id: String, config_path: Option<PathBuf>) -> Result<()> {
    let engine = open_engine(config_path)?;
    let drift = engine.check_exam(&exam_id).await?;

    if drift.is_empty() {
        println!("Exam {exam_id}: stores agree.");
        return Ok(());
    }

    println!("Exam {exam_id}: {} question(s) drifted", drift.len());
    for d in &drift {
        println!(
            "  [q{}] primary {}, secondary {}",
            d.question_index,
            describe(d.primary.as_ref()),
            describe(d.secondary.as_ref())
        );
    }
    println!("\nRun `gradesync reconcile --exam {exam_id}` to repair.");

    Ok(())
}
