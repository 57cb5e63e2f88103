//! The `gradesync submit` command.

use std::path::PathBuf;

use anyhow::Result;

use gradesync_core::model::GradeSubmission;

use super::open_engine;

pub async fn execute(
    exam_id: String,
    question_index: u32,
    score: f64,
    max_score: f64,
    feedback: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let engine = open_engine(config_path)?;

    let submission = GradeSubmission {
        exam_id: exam_id.clone(),
        question_index,
        score,
        max_score,
        feedback,
    };

    let reconciled = match engine.submit_grade(submission).await {
        Ok(reconciled) => reconciled,
        // The stores disagree; the details are in the log, never on screen.
        Err(e) if e.is_sync_failure() => anyhow::bail!("save failed, please retry"),
        Err(e) => return Err(e.into()),
    };

    println!("Recorded grade for exam {exam_id} question {question_index}.");

    let plan = &reconciled.plan;
    if let Some(selection) = plan
        .selections
        .iter()
        .find(|s| s.superseded.contains(&question_index))
    {
        println!(
            "Note: question {question_index} duplicates question {}; the canonical grade is taken from question {}.",
            selection.question_index, selection.question_index
        );
    }
    if let Some(violation) = plan
        .violations
        .iter()
        .find(|v| v.question_index == question_index)
    {
        println!("Warning: grade excluded from results ({}).", violation.reason);
    }

    let totals = plan.totals();
    println!(
        "Exam total: {}/{} ({}%), {} sync write(s).",
        totals.total_score,
        totals.max_score,
        totals.percentage,
        reconciled.writes()
    );

    Ok(())
}
