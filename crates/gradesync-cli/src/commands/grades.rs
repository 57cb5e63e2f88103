//! The `gradesync grades` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};
use serde::Serialize;

use gradesync_core::model::CanonicalGrade;
use gradesync_core::statistics::{compute_exam_totals, ExamTotals};

use super::open_engine;

#[derive(Serialize)]
struct GradesView<'a> {
    exam_id: &'a str,
    grades: &'a [CanonicalGrade],
    totals: ExamTotals,
}

pub async fn execute(exam_id: String, format: String, config_path: Option<PathBuf>) -> Result<()> {
    let engine = open_engine(config_path)?;
    let grades = engine.canonical_grades(&exam_id).await?;
    let totals = compute_exam_totals(&grades);

    match format.as_str() {
        "json" => {
            let view = GradesView {
                exam_id: &exam_id,
                grades: &grades,
                totals,
            };
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        "text" => {
            let mut table = Table::new();
            table.set_header(vec!["Question", "Text", "Score", "Feedback"]);
            for grade in &grades {
                let score = match (grade.score, grade.max_score) {
                    (Some(score), Some(max)) => format!("{score}/{max}"),
                    _ => "ungraded".to_string(),
                };
                table.add_row(vec![
                    Cell::new(grade.question_index),
                    Cell::new(&grade.question_text),
                    Cell::new(score),
                    Cell::new(grade.feedback.as_deref().unwrap_or("")),
                ]);
            }
            println!("Exam: {exam_id}");
            println!("{table}");
            println!(
                "Total: {}/{} ({}%), {} graded, {} ungraded",
                totals.total_score,
                totals.max_score,
                totals.percentage,
                totals.graded,
                totals.ungraded
            );
        }
        other => anyhow::bail!("unknown format '{other}' (expected text or json)"),
    }

    Ok(())
}
