//! The `gradesync report` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use gradesync_core::report::{ReconciliationReport, ReconciliationReportGenerator};

use super::{open_engine, resolve_exam_ids};

pub async fn execute(
    exams: Vec<String>,
    format: String,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let engine = open_engine(config_path)?;
    let exam_ids = resolve_exam_ids(&engine, exams).await?;

    let report = ReconciliationReportGenerator
        .collect(&engine, &exam_ids, &[])
        .await?;

    let rendered = match format.as_str() {
        "markdown" | "md" => report.to_markdown(),
        "json" => serde_json::to_string_pretty(&report)?,
        "text" => render_text(&report),
        other => anyhow::bail!("unknown format '{other}' (expected text, json or markdown)"),
    };

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, rendered)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            eprintln!("Report saved to: {}", path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

fn render_text(report: &ReconciliationReport) -> String {
    let s = &report.summary;
    let mut out = format!(
        "Audit: {} exams, {} with duplicates, {} duplicate groups, {} superseded entries\n\
         Findings: {} violations, {} mixed groups, {} zero-without-feedback, {} drifted keys\n",
        s.exams_audited,
        s.exams_with_duplicates,
        s.duplicate_groups,
        s.superseded_entries,
        s.violations,
        s.mixed_groups,
        s.zero_without_feedback,
        s.drifted_keys
    );

    for exam in report.exams.iter().filter(|e| e.has_findings()) {
        out.push_str(&format!("\n{}:\n", exam.exam_id));
        for v in &exam.violations {
            out.push_str(&format!(
                "  [q{}] {} ({}/{})\n",
                v.question_index, v.reason, v.score, v.max_score
            ));
        }
        for g in &exam.mixed_groups {
            out.push_str(&format!(
                "  mixed group \"{}\": graded {:?}, ungraded {:?}\n",
                g.question_text, g.graded, g.ungraded
            ));
        }
        for idx in &exam.zero_without_feedback {
            out.push_str(&format!("  [q{idx}] score 0 without feedback\n"));
        }
        for d in &exam.store_drift {
            out.push_str(&format!("  [q{}] stores disagree\n", d.question_index));
        }
    }

    out
}
