//! Read-only reconciliation audit with JSON persistence and markdown output.
//!
//! The generator only consumes plans, drift observations and batch failures
//! that were produced elsewhere. It never writes to a store.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{ExamFailure, ExamPlan, ReconciliationEngine};
use crate::error::ReconcileError;
use crate::model::{ConsistencyViolation, StoreDrift};
use crate::statistics::ExamTotals;

/// A complete audit report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// Per-exam findings in audit order.
    pub exams: Vec<ExamAudit>,
    /// Cross-exam totals.
    pub summary: AuditSummary,
}

/// Findings for one exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamAudit {
    pub exam_id: String,
    /// Merged answer entries, duplicates included.
    pub entries: usize,
    /// Distinct logical questions after grouping.
    pub logical_questions: usize,
    pub duplicate_groups: usize,
    pub superseded_entries: usize,
    pub violations: Vec<ConsistencyViolation>,
    /// Duplicate groups holding both graded and ungraded members.
    pub mixed_groups: Vec<MixedGroup>,
    /// Canonical questions scored 0 with no feedback.
    pub zero_without_feedback: Vec<u32>,
    pub store_drift: Vec<StoreDrift>,
    pub sync_failures: Vec<SyncFailureFinding>,
    pub totals: ExamTotals,
}

impl ExamAudit {
    pub fn has_findings(&self) -> bool {
        self.duplicate_groups > 0
            || !self.violations.is_empty()
            || !self.zero_without_feedback.is_empty()
            || !self.store_drift.is_empty()
            || !self.sync_failures.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixedGroup {
    pub question_text: String,
    pub graded: Vec<u32>,
    pub ungraded: Vec<u32>,
}

/// A SyncFailure observed while reconciling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncFailureFinding {
    pub question_index: u32,
    pub primary_score: Option<f64>,
    pub secondary_score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditSummary {
    pub exams_audited: usize,
    pub exams_with_duplicates: usize,
    pub duplicate_groups: usize,
    pub superseded_entries: usize,
    pub violations: usize,
    pub mixed_groups: usize,
    pub zero_without_feedback: usize,
    pub drifted_keys: usize,
    pub sync_failures: usize,
}

/// Builds audit reports from already-computed reconciliation state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationReportGenerator;

impl ReconciliationReportGenerator {
    /// Summarize one exam.
    pub fn audit_exam(
        &self,
        plan: &ExamPlan,
        store_drift: Vec<StoreDrift>,
        sync_failures: Vec<SyncFailureFinding>,
    ) -> ExamAudit {
        let mixed_groups = plan
            .duplicate_groups()
            .filter_map(|group| {
                let (graded, ungraded): (Vec<u32>, Vec<u32>) = group
                    .question_indexes()
                    .into_iter()
                    .partition(|&idx| plan.grades.get(idx).is_some());
                (!graded.is_empty() && !ungraded.is_empty()).then(|| MixedGroup {
                    question_text: group.normalized_text.clone(),
                    graded,
                    ungraded,
                })
            })
            .collect();

        let zero_without_feedback = plan
            .canonical_records()
            .filter(|r| r.is_zero_without_feedback())
            .map(|r| r.question_index)
            .collect();

        ExamAudit {
            exam_id: plan.exam_id.clone(),
            entries: plan.entry_count(),
            logical_questions: plan.selections.len(),
            duplicate_groups: plan.duplicate_groups().count(),
            superseded_entries: plan.superseded_count(),
            violations: plan.violations.clone(),
            mixed_groups,
            zero_without_feedback,
            store_drift,
            sync_failures,
            totals: plan.totals(),
        }
    }

    /// Assemble a report from per-exam audits.
    pub fn generate(&self, exams: Vec<ExamAudit>) -> ReconciliationReport {
        let mut summary = AuditSummary {
            exams_audited: exams.len(),
            ..AuditSummary::default()
        };
        for exam in &exams {
            if exam.duplicate_groups > 0 {
                summary.exams_with_duplicates += 1;
            }
            summary.duplicate_groups += exam.duplicate_groups;
            summary.superseded_entries += exam.superseded_entries;
            summary.violations += exam.violations.len();
            summary.mixed_groups += exam.mixed_groups.len();
            summary.zero_without_feedback += exam.zero_without_feedback.len();
            summary.drifted_keys += exam.store_drift.len();
            summary.sync_failures += exam.sync_failures.len();
        }

        ReconciliationReport {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            exams,
            summary,
        }
    }

    /// Audit `exam_ids` against the engine's current state.
    ///
    /// `failures` carries errors from an earlier batch; SyncFailures among
    /// them are attributed to their exams.
    pub async fn collect(
        &self,
        engine: &ReconciliationEngine,
        exam_ids: &[String],
        failures: &[ExamFailure],
    ) -> Result<ReconciliationReport, ReconcileError> {
        let mut exams = Vec::with_capacity(exam_ids.len());
        for exam_id in exam_ids {
            let plan = engine.inspect_exam(exam_id).await?;
            let drift = engine.drift_for(&plan).await?;
            let sync_failures = failures
                .iter()
                .filter(|f| &f.exam_id == exam_id)
                .filter_map(|f| sync_failure_finding(&f.error))
                .collect();
            exams.push(self.audit_exam(&plan, drift, sync_failures));
        }
        Ok(self.generate(exams))
    }
}

/// Extract the finding from a `SyncFailure`; other errors yield `None`.
pub fn sync_failure_finding(error: &ReconcileError) -> Option<SyncFailureFinding> {
    match error {
        ReconcileError::SyncFailure {
            question_index,
            primary,
            secondary,
            ..
        } => Some(SyncFailureFinding {
            question_index: *question_index,
            primary_score: primary.as_ref().map(|r| r.score),
            secondary_score: secondary.as_ref().map(|r| r.score),
        }),
        _ => None,
    }
}

impl ReconciliationReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: ReconciliationReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let s = &self.summary;
        let mut md = String::new();

        md.push_str("# Grade Reconciliation Audit\n\n");
        md.push_str(&format!(
            "Generated {} (report `{}`)\n\n",
            self.created_at.format("%Y-%m-%d %H:%M UTC"),
            self.id
        ));
        md.push_str(&format!(
            "**Summary:** {} exams audited, {} with duplicates, {} duplicate groups, \
             {} superseded entries, {} violations, {} drifted keys, {} sync failures\n\n",
            s.exams_audited,
            s.exams_with_duplicates,
            s.duplicate_groups,
            s.superseded_entries,
            s.violations,
            s.drifted_keys,
            s.sync_failures
        ));

        md.push_str("| Exam | Questions | Duplicate groups | Superseded | Violations | Drift | Score |\n");
        md.push_str("|------|-----------|------------------|------------|------------|-------|-------|\n");
        for exam in &self.exams {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {}/{} ({}%) |\n",
                exam.exam_id,
                exam.logical_questions,
                exam.duplicate_groups,
                exam.superseded_entries,
                exam.violations.len(),
                exam.store_drift.len(),
                exam.totals.total_score,
                exam.totals.max_score,
                exam.totals.percentage
            ));
        }
        md.push('\n');

        for exam in self.exams.iter().filter(|e| e.has_findings()) {
            md.push_str(&format!("## {}\n\n", exam.exam_id));
            for v in &exam.violations {
                md.push_str(&format!(
                    "- question {}: {} ({}/{}), excluded\n",
                    v.question_index, v.reason, v.score, v.max_score
                ));
            }
            for g in &exam.mixed_groups {
                md.push_str(&format!(
                    "- mixed group \"{}\": graded {:?}, ungraded {:?}\n",
                    g.question_text, g.graded, g.ungraded
                ));
            }
            for idx in &exam.zero_without_feedback {
                md.push_str(&format!("- question {idx}: score 0 without feedback\n"));
            }
            for d in &exam.store_drift {
                md.push_str(&format!(
                    "- question {}: stores disagree (primary {}, secondary {})\n",
                    d.question_index,
                    describe_score(d.primary.as_ref().map(|r| r.score)),
                    describe_score(d.secondary.as_ref().map(|r| r.score))
                ));
            }
            for f in &exam.sync_failures {
                md.push_str(&format!(
                    "- question {}: sync failed (primary {}, secondary {})\n",
                    f.question_index,
                    describe_score(f.primary_score),
                    describe_score(f.secondary_score)
                ));
            }
            md.push('\n');
        }

        md
    }
}

fn describe_score(score: Option<f64>) -> String {
    score.map_or_else(|| "missing".to_string(), |s| s.to_string())
}
