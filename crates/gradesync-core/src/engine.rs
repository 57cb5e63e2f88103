//! Reconciliation engine orchestrator.
//!
//! Every mutating path runs group, validate, select and synchronize for one
//! exam inside the coordinator's critical section for that exam. Read-only
//! paths build the same plan without taking the lock and may observe a
//! reconciliation in progress.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

use crate::consistency::{GradeConsistencyValidator, ValidatedGrades};
use crate::coordinator::ExclusiveWriteCoordinator;
use crate::error::ReconcileError;
use crate::grouping::{validate_entries, QuestionGroupResolver, DEFAULT_MIN_QUESTION_TEXT_LEN};
use crate::model::{
    CanonicalGrade, CanonicalSelection, ConsistencyViolation, DuplicateGroup, GradeRecord,
    GradeSubmission, MergedAnswerEntry, StoreDrift,
};
use crate::selection::CanonicalGradeSelector;
use crate::statistics::{compute_exam_totals, ExamTotals};
use crate::sync::{DualStoreSynchronizer, SyncOutcome};
use crate::traits::{AnswerSource, GradeStore};

/// Configuration for the reconciliation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Normalized question texts shorter than this are never merged.
    pub min_question_text_len: usize,
    /// Upper bound on waiting for an exam's lock. `None` waits indefinitely.
    pub lock_timeout: Option<Duration>,
    /// Maximum exams reconciled concurrently by `reconcile_all`.
    pub parallelism: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_question_text_len: DEFAULT_MIN_QUESTION_TEXT_LEN,
            lock_timeout: None,
            parallelism: 4,
        }
    }
}

/// Grouping, validation and selection results for one exam, before any write.
#[derive(Debug, Clone)]
pub struct ExamPlan {
    pub exam_id: String,
    pub groups: Vec<DuplicateGroup>,
    /// One selection per group, in group order.
    pub selections: Vec<CanonicalSelection>,
    pub violations: Vec<ConsistencyViolation>,
    pub grades: ValidatedGrades,
}

impl ExamPlan {
    pub fn entry_count(&self) -> usize {
        self.groups.iter().map(|g| g.entries.len()).sum()
    }

    pub fn duplicate_groups(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.groups.iter().filter(|g| g.is_duplicate())
    }

    pub fn superseded_count(&self) -> usize {
        self.selections.iter().map(|s| s.superseded.len()).sum()
    }

    /// Canonical grades to surface, one per logical question.
    pub fn canonical_grades(&self) -> Vec<CanonicalGrade> {
        self.groups
            .iter()
            .zip(&self.selections)
            .map(|(group, selection)| {
                let question_text = group
                    .entries
                    .iter()
                    .find(|e| e.question_index == selection.question_index)
                    .map(|e| e.question_text.clone())
                    .unwrap_or_else(|| group.normalized_text.clone());
                CanonicalGrade {
                    question_index: selection.question_index,
                    question_text,
                    score: selection.grade.as_ref().map(|g| g.score),
                    max_score: selection.grade.as_ref().map(|g| g.max_score),
                    feedback: selection.grade.as_ref().map(|g| g.feedback.clone()),
                }
            })
            .collect()
    }

    pub fn totals(&self) -> ExamTotals {
        compute_exam_totals(&self.canonical_grades())
    }

    /// Canonical records that need to be present in both stores.
    pub fn canonical_records(&self) -> impl Iterator<Item = &GradeRecord> {
        self.selections.iter().filter_map(|s| s.grade.as_ref())
    }
}

/// Result of one reconciliation pass over an exam.
#[derive(Debug, Clone)]
pub struct ExamReconciliation {
    pub plan: ExamPlan,
    pub synced: Vec<SyncOutcome>,
}

impl ExamReconciliation {
    pub fn exam_id(&self) -> &str {
        &self.plan.exam_id
    }

    /// Number of store writes the pass performed.
    pub fn writes(&self) -> usize {
        self.synced
            .iter()
            .map(|o| o.primary_written as usize + o.secondary_written as usize)
            .sum()
    }
}

/// An exam whose reconciliation failed inside a batch.
#[derive(Debug)]
pub struct ExamFailure {
    pub exam_id: String,
    pub error: ReconcileError,
}

/// Outcome of `reconcile_all`.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub reconciled: Vec<ExamReconciliation>,
    pub failures: Vec<ExamFailure>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Progress reporting for batch reconciliation.
pub trait ReconcileReporter: Send + Sync {
    fn on_exam_start(&self, exam_id: &str);
    fn on_exam_complete(&self, outcome: &ExamReconciliation);
    fn on_exam_error(&self, exam_id: &str, error: &ReconcileError);
    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ReconcileReporter for NoopReporter {
    fn on_exam_start(&self, _: &str) {}
    fn on_exam_complete(&self, _: &ExamReconciliation) {}
    fn on_exam_error(&self, _: &str, _: &ReconcileError) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// The reconciliation engine.
pub struct ReconciliationEngine {
    answers: Arc<dyn AnswerSource>,
    primary: Arc<dyn GradeStore>,
    secondary: Arc<dyn GradeStore>,
    coordinator: Arc<ExclusiveWriteCoordinator>,
    synchronizer: DualStoreSynchronizer,
    resolver: QuestionGroupResolver,
    config: EngineConfig,
}

impl ReconciliationEngine {
    pub fn new(
        answers: Arc<dyn AnswerSource>,
        primary: Arc<dyn GradeStore>,
        secondary: Arc<dyn GradeStore>,
        config: EngineConfig,
    ) -> Self {
        let coordinator = match config.lock_timeout {
            Some(timeout) => ExclusiveWriteCoordinator::new().with_wait_timeout(timeout),
            None => ExclusiveWriteCoordinator::new(),
        };
        Self {
            synchronizer: DualStoreSynchronizer::new(Arc::clone(&primary), Arc::clone(&secondary)),
            resolver: QuestionGroupResolver::new(config.min_question_text_len),
            answers,
            primary,
            secondary,
            coordinator: Arc::new(coordinator),
            config,
        }
    }

    /// Share a coordinator with other writers of per-exam state.
    pub fn with_coordinator(mut self, coordinator: Arc<ExclusiveWriteCoordinator>) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn coordinator(&self) -> &Arc<ExclusiveWriteCoordinator> {
        &self.coordinator
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Record a grade and reconcile its exam in the same critical section.
    ///
    /// The submitted record always lands in the primary store, even when its
    /// question is superseded or the value is corrupt; it is just not surfaced.
    pub async fn submit_grade(
        &self,
        submission: GradeSubmission,
    ) -> Result<ExamReconciliation, ReconcileError> {
        validate_submission(&submission)?;
        let record = submission.into_record(Utc::now());
        let exam_id = record.exam_id.clone();

        self.coordinator
            .run_exclusive(&exam_id, || async {
                let entries = self.load_entries(&exam_id).await?;
                if !entries
                    .iter()
                    .any(|e| e.question_index == record.question_index)
                {
                    return Err(ReconcileError::InvalidGrade {
                        exam_id: exam_id.clone(),
                        question_index: record.question_index,
                        reason: "question is not part of the exam".to_string(),
                    });
                }

                self.primary.upsert_grade(&record).await?;
                tracing::info!(
                    exam_id = %record.exam_id,
                    question_index = record.question_index,
                    score = record.score,
                    max_score = record.max_score,
                    "grade recorded"
                );

                self.reconcile_entries(&exam_id, entries).await
            })
            .await
    }

    /// Operator-triggered re-sync of one exam.
    pub async fn reconcile_exam(&self, exam_id: &str) -> Result<ExamReconciliation, ReconcileError> {
        self.coordinator
            .run_exclusive(exam_id, || async {
                let entries = self.load_entries(exam_id).await?;
                self.reconcile_entries(exam_id, entries).await
            })
            .await
    }

    /// Reconcile many exams with bounded parallelism. Failures are collected
    /// per exam and never abort the batch.
    pub async fn reconcile_all(
        &self,
        exam_ids: &[String],
        progress: &dyn ReconcileReporter,
    ) -> BatchOutcome {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));

        let mut futures = FuturesUnordered::new();
        for exam_id in exam_ids {
            let semaphore = Arc::clone(&semaphore);
            futures.push(async move {
                let _permit = semaphore.acquire_owned().await;
                progress.on_exam_start(exam_id);
                (exam_id.clone(), self.reconcile_exam(exam_id).await)
            });
        }

        let total = futures.len();
        let mut outcome = BatchOutcome::default();
        while let Some((exam_id, result)) = futures.next().await {
            match result {
                Ok(reconciled) => {
                    progress.on_exam_complete(&reconciled);
                    outcome.reconciled.push(reconciled);
                }
                Err(error) => {
                    tracing::error!(exam_id = %exam_id, "reconciliation failed: {error}");
                    progress.on_exam_error(&exam_id, &error);
                    outcome.failures.push(ExamFailure { exam_id, error });
                }
            }
        }

        progress.on_batch_complete(
            total,
            outcome.reconciled.len(),
            outcome.failures.len(),
            start.elapsed(),
        );
        outcome
    }

    /// Every assembled exam, sorted.
    pub async fn exam_ids(&self) -> Result<Vec<String>, ReconcileError> {
        let mut ids = self.answers.assembled_exam_ids().await?;
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// One entry per logical question. Never blocks on the coordinator.
    pub async fn canonical_grades(&self, exam_id: &str) -> Result<Vec<CanonicalGrade>, ReconcileError> {
        Ok(self.inspect_exam(exam_id).await?.canonical_grades())
    }

    /// Build the plan for an exam without writing anything.
    pub async fn inspect_exam(&self, exam_id: &str) -> Result<ExamPlan, ReconcileError> {
        let entries = self.load_entries(exam_id).await?;
        self.plan(exam_id, entries).await
    }

    /// Canonical keys on which the two stores currently disagree.
    pub async fn check_exam(&self, exam_id: &str) -> Result<Vec<StoreDrift>, ReconcileError> {
        let plan = self.inspect_exam(exam_id).await?;
        self.drift_for(&plan).await
    }

    pub(crate) async fn drift_for(&self, plan: &ExamPlan) -> Result<Vec<StoreDrift>, ReconcileError> {
        let mut drift = Vec::new();
        for record in plan.canonical_records() {
            if let Some(found) = self
                .synchronizer
                .diff(&plan.exam_id, record.question_index)
                .await?
            {
                tracing::warn!(
                    exam_id = %plan.exam_id,
                    question_index = record.question_index,
                    "stores disagree on canonical grade"
                );
                drift.push(found);
            }
        }
        Ok(drift)
    }

    async fn reconcile_entries(
        &self,
        exam_id: &str,
        entries: Vec<MergedAnswerEntry>,
    ) -> Result<ExamReconciliation, ReconcileError> {
        let plan = self.plan(exam_id, entries).await?;

        let mut synced = Vec::new();
        for record in plan.canonical_records() {
            synced.push(self.synchronizer.sync(record).await?);
        }

        let reconciled = ExamReconciliation { plan, synced };
        tracing::info!(
            exam_id,
            questions = reconciled.plan.selections.len(),
            duplicate_groups = reconciled.plan.duplicate_groups().count(),
            violations = reconciled.plan.violations.len(),
            writes = reconciled.writes(),
            "exam reconciled"
        );
        Ok(reconciled)
    }

    async fn load_entries(&self, exam_id: &str) -> Result<Vec<MergedAnswerEntry>, ReconcileError> {
        let entries = self
            .answers
            .merged_answers(exam_id)
            .await?
            .ok_or_else(|| ReconcileError::ExamNotFound(exam_id.to_string()))?;
        validate_entries(exam_id, &entries)?;
        Ok(entries)
    }

    async fn plan(
        &self,
        exam_id: &str,
        entries: Vec<MergedAnswerEntry>,
    ) -> Result<ExamPlan, ReconcileError> {
        let known: HashSet<u32> = entries.iter().map(|e| e.question_index).collect();
        let current = self.current_grades(exam_id, &known).await?;

        let grades = GradeConsistencyValidator.partition(current);
        for violation in &grades.violations {
            tracing::warn!(
                exam_id,
                question_index = violation.question_index,
                score = violation.score,
                max_score = violation.max_score,
                "excluding corrupt grade: {}",
                violation.reason
            );
        }

        let groups = self.resolver.resolve(&entries);
        let selections = CanonicalGradeSelector.select_all(&groups, &grades);

        Ok(ExamPlan {
            exam_id: exam_id.to_string(),
            groups,
            selections,
            violations: grades.violations.clone(),
            grades,
        })
    }

    /// Primary records first; secondary fills keys the primary lacks.
    async fn current_grades(
        &self,
        exam_id: &str,
        known: &HashSet<u32>,
    ) -> Result<Vec<GradeRecord>, ReconcileError> {
        let (primary, secondary) = tokio::try_join!(
            self.primary.list_grades(exam_id),
            self.secondary.list_grades(exam_id),
        )?;

        let mut merged: Vec<GradeRecord> = Vec::new();
        let mut positions: HashMap<u32, usize> = HashMap::new();
        for record in primary {
            if !known.contains(&record.question_index) {
                continue;
            }
            match positions.get(&record.question_index) {
                Some(&pos) => merged[pos] = record,
                None => {
                    positions.insert(record.question_index, merged.len());
                    merged.push(record);
                }
            }
        }
        for record in secondary {
            if known.contains(&record.question_index)
                && !positions.contains_key(&record.question_index)
            {
                positions.insert(record.question_index, merged.len());
                merged.push(record);
            }
        }
        Ok(merged)
    }
}

fn validate_submission(submission: &GradeSubmission) -> Result<(), ReconcileError> {
    let reason = if !submission.score.is_finite() || !submission.max_score.is_finite() {
        Some("score and max score must be finite")
    } else if submission.score < 0.0 {
        Some("score must not be negative")
    } else if submission.max_score <= 0.0 {
        Some("max score must be positive")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ReconcileError::InvalidGrade {
            exam_id: submission.exam_id.clone(),
            question_index: submission.question_index,
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}
