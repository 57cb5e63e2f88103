//! Core trait definitions for the persisted views.
//!
//! These async traits are implemented by the backends in `gradesync-stores`.
//! Both stores are addressed first by exam id, then by question index.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{GradeRecord, MergedAnswerEntry};

// ---------------------------------------------------------------------------
// Grade store trait
// ---------------------------------------------------------------------------

/// One independently-addressable list of grade records per exam.
///
/// Implementations must make each `upsert_grade` atomic for the exam's
/// document: concurrent callers may interleave whole upserts, never parts
/// of one.
#[async_trait]
pub trait GradeStore: Send + Sync {
    /// Human-readable store name used in logs and errors (e.g. "primary").
    fn name(&self) -> &str;

    /// Read the record for one question, if any.
    async fn get_grade(
        &self,
        exam_id: &str,
        question_index: u32,
    ) -> Result<Option<GradeRecord>, StoreError>;

    /// All records of an exam in stored order. Unknown exams yield an empty list.
    async fn list_grades(&self, exam_id: &str) -> Result<Vec<GradeRecord>, StoreError>;

    /// Insert or replace the record keyed by `(exam_id, question_index)`.
    ///
    /// Replacing keeps the record's position; a new key is appended.
    async fn upsert_grade(&self, record: &GradeRecord) -> Result<(), StoreError>;

    /// Exams that hold at least one document in this store.
    async fn exam_ids(&self) -> Result<Vec<String>, StoreError>;
}

// ---------------------------------------------------------------------------
// Answer source trait
// ---------------------------------------------------------------------------

/// Read access to the merged answers produced by exam assembly.
#[async_trait]
pub trait AnswerSource: Send + Sync {
    /// Merged answers in assembly order, or `None` for an unknown exam.
    async fn merged_answers(
        &self,
        exam_id: &str,
    ) -> Result<Option<Vec<MergedAnswerEntry>>, StoreError>;

    /// Exams that have been assembled.
    async fn assembled_exam_ids(&self) -> Result<Vec<String>, StoreError>;
}
