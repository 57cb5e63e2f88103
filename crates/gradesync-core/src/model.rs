//! Core data model types for gradesync.
//!
//! Merged answers come from exam assembly and are never modified here.
//! Grade records are persisted twice (primary assessment and secondary
//! grade index); everything else in this module is ephemeral output of a
//! reconciliation pass.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One question-and-answer record inside a student's assembled exam.
///
/// `question_index` is unique within an exam, but several entries may carry
/// the same question text when assembly injected a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedAnswerEntry {
    pub exam_id: String,
    pub question_index: u32,
    #[serde(default)]
    pub question_text: String,
    #[serde(default)]
    pub student_answer: String,
}

impl MergedAnswerEntry {
    pub fn new(
        exam_id: impl Into<String>,
        question_index: u32,
        question_text: impl Into<String>,
        student_answer: impl Into<String>,
    ) -> Self {
        Self {
            exam_id: exam_id.into(),
            question_index,
            question_text: question_text.into(),
            student_answer: student_answer.into(),
        }
    }
}

/// The persisted score and feedback for one question of one exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRecord {
    pub exam_id: String,
    pub question_index: u32,
    pub score: f64,
    pub max_score: f64,
    #[serde(default)]
    pub feedback: String,
    pub graded_at: DateTime<Utc>,
}

impl GradeRecord {
    /// True when the score is zero and no feedback explains it.
    pub fn is_zero_without_feedback(&self) -> bool {
        self.score == 0.0 && self.feedback.trim().is_empty()
    }
}

/// A grading action as received from the grading surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeSubmission {
    pub exam_id: String,
    pub question_index: u32,
    pub score: f64,
    pub max_score: f64,
    #[serde(default)]
    pub feedback: String,
}

impl GradeSubmission {
    /// Stamp the submission into a persistable record.
    pub fn into_record(self, graded_at: DateTime<Utc>) -> GradeRecord {
        GradeRecord {
            exam_id: self.exam_id,
            question_index: self.question_index,
            score: self.score,
            max_score: self.max_score,
            feedback: self.feedback,
            graded_at,
        }
    }
}

/// Entries of one exam that share a normalized question text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// The normalized question text the members share.
    pub normalized_text: String,
    /// Members in original encounter order.
    pub entries: Vec<MergedAnswerEntry>,
}

impl DuplicateGroup {
    /// True when the group holds more than one entry.
    pub fn is_duplicate(&self) -> bool {
        self.entries.len() > 1
    }

    pub fn question_indexes(&self) -> Vec<u32> {
        self.entries.iter().map(|e| e.question_index).collect()
    }
}

/// Why a group's representative was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionReason {
    /// The only member carrying a valid grade.
    HasGrade,
    /// The highest-scoring of several valid grades.
    HighestScore,
    /// No member had a valid grade; the first member stands in, ungraded.
    FirstOccurrenceFallback,
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionReason::HasGrade => write!(f, "has-grade"),
            SelectionReason::HighestScore => write!(f, "highest-score"),
            SelectionReason::FirstOccurrenceFallback => write!(f, "first-occurrence-fallback"),
        }
    }
}

/// The representative entry chosen for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSelection {
    pub exam_id: String,
    pub normalized_text: String,
    /// Question index of the chosen member.
    pub question_index: u32,
    pub reason: SelectionReason,
    /// The canonical grade, absent when no member has a valid one.
    pub grade: Option<GradeRecord>,
    /// Other members of the group, hidden from downstream consumers.
    #[serde(default)]
    pub superseded: Vec<u32>,
}

/// Why a grade was judged corrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationReason {
    /// Score above a max score of exactly 1 (legacy unit weight defect).
    ScoreExceedsUnitWeight,
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationReason::ScoreExceedsUnitWeight => {
                write!(f, "score exceeds a max score of 1")
            }
        }
    }
}

/// A provably invalid grade, excluded from canonical candidacy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyViolation {
    pub exam_id: String,
    pub question_index: u32,
    pub score: f64,
    pub max_score: f64,
    pub reason: ViolationReason,
}

/// One logical question as shown to the grading and review UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalGrade {
    pub question_index: u32,
    pub question_text: String,
    pub score: Option<f64>,
    pub max_score: Option<f64>,
    pub feedback: Option<String>,
}

impl CanonicalGrade {
    pub fn is_graded(&self) -> bool {
        self.score.is_some()
    }
}

/// One canonical key on which the two stores disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDrift {
    pub exam_id: String,
    pub question_index: u32,
    pub primary: Option<GradeRecord>,
    pub secondary: Option<GradeRecord>,
}

/// A self-contained copy of one exam's persisted state.
///
/// Snapshots seed stores for offline runs and carry both grade views so a
/// drifted exam can be reproduced exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSnapshot {
    pub exam_id: String,
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    pub answers: Vec<MergedAnswerEntry>,
    pub primary_grades: Vec<GradeRecord>,
    pub secondary_grades: Vec<GradeRecord>,
}
