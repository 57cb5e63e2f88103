//! Error taxonomy for reconciliation and store access.
//!
//! `StoreError` covers backend failures. `ReconcileError` is what engine
//! callers see; it classifies which failures are worth retrying so callers
//! never have to match on message strings.

use thiserror::Error;

use crate::model::GradeRecord;

/// Errors raised by a grade store or answer source backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("{store} store unavailable: {message}")]
    Unavailable { store: String, message: String },

    /// A remote store answered with an error status.
    #[error("{store} store returned HTTP {status}: {message}")]
    Http {
        store: String,
        status: u16,
        message: String,
    },

    /// Reading or writing a local document failed.
    #[error("{store} store I/O error: {source}")]
    Io {
        store: String,
        #[source]
        source: std::io::Error,
    },

    /// A persisted document could not be decoded.
    #[error("failed to decode {store} document: {message}")]
    Decode { store: String, message: String },

    /// The exam id cannot be used as a document address.
    #[error("invalid exam id '{0}'")]
    InvalidExamId(String),
}

/// Errors surfaced by the reconciliation engine.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A merged answer entry is malformed and was rejected before grouping.
    #[error("invalid answer entry in exam {exam_id} (question {question_index}): {reason}")]
    Validation {
        exam_id: String,
        question_index: u32,
        reason: String,
    },

    /// A submitted grade is malformed.
    #[error("invalid grade for exam {exam_id} question {question_index}: {reason}")]
    InvalidGrade {
        exam_id: String,
        question_index: u32,
        reason: String,
    },

    /// No merged answers exist for the exam.
    #[error("exam {0} not found")]
    ExamNotFound(String),

    /// The stores still disagree after the verification re-read.
    #[error("stores did not converge for exam {exam_id} question {question_index}")]
    SyncFailure {
        exam_id: String,
        question_index: u32,
        primary: Option<Box<GradeRecord>>,
        secondary: Option<Box<GradeRecord>>,
    },

    /// Exclusive access to a key was not granted in time.
    #[error("timed out after {waited_ms}ms waiting for exclusive access to '{key}'")]
    ConcurrencyTimeout { key: String, waited_ms: u64 },

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReconcileError {
    /// Returns `true` if the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReconcileError::SyncFailure { .. }
                | ReconcileError::ConcurrencyTimeout { .. }
                | ReconcileError::Store(StoreError::Unavailable { .. })
        )
    }

    /// Returns `true` for a failed convergence check.
    pub fn is_sync_failure(&self) -> bool {
        matches!(self, ReconcileError::SyncFailure { .. })
    }
}
