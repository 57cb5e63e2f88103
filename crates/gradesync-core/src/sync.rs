//! Dual-store convergence for one canonical grade.
//!
//! The synchronizer reads both views, rewrites whichever is stale, then
//! re-reads both once. Anything short of both views holding the canonical
//! record is a `SyncFailure`; there is no retry loop here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, StoreError};
use crate::model::{GradeRecord, StoreDrift};
use crate::traits::GradeStore;

/// What a successful sync had to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub question_index: u32,
    pub primary_written: bool,
    pub secondary_written: bool,
}

impl SyncOutcome {
    /// True when both stores already held the canonical record.
    pub fn was_noop(&self) -> bool {
        !self.primary_written && !self.secondary_written
    }
}

pub struct DualStoreSynchronizer {
    primary: Arc<dyn GradeStore>,
    secondary: Arc<dyn GradeStore>,
}

impl DualStoreSynchronizer {
    pub fn new(primary: Arc<dyn GradeStore>, secondary: Arc<dyn GradeStore>) -> Self {
        Self { primary, secondary }
    }

    /// Make both stores hold `canonical` for its key.
    ///
    /// Calling this again with the same record performs no writes.
    pub async fn sync(&self, canonical: &GradeRecord) -> Result<SyncOutcome, ReconcileError> {
        let exam_id = canonical.exam_id.as_str();
        let question_index = canonical.question_index;

        let (primary, secondary) = self.read_both(exam_id, question_index).await?;
        let primary_written = primary.as_ref() != Some(canonical);
        let secondary_written = secondary.as_ref() != Some(canonical);

        if primary_written {
            self.primary.upsert_grade(canonical).await?;
        }
        if secondary_written {
            self.secondary.upsert_grade(canonical).await?;
        }

        if primary_written || secondary_written {
            let (primary, secondary) = self.read_both(exam_id, question_index).await?;
            let converged =
                primary.as_ref() == Some(canonical) && secondary.as_ref() == Some(canonical);
            if !converged {
                tracing::error!(
                    exam_id,
                    question_index,
                    primary_present = primary.is_some(),
                    secondary_present = secondary.is_some(),
                    "stores did not converge after write"
                );
                return Err(ReconcileError::SyncFailure {
                    exam_id: exam_id.to_string(),
                    question_index,
                    primary: primary.map(Box::new),
                    secondary: secondary.map(Box::new),
                });
            }
            tracing::info!(
                exam_id,
                question_index,
                score = canonical.score,
                primary_written,
                secondary_written,
                "canonical grade synchronized"
            );
        }

        Ok(SyncOutcome {
            question_index,
            primary_written,
            secondary_written,
        })
    }

    /// Compare both stores for one key without writing.
    pub async fn diff(
        &self,
        exam_id: &str,
        question_index: u32,
    ) -> Result<Option<StoreDrift>, StoreError> {
        let (primary, secondary) = self.read_both(exam_id, question_index).await?;
        if primary == secondary {
            return Ok(None);
        }
        Ok(Some(StoreDrift {
            exam_id: exam_id.to_string(),
            question_index,
            primary,
            secondary,
        }))
    }

    async fn read_both(
        &self,
        exam_id: &str,
        question_index: u32,
    ) -> Result<(Option<GradeRecord>, Option<GradeRecord>), StoreError> {
        tokio::try_join!(
            self.primary.get_grade(exam_id, question_index),
            self.secondary.get_grade(exam_id, question_index),
        )
    }
}
