//! Fault-injecting store for testing.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use gradesync_core::model::{GradeRecord, MergedAnswerEntry};
use gradesync_core::traits::{AnswerSource, GradeStore};
use gradesync_core::StoreError;

use crate::document::AnswerSink;
use crate::memory::MemoryStore;

/// A `MemoryStore` wrapper that can misbehave on demand.
///
/// Dropped writes are acknowledged but never applied, which is how a
/// diverging replica looks to the synchronizer.
pub struct MockGradeStore {
    inner: MemoryStore,
    drop_writes: AtomicBool,
    fail_reads: AtomicBool,
    /// Delay injected before every operation, in milliseconds.
    delay_ms: AtomicU64,
    read_calls: AtomicU32,
    write_calls: AtomicU32,
}

impl MockGradeStore {
    pub fn new(name: &str) -> Self {
        Self {
            inner: MemoryStore::new(name),
            drop_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            read_calls: AtomicU32::new(0),
            write_calls: AtomicU32::new(0),
        }
    }

    pub fn set_drop_writes(&self, drop: bool) {
        self.drop_writes.store(drop, Ordering::Relaxed);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    /// Get the number of read calls made to this store.
    pub fn read_calls(&self) -> u32 {
        self.read_calls.load(Ordering::Relaxed)
    }

    /// Get the number of upserts attempted, dropped ones included.
    pub fn write_calls(&self) -> u32 {
        self.write_calls.load(Ordering::Relaxed)
    }

    /// The wrapped store, for seeding and inspection.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    async fn before_read(&self) -> Result<(), StoreError> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);
        self.pause().await;
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable {
                store: self.inner.name().to_string(),
                message: "injected read failure".into(),
            });
        }
        Ok(())
    }

    async fn pause(&self) {
        let ms = self.delay_ms.load(Ordering::Relaxed);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl GradeStore for MockGradeStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get_grade(
        &self,
        exam_id: &str,
        question_index: u32,
    ) -> Result<Option<GradeRecord>, StoreError> {
        self.before_read().await?;
        self.inner.get_grade(exam_id, question_index).await
    }

    async fn list_grades(&self, exam_id: &str) -> Result<Vec<GradeRecord>, StoreError> {
        self.before_read().await?;
        self.inner.list_grades(exam_id).await
    }

    async fn upsert_grade(&self, record: &GradeRecord) -> Result<(), StoreError> {
        self.write_calls.fetch_add(1, Ordering::Relaxed);
        self.pause().await;
        if self.drop_writes.load(Ordering::Relaxed) {
            tracing::debug!(
                exam_id = %record.exam_id,
                question_index = record.question_index,
                "dropping write"
            );
            return Ok(());
        }
        self.inner.upsert_grade(record).await
    }

    async fn exam_ids(&self) -> Result<Vec<String>, StoreError> {
        self.before_read().await?;
        self.inner.exam_ids().await
    }
}

#[async_trait]
impl AnswerSource for MockGradeStore {
    async fn merged_answers(
        &self,
        exam_id: &str,
    ) -> Result<Option<Vec<MergedAnswerEntry>>, StoreError> {
        self.before_read().await?;
        self.inner.merged_answers(exam_id).await
    }

    async fn assembled_exam_ids(&self) -> Result<Vec<String>, StoreError> {
        self.before_read().await?;
        self.inner.assembled_exam_ids().await
    }
}

#[async_trait]
impl AnswerSink for MockGradeStore {
    async fn put_answers(
        &self,
        exam_id: &str,
        entries: Vec<MergedAnswerEntry>,
    ) -> Result<(), StoreError> {
        self.inner.put_answers(exam_id, entries).await
    }
}
