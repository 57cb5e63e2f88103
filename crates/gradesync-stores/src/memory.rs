//! In-process store backed by a map of exam documents.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use gradesync_core::model::{GradeRecord, MergedAnswerEntry};
use gradesync_core::traits::{AnswerSource, GradeStore};
use gradesync_core::StoreError;

use crate::document::{AnswerSink, ExamDocument};

/// A store that lives for the life of the process.
///
/// Each upsert takes the write lock for the whole map, so single-document
/// updates are atomic.
pub struct MemoryStore {
    name: String,
    docs: RwLock<HashMap<String, ExamDocument>>,
    writes: AtomicU32,
}

impl MemoryStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            docs: RwLock::new(HashMap::new()),
            writes: AtomicU32::new(0),
        }
    }

    /// Number of grade upserts applied so far.
    pub fn write_count(&self) -> u32 {
        self.writes.load(Ordering::Relaxed)
    }

    /// A copy of one exam's document, if present.
    pub async fn document(&self, exam_id: &str) -> Option<ExamDocument> {
        self.docs.read().await.get(exam_id).cloned()
    }
}

#[async_trait]
impl GradeStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_grade(
        &self,
        exam_id: &str,
        question_index: u32,
    ) -> Result<Option<GradeRecord>, StoreError> {
        Ok(self
            .docs
            .read()
            .await
            .get(exam_id)
            .and_then(|doc| doc.grade(question_index).cloned()))
    }

    async fn list_grades(&self, exam_id: &str) -> Result<Vec<GradeRecord>, StoreError> {
        Ok(self
            .docs
            .read()
            .await
            .get(exam_id)
            .map(|doc| doc.grades.clone())
            .unwrap_or_default())
    }

    async fn upsert_grade(&self, record: &GradeRecord) -> Result<(), StoreError> {
        let mut docs = self.docs.write().await;
        docs.entry(record.exam_id.clone()).or_default().upsert(record);
        self.writes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            store = %self.name,
            exam_id = %record.exam_id,
            question_index = record.question_index,
            "grade upserted"
        );
        Ok(())
    }

    async fn exam_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.docs.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl AnswerSource for MemoryStore {
    async fn merged_answers(
        &self,
        exam_id: &str,
    ) -> Result<Option<Vec<MergedAnswerEntry>>, StoreError> {
        Ok(self
            .docs
            .read()
            .await
            .get(exam_id)
            .filter(|doc| !doc.answers.is_empty())
            .map(|doc| doc.answers.clone()))
    }

    async fn assembled_exam_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self
            .docs
            .read()
            .await
            .iter()
            .filter(|(_, doc)| !doc.answers.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl AnswerSink for MemoryStore {
    async fn put_answers(
        &self,
        exam_id: &str,
        entries: Vec<MergedAnswerEntry>,
    ) -> Result<(), StoreError> {
        let mut docs = self.docs.write().await;
        docs.entry(exam_id.to_string()).or_default().answers = entries;
        Ok(())
    }
}
