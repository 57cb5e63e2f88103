//! In-process store used by this crate's unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::error::StoreError;
use crate::model::{GradeRecord, MergedAnswerEntry};
use crate::traits::{AnswerSource, GradeStore};

#[derive(Default)]
pub(crate) struct TestStore {
    name: String,
    answers: Mutex<HashMap<String, Vec<MergedAnswerEntry>>>,
    grades: Mutex<HashMap<String, Vec<GradeRecord>>>,
    pub drop_writes: AtomicBool,
    pub writes: AtomicU32,
}

impl TestStore {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_answers(self, exam_id: &str, entries: Vec<MergedAnswerEntry>) -> Self {
        self.answers
            .lock()
            .unwrap()
            .insert(exam_id.to_string(), entries);
        self
    }

    pub fn seed(&self, record: GradeRecord) {
        let mut grades = self.grades.lock().unwrap();
        let list = grades.entry(record.exam_id.clone()).or_default();
        match list
            .iter_mut()
            .find(|g| g.question_index == record.question_index)
        {
            Some(existing) => *existing = record,
            None => list.push(record),
        }
    }

    pub fn write_count(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self, exam_id: &str) -> Vec<GradeRecord> {
        self.grades
            .lock()
            .unwrap()
            .get(exam_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl GradeStore for TestStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_grade(
        &self,
        exam_id: &str,
        question_index: u32,
    ) -> Result<Option<GradeRecord>, StoreError> {
        Ok(self
            .snapshot(exam_id)
            .into_iter()
            .find(|g| g.question_index == question_index))
    }

    async fn list_grades(&self, exam_id: &str) -> Result<Vec<GradeRecord>, StoreError> {
        Ok(self.snapshot(exam_id))
    }

    async fn upsert_grade(&self, record: &GradeRecord) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if !self.drop_writes.load(Ordering::SeqCst) {
            self.seed(record.clone());
        }
        Ok(())
    }

    async fn exam_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.grades.lock().unwrap().keys().cloned().collect())
    }
}

#[async_trait]
impl AnswerSource for TestStore {
    async fn merged_answers(
        &self,
        exam_id: &str,
    ) -> Result<Option<Vec<MergedAnswerEntry>>, StoreError> {
        Ok(self.answers.lock().unwrap().get(exam_id).cloned())
    }

    async fn assembled_exam_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.answers.lock().unwrap().keys().cloned().collect())
    }
}

pub(crate) fn grade(exam_id: &str, idx: u32, score: f64, max_score: f64) -> GradeRecord {
    GradeRecord {
        exam_id: exam_id.into(),
        question_index: idx,
        score,
        max_score,
        feedback: format!("feedback for {idx}"),
        graded_at: Utc.with_ymd_and_hms(2025, 7, 17, 10, 0, 0).unwrap(),
    }
}
