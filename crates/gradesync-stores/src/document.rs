//! The per-exam document shared by the local backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use gradesync_core::model::{GradeRecord, MergedAnswerEntry};
use gradesync_core::StoreError;

/// One exam's persisted state: merged answers and an ordered grade list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExamDocument {
    #[serde(default)]
    pub answers: Vec<MergedAnswerEntry>,
    #[serde(default)]
    pub grades: Vec<GradeRecord>,
}

impl ExamDocument {
    pub fn grade(&self, question_index: u32) -> Option<&GradeRecord> {
        self.grades
            .iter()
            .find(|g| g.question_index == question_index)
    }

    /// Replace the record with the same question index in place, or append.
    pub fn upsert(&mut self, record: &GradeRecord) {
        match self
            .grades
            .iter_mut()
            .find(|g| g.question_index == record.question_index)
        {
            Some(existing) => *existing = record.clone(),
            None => self.grades.push(record.clone()),
        }
    }
}

/// Write access to merged answers, used to seed local stores.
#[async_trait]
pub trait AnswerSink: Send + Sync {
    /// Replace the merged answers of an exam.
    async fn put_answers(
        &self,
        exam_id: &str,
        entries: Vec<MergedAnswerEntry>,
    ) -> Result<(), StoreError>;
}

/// Exam ids double as file names and URL path segments.
pub fn validate_exam_id(exam_id: &str) -> Result<(), StoreError> {
    let valid = !exam_id.is_empty()
        && exam_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidExamId(exam_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn grade(idx: u32, score: f64) -> GradeRecord {
        GradeRecord {
            exam_id: "e1".into(),
            question_index: idx,
            score,
            max_score: 8.0,
            feedback: String::new(),
            graded_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut doc = ExamDocument::default();
        doc.upsert(&grade(3, 1.0));
        doc.upsert(&grade(1, 2.0));
        doc.upsert(&grade(3, 5.0));
        assert_eq!(doc.grades.len(), 2);
        assert_eq!(doc.grades[0].question_index, 3);
        assert_eq!(doc.grade(3).map(|g| g.score), Some(5.0));
    }

    #[test]
    fn exam_id_charset() {
        assert!(validate_exam_id("exam-2025_07").is_ok());
        assert!(validate_exam_id("").is_err());
        assert!(validate_exam_id("../etc/passwd").is_err());
        assert!(validate_exam_id("a b").is_err());
    }
}
