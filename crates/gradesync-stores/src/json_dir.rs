//! Directory of JSON exam documents, one `<exam_id>.json` per exam.
//!
//! Writes go through a temp file in the same directory followed by an atomic
//! rename, so readers see either the old document or the new one.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::instrument;

use gradesync_core::model::{GradeRecord, MergedAnswerEntry};
use gradesync_core::traits::{AnswerSource, GradeStore};
use gradesync_core::StoreError;

use crate::document::{validate_exam_id, AnswerSink, ExamDocument};

pub struct JsonDirStore {
    name: String,
    dir: PathBuf,
    /// Serializes read-modify-write cycles on this store's documents.
    write_lock: Mutex<()>,
}

impl JsonDirStore {
    /// The directory is created on first write.
    pub fn new(name: &str, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, exam_id: &str) -> Result<PathBuf, StoreError> {
        validate_exam_id(exam_id)?;
        Ok(self.dir.join(format!("{exam_id}.json")))
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            store: self.name.clone(),
            source,
        }
    }

    async fn read_document(&self, exam_id: &str) -> Result<Option<ExamDocument>, StoreError> {
        let path = self.document_path(exam_id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::Decode {
                store: self.name.clone(),
                message: format!("{}: {e}", path.display()),
            })
    }

    async fn write_document(&self, exam_id: &str, doc: &ExamDocument) -> Result<(), StoreError> {
        let path = self.document_path(exam_id)?;
        let json = serde_json::to_vec_pretty(doc).map_err(|e| StoreError::Decode {
            store: self.name.clone(),
            message: e.to_string(),
        })?;
        let dir = self.dir.clone();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&dir)?;
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&json)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Unavailable {
            store: self.name.clone(),
            message: format!("write task failed: {e}"),
        })?
        .map_err(|e| self.io_error(e))
    }

    async fn document_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| self.io_error(e))? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if validate_exam_id(stem).is_ok() {
                        ids.push(stem.to_string());
                    }
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl GradeStore for JsonDirStore {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(store = %self.name))]
    async fn get_grade(
        &self,
        exam_id: &str,
        question_index: u32,
    ) -> Result<Option<GradeRecord>, StoreError> {
        Ok(self
            .read_document(exam_id)
            .await?
            .and_then(|doc| doc.grade(question_index).cloned()))
    }

    #[instrument(skip(self), fields(store = %self.name))]
    async fn list_grades(&self, exam_id: &str) -> Result<Vec<GradeRecord>, StoreError> {
        Ok(self
            .read_document(exam_id)
            .await?
            .map(|doc| doc.grades)
            .unwrap_or_default())
    }

    #[instrument(
        skip(self, record),
        fields(store = %self.name, exam_id = %record.exam_id, question_index = record.question_index)
    )]
    async fn upsert_grade(&self, record: &GradeRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self
            .read_document(&record.exam_id)
            .await?
            .unwrap_or_default();
        doc.upsert(record);
        self.write_document(&record.exam_id, &doc).await?;
        tracing::debug!("grade upserted");
        Ok(())
    }

    async fn exam_ids(&self) -> Result<Vec<String>, StoreError> {
        self.document_ids().await
    }
}

#[async_trait]
impl AnswerSource for JsonDirStore {
    async fn merged_answers(
        &self,
        exam_id: &str,
    ) -> Result<Option<Vec<MergedAnswerEntry>>, StoreError> {
        Ok(self
            .read_document(exam_id)
            .await?
            .filter(|doc| !doc.answers.is_empty())
            .map(|doc| doc.answers))
    }

    async fn assembled_exam_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut assembled = Vec::new();
        for exam_id in self.document_ids().await? {
            if self
                .read_document(&exam_id)
                .await?
                .is_some_and(|doc| !doc.answers.is_empty())
            {
                assembled.push(exam_id);
            }
        }
        Ok(assembled)
    }
}

#[async_trait]
impl AnswerSink for JsonDirStore {
    async fn put_answers(
        &self,
        exam_id: &str,
        entries: Vec<MergedAnswerEntry>,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document(exam_id).await?.unwrap_or_default();
        doc.answers = entries;
        self.write_document(exam_id, &doc).await
    }
}
