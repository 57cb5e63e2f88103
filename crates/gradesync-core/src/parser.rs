//! TOML exam snapshot parser.
//!
//! Loads exam snapshots from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::consistency::GradeConsistencyValidator;
use crate::grouping::QuestionGroupResolver;
use crate::model::{ExamSnapshot, GradeRecord, MergedAnswerEntry};

/// Intermediate TOML structure for parsing snapshot files.
#[derive(Debug, Deserialize)]
struct TomlSnapshotFile {
    exam: TomlExamHeader,
    #[serde(default)]
    answers: Vec<TomlAnswer>,
    #[serde(default)]
    primary_grades: Vec<TomlGrade>,
    #[serde(default)]
    secondary_grades: Vec<TomlGrade>,
}

#[derive(Debug, Deserialize)]
struct TomlExamHeader {
    id: String,
    #[serde(default)]
    student_id: Option<String>,
    #[serde(default)]
    student_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlAnswer {
    index: u32,
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
}

#[derive(Debug, Deserialize)]
struct TomlGrade {
    index: u32,
    score: f64,
    max_score: f64,
    #[serde(default)]
    feedback: String,
    /// RFC 3339 timestamp; the Unix epoch when omitted.
    #[serde(default)]
    graded_at: Option<String>,
}

impl TomlGrade {
    fn into_record(self, exam_id: &str) -> Result<GradeRecord> {
        let graded_at = match self.graded_at {
            Some(raw) => DateTime::parse_from_rfc3339(&raw)
                .with_context(|| format!("invalid graded_at '{raw}' for question {}", self.index))?
                .with_timezone(&Utc),
            None => DateTime::<Utc>::default(),
        };
        Ok(GradeRecord {
            exam_id: exam_id.to_string(),
            question_index: self.index,
            score: self.score,
            max_score: self.max_score,
            feedback: self.feedback,
            graded_at,
        })
    }
}

/// Parse a single TOML file into an `ExamSnapshot`.
pub fn parse_snapshot(path: &Path) -> Result<ExamSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot file: {}", path.display()))?;

    parse_snapshot_str(&content, path)
}

/// Parse a TOML string into an `ExamSnapshot` (useful for testing).
pub fn parse_snapshot_str(content: &str, source_path: &Path) -> Result<ExamSnapshot> {
    let parsed: TomlSnapshotFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let exam_id = parsed.exam.id.trim().to_string();
    if exam_id.is_empty() {
        anyhow::bail!("{}: exam id is empty", source_path.display());
    }

    let answers = parsed
        .answers
        .into_iter()
        .map(|a| MergedAnswerEntry::new(exam_id.as_str(), a.index, a.question, a.answer))
        .collect();

    let records = |grades: Vec<TomlGrade>| -> Result<Vec<GradeRecord>> {
        grades
            .into_iter()
            .map(|g| g.into_record(&exam_id))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("invalid grade in {}", source_path.display()))
    };
    let primary_grades = records(parsed.primary_grades)?;
    let secondary_grades = records(parsed.secondary_grades)?;

    Ok(ExamSnapshot {
        exam_id: exam_id.clone(),
        student_id: parsed.exam.student_id,
        student_name: parsed.exam.student_name,
        answers,
        primary_grades,
        secondary_grades,
    })
}

/// Recursively load all `.toml` snapshot files from a directory.
pub fn load_snapshot_directory(dir: &Path) -> Result<Vec<ExamSnapshot>> {
    let mut snapshots = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            snapshots.extend(load_snapshot_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_snapshot(&path) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(snapshots)
}

/// Load a snapshot file, or every snapshot under a directory.
pub fn load_snapshots(path: &Path) -> Result<Vec<ExamSnapshot>> {
    if path.is_dir() {
        load_snapshot_directory(path)
    } else {
        Ok(vec![parse_snapshot(path)?])
    }
}

/// A warning from snapshot validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question index (if applicable).
    pub question_index: Option<u32>,
    /// Warning message.
    pub message: String,
}

/// Validate a snapshot for common issues.
pub fn validate_snapshot(snapshot: &ExamSnapshot, min_text_len: usize) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen = HashSet::new();
    for entry in &snapshot.answers {
        if entry.question_text.trim().is_empty() {
            warnings.push(ValidationWarning {
                question_index: Some(entry.question_index),
                message: "missing question text".into(),
            });
        }
        if !seen.insert(entry.question_index) {
            warnings.push(ValidationWarning {
                question_index: Some(entry.question_index),
                message: format!("duplicate question index: {}", entry.question_index),
            });
        }
    }

    for (view, grades) in [
        ("primary", &snapshot.primary_grades),
        ("secondary", &snapshot.secondary_grades),
    ] {
        for grade in grades {
            if !seen.contains(&grade.question_index) {
                warnings.push(ValidationWarning {
                    question_index: Some(grade.question_index),
                    message: format!("{view} grade for unknown question"),
                });
            }
            if let Some(violation) = GradeConsistencyValidator.check(grade) {
                warnings.push(ValidationWarning {
                    question_index: Some(grade.question_index),
                    message: format!(
                        "corrupt {view} grade {}/{}: {}",
                        violation.score, violation.max_score, violation.reason
                    ),
                });
            }
        }
    }

    for group in QuestionGroupResolver::new(min_text_len).resolve(&snapshot.answers) {
        if group.is_duplicate() {
            warnings.push(ValidationWarning {
                question_index: group.entries.first().map(|e| e.question_index),
                message: format!(
                    "questions {:?} share the text \"{}\"",
                    group.question_indexes(),
                    group.normalized_text
                ),
            });
        }
    }

    warnings
}
