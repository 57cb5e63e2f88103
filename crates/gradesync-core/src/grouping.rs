//! Duplicate question detection within one exam.
//!
//! Two entries belong to the same logical question when their question texts
//! are equal after trimming and collapsing internal whitespace. Texts shorter
//! than the configured minimum are too generic to trust and always form a
//! group of their own.

use std::collections::{HashMap, HashSet};

use crate::error::ReconcileError;
use crate::model::{DuplicateGroup, MergedAnswerEntry};

/// Normalized texts shorter than this (in characters) are never merged.
pub const DEFAULT_MIN_QUESTION_TEXT_LEN: usize = 10;

/// Trim and collapse runs of whitespace to a single space.
pub fn normalize_question_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reject malformed entries before any grouping happens.
///
/// Every entry must belong to `exam_id`, carry non-blank question text, and
/// use a question index not seen earlier in the list.
pub fn validate_entries(exam_id: &str, entries: &[MergedAnswerEntry]) -> Result<(), ReconcileError> {
    let mut seen = HashSet::new();
    for entry in entries {
        let invalid = |reason: String| ReconcileError::Validation {
            exam_id: exam_id.to_string(),
            question_index: entry.question_index,
            reason,
        };
        if entry.exam_id != exam_id {
            return Err(invalid(format!("entry belongs to exam {}", entry.exam_id)));
        }
        if entry.question_text.trim().is_empty() {
            return Err(invalid("missing question text".to_string()));
        }
        if !seen.insert(entry.question_index) {
            return Err(invalid("duplicate question index".to_string()));
        }
    }
    Ok(())
}

/// Groups an exam's merged answers by normalized question text.
#[derive(Debug, Clone, Copy)]
pub struct QuestionGroupResolver {
    min_text_len: usize,
}

impl Default for QuestionGroupResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_QUESTION_TEXT_LEN)
    }
}

impl QuestionGroupResolver {
    pub fn new(min_text_len: usize) -> Self {
        Self { min_text_len }
    }

    pub fn min_text_len(&self) -> usize {
        self.min_text_len
    }

    /// Group entries, preserving encounter order of groups and of members.
    pub fn resolve(&self, entries: &[MergedAnswerEntry]) -> Vec<DuplicateGroup> {
        let mut groups: Vec<DuplicateGroup> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for entry in entries {
            let normalized = normalize_question_text(&entry.question_text);

            if normalized.chars().count() < self.min_text_len {
                groups.push(DuplicateGroup {
                    normalized_text: normalized,
                    entries: vec![entry.clone()],
                });
                continue;
            }

            match positions.get(&normalized) {
                Some(&pos) => groups[pos].entries.push(entry.clone()),
                None => {
                    positions.insert(normalized.clone(), groups.len());
                    groups.push(DuplicateGroup {
                        normalized_text: normalized,
                        entries: vec![entry.clone()],
                    });
                }
            }
        }

        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(idx: u32, text: &str) -> MergedAnswerEntry {
        MergedAnswerEntry::new("exam-1", idx, text, "SELECT 1;")
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(
            normalize_question_text("  Count the\tactive   pilots\n per base "),
            "Count the active pilots per base"
        );
        assert_eq!(normalize_question_text("   "), "");
    }

    #[test]
    fn whitespace_variants_share_a_group() {
        let entries = vec![
            entry(7, "Count the active pilots per base"),
            entry(8, "Count the  active pilots per base "),
            entry(9, "\tCount the active pilots\nper base"),
        ];
        let groups = QuestionGroupResolver::default().resolve(&entries);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].question_indexes(), vec![7, 8, 9]);
        assert!(groups[0].is_duplicate());
    }

    #[test]
    fn short_texts_are_never_merged() {
        let entries = vec![entry(0, "Q1"), entry(1, "Q1"), entry(2, "Explain JOIN types")];
        let groups = QuestionGroupResolver::default().resolve(&entries);
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| !g.is_duplicate()));
    }

    #[test]
    fn min_length_is_configurable() {
        let entries = vec![entry(0, "Q1"), entry(1, "Q1")];
        let groups = QuestionGroupResolver::new(1).resolve(&entries);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].entries.len(), 2);
    }

    #[test]
    fn group_order_follows_first_encounter() {
        let entries = vec![
            entry(3, "Write a query listing all aircraft"),
            entry(1, "Compute the operational efficiency"),
            entry(0, "Write a query listing all aircraft"),
        ];
        let groups = QuestionGroupResolver::default().resolve(&entries);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].question_indexes(), vec![3, 0]);
        assert_eq!(groups[1].question_indexes(), vec![1]);
    }

    #[test]
    fn validation_rejects_missing_text() {
        let entries = vec![entry(0, "Write a query listing all aircraft"), entry(1, "  ")];
        let err = validate_entries("exam-1", &entries).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Validation { question_index: 1, .. }
        ));
    }

    #[test]
    fn validation_rejects_repeated_index_and_foreign_exam() {
        let repeated = vec![entry(2, "First question text here"), entry(2, "Second question text here")];
        assert!(validate_entries("exam-1", &repeated).is_err());

        let foreign = vec![MergedAnswerEntry::new("exam-2", 0, "Some question text", "")];
        let err = validate_entries("exam-1", &foreign).unwrap_err();
        assert!(err.to_string().contains("exam-2"));
    }
}
