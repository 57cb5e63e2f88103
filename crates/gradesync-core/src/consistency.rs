//! Detection of provably corrupt legacy grades.
//!
//! A grade with `max_score == 1` and `score > max_score` is the signature of
//! a historical defect where per-question weight defaulted to 1 while the
//! grading surface awarded points on another scale. Such grades are reported
//! and excluded from canonical candidacy. They are never rewritten here.

use std::collections::HashMap;

use crate::model::{ConsistencyViolation, GradeRecord, ViolationReason};

/// Splits candidate grades into usable ones and violations.
#[derive(Debug, Clone, Copy, Default)]
pub struct GradeConsistencyValidator;

/// Grades keyed by question index, with corrupt ones removed.
#[derive(Debug, Clone, Default)]
pub struct ValidatedGrades {
    pub valid: HashMap<u32, GradeRecord>,
    /// Violations in input order.
    pub violations: Vec<ConsistencyViolation>,
}

impl ValidatedGrades {
    pub fn get(&self, question_index: u32) -> Option<&GradeRecord> {
        self.valid.get(&question_index)
    }

    pub fn is_corrupt(&self, question_index: u32) -> bool {
        self.violations
            .iter()
            .any(|v| v.question_index == question_index)
    }
}

impl GradeConsistencyValidator {
    /// Returns the violation for a corrupt record, `None` for a usable one.
    pub fn check(&self, record: &GradeRecord) -> Option<ConsistencyViolation> {
        if record.max_score == 1.0 && record.score > record.max_score {
            return Some(ConsistencyViolation {
                exam_id: record.exam_id.clone(),
                question_index: record.question_index,
                score: record.score,
                max_score: record.max_score,
                reason: ViolationReason::ScoreExceedsUnitWeight,
            });
        }
        None
    }

    /// Annotate a set of grades. Later records for the same question index
    /// replace earlier ones.
    pub fn partition<I>(&self, records: I) -> ValidatedGrades
    where
        I: IntoIterator<Item = GradeRecord>,
    {
        let mut validated = ValidatedGrades::default();
        for record in records {
            match self.check(&record) {
                Some(violation) => {
                    validated.valid.remove(&record.question_index);
                    validated
                        .violations
                        .retain(|v| v.question_index != record.question_index);
                    validated.violations.push(violation);
                }
                None => {
                    validated
                        .violations
                        .retain(|v| v.question_index != record.question_index);
                    validated.valid.insert(record.question_index, record);
                }
            }
        }
        validated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn grade(idx: u32, score: f64, max_score: f64) -> GradeRecord {
        GradeRecord {
            exam_id: "exam-1".into(),
            question_index: idx,
            score,
            max_score,
            feedback: String::new(),
            graded_at: Utc::now(),
        }
    }

    #[test]
    fn score_above_unit_weight_is_corrupt() {
        let validator = GradeConsistencyValidator;
        let violation = validator.check(&grade(11, 4.0, 1.0)).unwrap();
        assert_eq!(violation.question_index, 11);
        assert_eq!(violation.reason, ViolationReason::ScoreExceedsUnitWeight);
    }

    #[test]
    fn other_grades_are_accepted() {
        let validator = GradeConsistencyValidator;
        assert!(validator.check(&grade(0, 1.0, 1.0)).is_none());
        assert!(validator.check(&grade(0, 0.5, 1.0)).is_none());
        assert!(validator.check(&grade(0, 7.0, 8.0)).is_none());
        // Over max on a real scale is suspicious but not the known signature.
        assert!(validator.check(&grade(0, 9.0, 8.0)).is_none());
    }

    #[test]
    fn partition_separates_violations() {
        let validated = GradeConsistencyValidator.partition(vec![
            grade(5, 7.0, 8.0),
            grade(6, 7.0, 1.0),
            grade(7, 0.0, 8.0),
        ]);
        assert_eq!(validated.valid.len(), 2);
        assert!(validated.get(6).is_none());
        assert!(validated.is_corrupt(6));
        assert_eq!(validated.violations.len(), 1);
    }

    #[test]
    fn partition_keeps_latest_record_per_question() {
        let validated =
            GradeConsistencyValidator.partition(vec![grade(3, 4.0, 1.0), grade(3, 6.0, 8.0)]);
        assert!(!validated.is_corrupt(3));
        assert_eq!(validated.get(3).map(|g| g.score), Some(6.0));
    }
}
