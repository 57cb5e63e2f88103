//! Exam totals over canonical grades.

use serde::{Deserialize, Serialize};

use crate::model::CanonicalGrade;

/// Score totals for one exam, counting each logical question once.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExamTotals {
    pub total_score: f64,
    pub max_score: f64,
    /// `total_score / max_score` as a whole percentage, 0 when nothing is graded.
    pub percentage: u32,
    pub graded: usize,
    pub ungraded: usize,
}

/// Sum canonical grades. Ungraded questions contribute to neither total.
pub fn compute_exam_totals(grades: &[CanonicalGrade]) -> ExamTotals {
    let mut totals = ExamTotals::default();
    for grade in grades {
        match (grade.score, grade.max_score) {
            (Some(score), Some(max_score)) => {
                totals.total_score += score;
                totals.max_score += max_score;
                totals.graded += 1;
            }
            _ => totals.ungraded += 1,
        }
    }
    totals.percentage = percentage(totals.total_score, totals.max_score);
    totals
}

fn percentage(score: f64, max_score: f64) -> u32 {
    if max_score <= 0.0 {
        return 0;
    }
    (score / max_score * 100.0).round().max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(idx: u32, score: Option<f64>, max_score: Option<f64>) -> CanonicalGrade {
        CanonicalGrade {
            question_index: idx,
            question_text: format!("Question number {idx}"),
            score,
            max_score,
            feedback: score.map(|_| "ok".to_string()),
        }
    }

    #[test]
    fn totals_skip_ungraded() {
        let totals = compute_exam_totals(&[
            canonical(0, Some(7.0), Some(8.0)),
            canonical(1, None, None),
            canonical(2, Some(5.0), Some(10.0)),
        ]);
        assert_eq!(totals.total_score, 12.0);
        assert_eq!(totals.max_score, 18.0);
        assert_eq!(totals.percentage, 67);
        assert_eq!(totals.graded, 2);
        assert_eq!(totals.ungraded, 1);
    }

    #[test]
    fn half_percent_rounds_up() {
        // 1/8 = 12.5%
        let totals = compute_exam_totals(&[canonical(0, Some(1.0), Some(8.0))]);
        assert_eq!(totals.percentage, 13);
    }

    #[test]
    fn nothing_graded_is_zero_percent() {
        let totals = compute_exam_totals(&[canonical(0, None, None)]);
        assert_eq!(totals.percentage, 0);
        assert_eq!(totals.max_score, 0.0);
        assert_eq!(compute_exam_totals(&[]), ExamTotals::default());
    }
}
