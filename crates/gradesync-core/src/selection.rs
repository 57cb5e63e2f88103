//! Canonical grade selection for duplicate groups.
//!
//! Policy for a group with more than one member:
//! 1. a member with a valid grade beats one without;
//! 2. among valid grades the strictly highest score wins, ties going to the
//!    member encountered first;
//! 3. with no valid grade at all, the first member not carrying a corrupt
//!    grade stands in, ungraded (the first member when all are corrupt).
//!
//! A singleton always selects its only member. Its grade is surfaced only if
//! it passed the consistency check.

use crate::consistency::ValidatedGrades;
use crate::model::{CanonicalSelection, DuplicateGroup, GradeRecord, SelectionReason};

#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalGradeSelector;

impl CanonicalGradeSelector {
    /// Pick the representative of one group. Returns `None` only for an
    /// empty group.
    pub fn select(
        &self,
        group: &DuplicateGroup,
        grades: &ValidatedGrades,
    ) -> Option<CanonicalSelection> {
        let first = group.entries.first()?;

        let mut best: Option<&GradeRecord> = None;
        let mut graded_members = 0usize;
        for entry in &group.entries {
            let Some(grade) = grades.get(entry.question_index) else {
                continue;
            };
            graded_members += 1;
            match best {
                Some(current) if grade.score <= current.score => {}
                _ => best = Some(grade),
            }
        }

        let (question_index, reason, grade) = match best {
            Some(grade) if graded_members > 1 => (
                grade.question_index,
                SelectionReason::HighestScore,
                Some(grade.clone()),
            ),
            Some(grade) => (
                grade.question_index,
                SelectionReason::HasGrade,
                Some(grade.clone()),
            ),
            None => {
                let stand_in = group
                    .entries
                    .iter()
                    .find(|e| !grades.is_corrupt(e.question_index))
                    .unwrap_or(first);
                (
                    stand_in.question_index,
                    SelectionReason::FirstOccurrenceFallback,
                    None,
                )
            }
        };

        let superseded = group
            .entries
            .iter()
            .map(|e| e.question_index)
            .filter(|&idx| idx != question_index)
            .collect();

        Some(CanonicalSelection {
            exam_id: first.exam_id.clone(),
            normalized_text: group.normalized_text.clone(),
            question_index,
            reason,
            grade,
            superseded,
        })
    }

    /// Select for every group, in group order.
    pub fn select_all(
        &self,
        groups: &[DuplicateGroup],
        grades: &ValidatedGrades,
    ) -> Vec<CanonicalSelection> {
        groups
            .iter()
            .filter_map(|group| self.select(group, grades))
            .collect()
    }
}
