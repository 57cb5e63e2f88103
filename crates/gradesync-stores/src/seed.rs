//! Seeding stores from exam snapshots.

use gradesync_core::model::ExamSnapshot;
use gradesync_core::traits::GradeStore;
use gradesync_core::StoreError;

use crate::document::AnswerSink;

/// Counts of what one snapshot import wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub answers: usize,
    pub primary_grades: usize,
    pub secondary_grades: usize,
}

/// Write a snapshot's answers and primary grades to the primary store and
/// its secondary grades to the secondary store.
///
/// Grades are written as-is, duplicates and corrupt values included.
pub async fn seed_snapshot(
    answers: &dyn AnswerSink,
    primary: &dyn GradeStore,
    secondary: &dyn GradeStore,
    snapshot: &ExamSnapshot,
) -> Result<SeedSummary, StoreError> {
    answers
        .put_answers(&snapshot.exam_id, snapshot.answers.clone())
        .await?;
    for record in &snapshot.primary_grades {
        primary.upsert_grade(record).await?;
    }
    for record in &snapshot.secondary_grades {
        secondary.upsert_grade(record).await?;
    }

    tracing::info!(
        exam_id = %snapshot.exam_id,
        answers = snapshot.answers.len(),
        primary_grades = snapshot.primary_grades.len(),
        secondary_grades = snapshot.secondary_grades.len(),
        "snapshot imported"
    );

    Ok(SeedSummary {
        answers: snapshot.answers.len(),
        primary_grades: snapshot.primary_grades.len(),
        secondary_grades: snapshot.secondary_grades.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use gradesync_core::parser::parse_snapshot_str;
    use gradesync_core::traits::AnswerSource;
    use std::path::Path;

    #[tokio::test]
    async fn seeds_both_views() {
        let snapshot = parse_snapshot_str(
            r#"
[exam]
id = "exam-1"

[[answers]]
index = 0
question = "Count the active pilots in every base"

[[primary_grades]]
index = 0
score = 4
max_score = 8

[[secondary_grades]]
index = 0
score = 3
max_score = 8
"#,
            Path::new("exam-1.toml"),
        )
        .unwrap();

        let primary = MemoryStore::new("primary");
        let secondary = MemoryStore::new("secondary");
        let summary = seed_snapshot(&primary, &primary, &secondary, &snapshot)
            .await
            .unwrap();

        assert_eq!(summary.answers, 1);
        assert!(primary.merged_answers("exam-1").await.unwrap().is_some());
        assert_eq!(primary.get_grade("exam-1", 0).await.unwrap().unwrap().score, 4.0);
        assert_eq!(secondary.get_grade("exam-1", 0).await.unwrap().unwrap().score, 3.0);
    }
}
