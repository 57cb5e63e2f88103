//! Mutual exclusion of per-exam reconciliation under contention.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use gradesync_core::coordinator::ExclusiveWriteCoordinator;
use gradesync_core::engine::{EngineConfig, ReconciliationEngine};
use gradesync_core::model::{GradeSubmission, MergedAnswerEntry};
use gradesync_core::traits::GradeStore;
use gradesync_core::ReconcileError;
use gradesync_stores::{AnswerSink, MockGradeStore};

const TEXTS: [&str; 4] = [
    "Compute and display the operational efficiency",
    "Count the active pilots in every base",
    "List aircraft that never left the hangar",
    "Explain the difference between WHERE and HAVING",
];

/// An exam where questions `i` and `i + 4` share a text.
async fn slow_stores(exam_ids: &[&str]) -> (Arc<MockGradeStore>, Arc<MockGradeStore>) {
    let primary = Arc::new(MockGradeStore::new("primary"));
    let secondary = Arc::new(MockGradeStore::new("secondary"));
    for exam_id in exam_ids {
        let entries = (0..8u32)
            .map(|idx| MergedAnswerEntry::new(*exam_id, idx, TEXTS[idx as usize % 4], "SELECT ..."))
            .collect();
        primary.put_answers(exam_id, entries).await.unwrap();
    }
    primary.set_delay(Duration::from_millis(5));
    secondary.set_delay(Duration::from_millis(5));
    (primary, secondary)
}

fn engine(
    primary: &Arc<MockGradeStore>,
    secondary: &Arc<MockGradeStore>,
    config: EngineConfig,
) -> Arc<ReconciliationEngine> {
    Arc::new(ReconciliationEngine::new(
        primary.clone(),
        primary.clone(),
        secondary.clone(),
        config,
    ))
}

fn submission(exam_id: &str, idx: u32, score: f64) -> GradeSubmission {
    GradeSubmission {
        exam_id: exam_id.into(),
        question_index: idx,
        score,
        max_score: 8.0,
        feedback: format!("round {score}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_lose_no_updates() {
    let (primary, secondary) = slow_stores(&["exam-1"]).await;
    let engine = engine(&primary, &secondary, EngineConfig::default());

    let handles: Vec<_> = (0..8u32)
        .map(|idx| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .submit_grade(submission("exam-1", idx, f64::from(idx)))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for idx in 0..8u32 {
        let stored = primary.get_grade("exam-1", idx).await.unwrap().unwrap();
        assert_eq!(stored.score, f64::from(idx));
    }

    // Questions 4..8 outscore their duplicates 0..4 and must be canonical everywhere.
    let grades = engine.canonical_grades("exam-1").await.unwrap();
    let canonical: Vec<u32> = grades.iter().map(|g| g.question_index).collect();
    assert_eq!(canonical, vec![4, 5, 6, 7]);
    assert!(engine.check_exam("exam-1").await.unwrap().is_empty());
    for idx in 4..8u32 {
        assert_eq!(
            secondary.get_grade("exam-1", idx).await.unwrap(),
            primary.get_grade("exam-1", idx).await.unwrap()
        );
    }
    assert_eq!(engine.coordinator().active_keys(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_writes_to_one_question_leave_stores_in_agreement() {
    let (primary, secondary) = slow_stores(&["exam-1"]).await;
    let engine = engine(&primary, &secondary, EngineConfig::default());

    let results = join_all((1..=6).map(|round| {
        let engine = Arc::clone(&engine);
        async move {
            engine
                .submit_grade(submission("exam-1", 2, f64::from(round)))
                .await
        }
    }))
    .await;
    assert!(results.iter().all(|r| r.is_ok()));

    let primary_grade = primary.get_grade("exam-1", 2).await.unwrap();
    let secondary_grade = secondary.get_grade("exam-1", 2).await.unwrap();
    assert!(primary_grade.is_some());
    assert_eq!(primary_grade, secondary_grade);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn critical_sections_for_one_exam_never_overlap() {
    let coordinator = Arc::new(ExclusiveWriteCoordinator::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            tokio::spawn(async move {
                coordinator
                    .run_exclusive("exam-1", || async {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(2)).await;
                        inside.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, ReconcileError>(())
                    })
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.active_keys(), 0);
}

#[tokio::test(start_paused = true)]
async fn different_exams_reconcile_in_parallel() {
    let (primary, secondary) = slow_stores(&["exam-1", "exam-2", "exam-3", "exam-4"]).await;
    let engine = engine(&primary, &secondary, EngineConfig::default());
    let ids: Vec<String> = engine.exam_ids().await.unwrap();

    let single_started = tokio::time::Instant::now();
    engine.reconcile_exam("exam-1").await.unwrap();
    let single = single_started.elapsed();

    let started = tokio::time::Instant::now();
    let results = join_all(ids.iter().map(|id| engine.reconcile_exam(id))).await;
    assert!(results.iter().all(|r| r.is_ok()));
    assert!(started.elapsed() < single * 4);
}

#[tokio::test(start_paused = true)]
async fn lock_wait_is_bounded_when_configured() {
    let (primary, secondary) = slow_stores(&["exam-1"]).await;
    primary.set_delay(Duration::from_millis(500));
    let engine = engine(
        &primary,
        &secondary,
        EngineConfig {
            lock_timeout: Some(Duration::from_millis(100)),
            ..EngineConfig::default()
        },
    );

    let holder = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.reconcile_exam("exam-1").await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let err = engine
        .submit_grade(submission("exam-1", 0, 4.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::ConcurrencyTimeout { ref key, .. } if key == "exam-1"));
    assert!(err.is_retryable());

    holder.await.unwrap().unwrap();
    assert!(primary.get_grade("exam-1", 0).await.unwrap().is_none());
}
