use criterion::{black_box, criterion_group, criterion_main, Criterion};

use gradesync_core::parser::parse_snapshot_str;

fn bench_snapshot_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_parsing");

    let small_toml = generate_snapshot_toml(5);
    let medium_toml = generate_snapshot_toml(50);
    let large_toml = generate_snapshot_toml(200);

    group.bench_function("5_questions", |b| {
        b.iter(|| parse_snapshot_str(black_box(&small_toml), black_box("bench.toml".as_ref())))
    });

    group.bench_function("50_questions", |b| {
        b.iter(|| parse_snapshot_str(black_box(&medium_toml), black_box("bench.toml".as_ref())))
    });

    group.bench_function("200_questions", |b| {
        b.iter(|| parse_snapshot_str(black_box(&large_toml), black_box("bench.toml".as_ref())))
    });

    group.finish();
}

fn generate_snapshot_toml(n: usize) -> String {
    let mut s = String::new();
    s.push_str(
        r#"[exam]
id = "bench"
student_id = "stu-1"
student_name = "Bench Student"
"#,
    );
    for i in 0..n {
        s.push_str(&format!(
            r#"
[[answers]]
index = {i}
question = "Write a query answering business question {i}"
answer = """
SELECT base, COUNT(*)
FROM pilots
WHERE active = 1
GROUP BY base;
"""
"#
        ));
    }
    for i in (0..n).step_by(2) {
        s.push_str(&format!(
            r#"
[[primary_grades]]
index = {i}
score = 6
max_score = 8
feedback = "Missing ORDER BY"
graded_at = "2025-07-17T10:00:00Z"

[[secondary_grades]]
index = {i}
score = 6
max_score = 8
feedback = "Missing ORDER BY"
graded_at = "2025-07-17T10:00:00Z"
"#
        ));
    }
    s
}

criterion_group!(benches, bench_snapshot_parsing);
criterion_main!(benches);
