//! The `gradesync init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("gradesync.toml").exists() {
        println!("gradesync.toml already exists, skipping.");
    } else {
        std::fs::write("gradesync.toml", SAMPLE_CONFIG)?;
        println!("Created gradesync.toml");
    }

    std::fs::create_dir_all("exams")?;
    let example_path = std::path::Path::new("exams/example.toml");
    if example_path.exists() {
        println!("exams/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_SNAPSHOT)?;
        println!("Created exams/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: gradesync validate --snapshot exams/example.toml");
    println!("  2. Run: gradesync import --snapshot exams/example.toml");
    println!("  3. Run: gradesync reconcile");
    println!("  4. Run: gradesync grades --exam example-exam");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# gradesync configuration

# Normalized question texts shorter than this are never merged.
min_question_text_len = 10
# Max exams reconciled concurrently.
parallelism = 4
# Uncomment to bound the wait for an exam lock.
# lock_timeout_ms = 5000

[primary]
type = "json_dir"
path = "./gradesync-data/primary"

[secondary]
type = "json_dir"
path = "./gradesync-data/secondary"

# A remote secondary index:
# [secondary]
# type = "http"
# base_url = "https://grades.example.edu"
# api_token = "${GRADESYNC_API_TOKEN}"
"#;

const EXAMPLE_SNAPSHOT: &str = r#"[exam]
id = "example-exam"
student_id = "s-1001"
student_name = "Example Student"

# Questions 0 and 3 were merged from two source sections and share a text.
[[answers]]
index = 0
question = "Compute and display the operational efficiency of each base"
answer = "SELECT base, SUM(flights) / COUNT(*) FROM flights GROUP BY base"

[[answers]]
index = 1
question = "Count the active pilots in every base"
answer = "SELECT base, COUNT(*) FROM pilots WHERE active GROUP BY base"

[[answers]]
index = 2
question = "List aircraft that never left the hangar"
answer = "SELECT id FROM aircraft WHERE id NOT IN (SELECT aircraft_id FROM flights)"

[[answers]]
index = 3
question = "Compute and display the operational efficiency of each base"
answer = "SELECT base, SUM(flights) / COUNT(*) FROM flights GROUP BY base"

[[primary_grades]]
index = 1
score = 6
max_score = 8
feedback = "Missing the ORDER BY"
graded_at = "2025-07-17T10:00:00Z"

[[primary_grades]]
index = 3
score = 8
max_score = 8
feedback = "Correct"
graded_at = "2025-07-17T10:05:00Z"

[[secondary_grades]]
index = 1
score = 5
max_score = 8
feedback = "Missing the ORDER BY"
graded_at = "2025-07-17T09:00:00Z"
"#;
