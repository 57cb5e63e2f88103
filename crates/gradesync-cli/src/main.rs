//! gradesync CLI, the operator-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "gradesync",
    version,
    about = "Reconcile exam grades across duplicate questions and two grade stores"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create starter config and example exam snapshot
    Init,

    /// Validate exam snapshot TOML files
    Validate {
        /// Path to snapshot file or directory
        #[arg(long)]
        snapshot: PathBuf,

        /// Minimum normalized question text length for duplicate detection
        #[arg(long, default_value = "10")]
        min_text_len: usize,
    },

    /// Seed the configured stores from exam snapshots
    Import {
        /// Path to snapshot file or directory
        #[arg(long)]
        snapshot: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Record a grade and reconcile its exam
    Submit {
        /// Exam id
        #[arg(long)]
        exam: String,

        /// Question index within the exam
        #[arg(long)]
        question: u32,

        /// Awarded score
        #[arg(long)]
        score: f64,

        /// Maximum score for the question
        #[arg(long)]
        max_score: f64,

        /// Grader feedback
        #[arg(long, default_value = "")]
        feedback: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Re-sync canonical grades into both stores
    Reconcile {
        /// Exam ids (all assembled exams when omitted)
        #[arg(long = "exam")]
        exams: Vec<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show one grade per logical question, with totals
    Grades {
        /// Exam id
        #[arg(long)]
        exam: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List canonical questions on which the two stores disagree
    Check {
        /// Exam id
        #[arg(long)]
        exam: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Produce a read-only reconciliation audit
    Report {
        /// Exam ids (all assembled exams when omitted)
        #[arg(long = "exam")]
        exams: Vec<String>,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,

        /// Write the report to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gradesync=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate {
            snapshot,
            min_text_len,
        } => commands::validate::execute(snapshot, min_text_len),
        Commands::Import { snapshot, config } => commands::import::execute(snapshot, config).await,
        Commands::Submit {
            exam,
            question,
            score,
            max_score,
            feedback,
            config,
        } => commands::submit::execute(exam, question, score, max_score, feedback, config).await,
        Commands::Reconcile { exams, config } => commands::reconcile::execute(exams, config).await,
        Commands::Grades {
            exam,
            format,
            config,
        } => commands::grades::execute(exam, format, config).await,
        Commands::Check { exam, config } => commands::check::execute(exam, config).await,
        Commands::Report {
            exams,
            format,
            output,
            config,
        } => commands::report::execute(exams, format, output, config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
