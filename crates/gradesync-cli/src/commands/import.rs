//! The `gradesync import` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use gradesync_core::parser::load_snapshots;
use gradesync_stores::config::{load_config_from, open_stores};
use gradesync_stores::seed::seed_snapshot;

pub async fn execute(snapshot_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let stores = open_stores(&config)?;
    let sink = stores
        .answer_sink
        .as_deref()
        .context("the primary store does not accept imports; use a json_dir or memory store")?;

    let snapshots = load_snapshots(&snapshot_path)?;
    anyhow::ensure!(
        !snapshots.is_empty(),
        "no snapshots found in {}",
        snapshot_path.display()
    );

    for snapshot in &snapshots {
        let summary = seed_snapshot(
            sink,
            stores.primary.as_ref(),
            stores.secondary.as_ref(),
            snapshot,
        )
        .await
        .with_context(|| format!("failed to import exam {}", snapshot.exam_id))?;
        println!(
            "Imported {}: {} answers, {} primary grades, {} secondary grades",
            snapshot.exam_id, summary.answers, summary.primary_grades, summary.secondary_grades
        );
    }

    println!("\n{} exam(s) imported.", snapshots.len());
    Ok(())
}
