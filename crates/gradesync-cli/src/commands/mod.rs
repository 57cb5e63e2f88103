pub mod check;
pub mod grades;
pub mod import;
pub mod init;
pub mod report;
pub mod reconcile;
pub mod submit;
pub mod validate;

use std::path::PathBuf;

use anyhow::Result;

use gradesync_core::engine::ReconciliationEngine;
use gradesync_stores::config::{load_config_from, open_stores};

/// Load the config and build an engine over the configured stores.
pub(crate) fn open_engine(config_path: Option<PathBuf>) -> Result<ReconciliationEngine> {
    let config = load_config_from(config_path.as_deref())?;
    let stores = open_stores(&config)?;
    Ok(stores.engine(config.engine_config()))
}

/// The requested exams, or every assembled exam when none were named.
pub(crate) async fn resolve_exam_ids(
    engine: &ReconciliationEngine,
    exams: Vec<String>,
) -> Result<Vec<String>> {
    if exams.is_empty() {
        Ok(engine.exam_ids().await?)
    } else {
        Ok(exams)
    }
}
