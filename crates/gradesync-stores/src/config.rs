//! Store configuration and factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use gradesync_core::engine::{EngineConfig, ReconciliationEngine};
use gradesync_core::grouping::DEFAULT_MIN_QUESTION_TEXT_LEN;
use gradesync_core::traits::{AnswerSource, GradeStore};

use crate::document::AnswerSink;
use crate::http::HttpGradeStore;
use crate::json_dir::JsonDirStore;
use crate::memory::MemoryStore;

/// Environment variable overriding the token of every http store.
pub const API_TOKEN_ENV: &str = "GRADESYNC_API_TOKEN";

/// Configuration for one persisted grade view.
///
/// Note: Custom Debug impl masks API tokens to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    Memory,
    JsonDir {
        path: PathBuf,
    },
    Http {
        base_url: String,
        #[serde(default)]
        api_token: Option<String>,
    },
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::Memory => f.debug_struct("Memory").finish(),
            StoreConfig::JsonDir { path } => {
                f.debug_struct("JsonDir").field("path", path).finish()
            }
            StoreConfig::Http {
                base_url,
                api_token,
            } => f
                .debug_struct("Http")
                .field("base_url", base_url)
                .field("api_token", &api_token.as_ref().map(|_| "***"))
                .finish(),
        }
    }
}

fn default_primary() -> StoreConfig {
    StoreConfig::JsonDir {
        path: PathBuf::from("./gradesync-data/primary"),
    }
}
fn default_secondary() -> StoreConfig {
    StoreConfig::JsonDir {
        path: PathBuf::from("./gradesync-data/secondary"),
    }
}
fn default_min_text_len() -> usize {
    DEFAULT_MIN_QUESTION_TEXT_LEN
}
fn default_parallelism() -> usize {
    4
}

/// Top-level gradesync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradesyncConfig {
    /// Normalized question texts shorter than this are never merged.
    #[serde(default = "default_min_text_len")]
    pub min_question_text_len: usize,
    /// Bound on waiting for an exam lock, in milliseconds.
    #[serde(default)]
    pub lock_timeout_ms: Option<u64>,
    /// Max exams reconciled concurrently.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// The primary assessment store (also the source of merged answers).
    #[serde(default = "default_primary")]
    pub primary: StoreConfig,
    /// The secondary grade index.
    #[serde(default = "default_secondary")]
    pub secondary: StoreConfig,
}

impl Default for GradesyncConfig {
    fn default() -> Self {
        Self {
            min_question_text_len: default_min_text_len(),
            lock_timeout_ms: None,
            parallelism: default_parallelism(),
            primary: default_primary(),
            secondary: default_secondary(),
        }
    }
}

impl GradesyncConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            min_question_text_len: self.min_question_text_len,
            lock_timeout: self.lock_timeout_ms.map(Duration::from_millis),
            parallelism: self.parallelism.max(1),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are not scanned again.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut cursor = 0;
    while let Some(offset) = result[cursor..].find("${") {
        let start = cursor + offset;
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!(
            "{}{}{}",
            &result[..start],
            value,
            &result[start + end + 1..]
        );
        cursor = start + value.len();
    }
    result
}

/// Resolve env vars in a store config.
fn resolve_store_config(config: &StoreConfig) -> StoreConfig {
    match config {
        StoreConfig::Memory => StoreConfig::Memory,
        StoreConfig::JsonDir { path } => StoreConfig::JsonDir {
            path: PathBuf::from(resolve_env_vars(&path.to_string_lossy())),
        },
        StoreConfig::Http {
            base_url,
            api_token,
        } => StoreConfig::Http {
            base_url: resolve_env_vars(base_url),
            api_token: api_token.as_ref().map(|t| resolve_env_vars(t)),
        },
    }
}

fn apply_token_override(config: &mut StoreConfig, token: &str) {
    if let StoreConfig::Http { api_token, .. } = config {
        *api_token = Some(token.to_string());
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `gradesync.toml` in the current directory
/// 2. `~/.config/gradesync/config.toml`
///
/// Environment variable override: `GRADESYNC_API_TOKEN`.
pub fn load_config() -> Result<GradesyncConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<GradesyncConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("gradesync.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<GradesyncConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => GradesyncConfig::default(),
    };

    config.primary = resolve_store_config(&config.primary);
    config.secondary = resolve_store_config(&config.secondary);

    if let Ok(token) = std::env::var(API_TOKEN_ENV) {
        apply_token_override(&mut config.primary, &token);
        apply_token_override(&mut config.secondary, &token);
    }

    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("gradesync"))
}

/// One opened backend, viewed through each trait it implements.
pub struct OpenedStore {
    pub grades: Arc<dyn GradeStore>,
    pub answers: Arc<dyn AnswerSource>,
    /// Present for backends that accept snapshot imports.
    pub sink: Option<Arc<dyn AnswerSink>>,
}

/// Create a store instance from its configuration.
pub fn create_store(name: &str, config: &StoreConfig) -> Result<OpenedStore> {
    match config {
        StoreConfig::Memory => {
            let store = Arc::new(MemoryStore::new(name));
            Ok(OpenedStore {
                grades: store.clone(),
                answers: store.clone(),
                sink: Some(store),
            })
        }
        StoreConfig::JsonDir { path } => {
            if path.as_os_str().is_empty() {
                anyhow::bail!("{name} store: json_dir path is empty");
            }
            let store = Arc::new(JsonDirStore::new(name, path.clone()));
            Ok(OpenedStore {
                grades: store.clone(),
                answers: store.clone(),
                sink: Some(store),
            })
        }
        StoreConfig::Http {
            base_url,
            api_token,
        } => {
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                anyhow::bail!("{name} store: invalid base_url '{base_url}'");
            }
            let store = Arc::new(HttpGradeStore::new(name, base_url, api_token.clone()));
            Ok(OpenedStore {
                grades: store.clone(),
                answers: store,
                sink: None,
            })
        }
    }
}

/// Both grade views plus the answer source, ready for an engine.
pub struct StoreSet {
    pub answers: Arc<dyn AnswerSource>,
    pub answer_sink: Option<Arc<dyn AnswerSink>>,
    pub primary: Arc<dyn GradeStore>,
    pub secondary: Arc<dyn GradeStore>,
}

impl StoreSet {
    pub fn engine(&self, config: EngineConfig) -> ReconciliationEngine {
        ReconciliationEngine::new(
            Arc::clone(&self.answers),
            Arc::clone(&self.primary),
            Arc::clone(&self.secondary),
            config,
        )
    }
}

/// Open the configured stores. Merged answers are read from the primary.
pub fn open_stores(config: &GradesyncConfig) -> Result<StoreSet> {
    let primary = create_store("primary", &config.primary)?;
    let secondary = create_store("secondary", &config.secondary)?;
    Ok(StoreSet {
        answers: primary.answers,
        answer_sink: primary.sink,
        primary: primary.grades,
        secondary: secondary.grades,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_GRADESYNC_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_GRADESYNC_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_GRADESYNC_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("no_close_${BRACE"), "no_close_${BRACE");
        std::env::remove_var("_GRADESYNC_TEST_VAR");
    }

    #[test]
    fn resolve_env_vars_does_not_expand_substituted_values() {
        std::env::set_var("_GRADESYNC_SELF_REF", "${_GRADESYNC_SELF_REF}");
        std::env::set_var("_GRADESYNC_TOKEN_PART", "tok");
        assert_eq!(
            resolve_env_vars("${_GRADESYNC_SELF_REF}/${_GRADESYNC_TOKEN_PART}"),
            "${_GRADESYNC_SELF_REF}/tok"
        );
        std::env::remove_var("_GRADESYNC_SELF_REF");
        std::env::remove_var("_GRADESYNC_TOKEN_PART");
    }

    #[test]
    fn default_config() {
        let config = GradesyncConfig::default();
        assert_eq!(config.min_question_text_len, 10);
        assert_eq!(config.parallelism, 4);
        assert!(config.lock_timeout_ms.is_none());
        assert!(matches!(config.primary, StoreConfig::JsonDir { .. }));
        assert!(config.engine_config().lock_timeout.is_none());
    }

    #[test]
    fn parse_store_config() {
        let toml_str = r#"
min_question_text_len = 12
lock_timeout_ms = 250

[primary]
type = "json_dir"
path = "./data/primary"

[secondary]
type = "http"
base_url = "https://grades.example.edu"
api_token = "tok-123"
"#;
        let config: GradesyncConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.min_question_text_len, 12);
        assert_eq!(config.parallelism, 4);
        assert_eq!(
            config.engine_config().lock_timeout,
            Some(Duration::from_millis(250))
        );
        assert!(matches!(config.secondary, StoreConfig::Http { .. }));
    }

    #[test]
    fn debug_masks_token() {
        let config = StoreConfig::Http {
            base_url: "https://grades.example.edu".into(),
            api_token: Some("tok-secret".into()),
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("tok-secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradesync.toml");
        std::fs::write(&path, "parallelism = 2\n[primary]\ntype = \"memory\"\n").unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.parallelism, 2);
        assert!(matches!(config.primary, StoreConfig::Memory));
        assert!(matches!(config.secondary, StoreConfig::JsonDir { .. }));

        assert!(load_config_from(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn factory_rejects_bad_urls() {
        let bad = StoreConfig::Http {
            base_url: "grades.example.edu".into(),
            api_token: None,
        };
        assert!(create_store("secondary", &bad).is_err());
        let memory = create_store("primary", &StoreConfig::Memory).unwrap();
        assert_eq!(memory.grades.name(), "primary");
        assert!(memory.sink.is_some());
    }
}
