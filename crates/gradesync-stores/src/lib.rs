//! gradesync-stores: Persisted grade views and their configuration.
//!
//! Implements the `GradeStore` and `AnswerSource` traits over an in-memory
//! map, a directory of JSON documents, and a remote document service, plus
//! a fault-injecting mock for tests.

pub mod config;
pub mod document;
pub mod http;
pub mod json_dir;
pub mod memory;
pub mod mock;
pub mod seed;

pub use config::{create_store, load_config, open_stores, GradesyncConfig, StoreConfig, StoreSet};
pub use document::{AnswerSink, ExamDocument};
pub use http::HttpGradeStore;
pub use json_dir::JsonDirStore;
pub use memory::MemoryStore;
pub use mock::MockGradeStore;
