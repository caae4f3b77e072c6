//! olaf-config: Declarative model and loading for olaf
//!
//! This crate provides the service/route/plugin model, the YAML and JSON
//! document parsers, model sources, and file watching for recompilation.

pub mod document;
pub mod error;
pub mod model;
pub mod source;
pub mod watcher;

pub use document::{parse_json, parse_yaml};
pub use error::{ConfigError, Result};
pub use model::*;
pub use source::{DefaultLoader, Source, SourceLoader};
pub use watcher::{ModelWatcher, ReloadManager};
