//! Error types for loading the declarative model

use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response from {url}: code: {status}, err: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("{kind} {name:?} already exists")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Invalid source: {0}")]
    InvalidSource(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
