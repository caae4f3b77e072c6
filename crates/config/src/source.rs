//! Model sources: local YAML files and HTTP endpoints serving JSON

use crate::document::{parse_json, parse_yaml};
use crate::error::{ConfigError, Result};
use crate::model::Model;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Where a model is loaded from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// A YAML document on disk
    File(PathBuf),

    /// A JSON document served over HTTP
    Http {
        url: String,
        /// Limit for the complete connection and request
        timeout: Option<Duration>,
    },
}

impl Source {
    /// Classify a user supplied location.
    ///
    /// URLs become HTTP sources; relative paths are resolved against
    /// `base_dir` (usually the directory of the file that referenced them).
    pub fn from_arg(arg: &str, base_dir: &Path) -> Self {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            return Source::Http {
                url: arg.to_string(),
                timeout: None,
            };
        }

        let path = Path::new(arg);
        if path.is_absolute() {
            Source::File(path.to_path_buf())
        } else {
            Source::File(base_dir.join(path))
        }
    }

    /// Build a source from the `type` / `path` pair of a handler definition
    pub fn from_kind(kind: &str, path: &str, timeout: Option<Duration>) -> Result<Self> {
        if path.is_empty() {
            return Err(ConfigError::InvalidSource("empty path".to_string()));
        }
        match kind {
            "file" => Ok(Source::File(PathBuf::from(path))),
            "http" => Ok(Source::Http {
                url: path.to_string(),
                timeout,
            }),
            "" => Err(ConfigError::InvalidSource("empty type".to_string())),
            other => Err(ConfigError::InvalidSource(format!(
                "unknown type {:?}",
                other
            ))),
        }
    }

    /// Local file path, if this is a file source
    pub fn path(&self) -> Option<&Path> {
        match self {
            Source::File(path) => Some(path),
            Source::Http { .. } => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::File(path) => write!(f, "{}", path.display()),
            Source::Http { url, .. } => f.write_str(url),
        }
    }
}

/// Loads a model from a source
#[async_trait]
pub trait SourceLoader: Send + Sync {
    async fn load(&self, source: &Source) -> Result<Model>;
}

/// Reads files with tokio and fetches URLs with reqwest
#[derive(Debug, Clone, Default)]
pub struct DefaultLoader {
    client: reqwest::Client,
}

impl DefaultLoader {
    pub fn new() -> Self {
        Self::default()
    }

    async fn load_file(&self, path: &Path) -> Result<Model> {
        let content = tokio::fs::read_to_string(path).await?;
        parse_yaml(&content)
    }

    async fn load_http(&self, url: &str, timeout: Option<Duration>) -> Result<Model> {
        let mut request = self.client.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status != reqwest::StatusCode::OK {
            return Err(ConfigError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        parse_json(&body)
    }
}

#[async_trait]
impl SourceLoader for DefaultLoader {
    async fn load(&self, source: &Source) -> Result<Model> {
        debug!(source = %source, "Loading model");

        let model = match source {
            Source::File(path) => self.load_file(path).await?,
            Source::Http { url, timeout } => self.load_http(url, *timeout).await?,
        };

        info!(
            source = %source,
            services = model.services.len(),
            routes = model.routes.len(),
            plugins = model.plugins.len(),
            "Model loaded"
        );
        Ok(model)
    }
}
