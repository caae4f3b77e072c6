//! Expansion of `olaf` handlers inside a Caddy JSON config
//!
//! An `olaf` handler names a model source:
//!
//! ```json
//! {"handler": "olaf", "type": "file", "path": "/etc/caddy/olaf.yaml"}
//! {"handler": "olaf", "type": "http", "path": "http://config/olaf", "timeout": "5s"}
//! ```
//!
//! Expansion replaces it in place with a `subroute` handler holding the
//! compiled routes of that model.

use crate::duration::parse_duration;
use crate::error::{BuildError, Result};
use crate::route::{compile, CompileOptions};
use config::{Source, SourceLoader};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const HANDLER_OLAF: &str = "olaf";
const HANDLER_SUBROUTE: &str = "subroute";

/// Expands `olaf` handlers using models fetched through a loader
pub struct Expander {
    loader: Arc<dyn SourceLoader>,
    options: CompileOptions,
}

impl Expander {
    pub fn new(loader: Arc<dyn SourceLoader>) -> Self {
        Self {
            loader,
            options: CompileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Expand every `olaf` handler under `apps.http.servers.*.routes`.
    ///
    /// Each distinct source is loaded and compiled once. Nothing is
    /// modified unless every source compiles.
    pub async fn expand(&self, config: &mut Value) -> Result<()> {
        let mut sources = Vec::new();
        walk_servers(config, &mut |handler| {
            sources.push(olaf_source(handler)?);
            Ok(())
        })?;

        if sources.is_empty() {
            debug!("No olaf handler found");
            return Ok(());
        }

        let mut compiled: HashMap<Source, Value> = HashMap::new();
        for source in sources {
            if compiled.contains_key(&source) {
                continue;
            }
            let model = self.loader.load(&source).await?;
            let routes = compile(&model, &self.options)?;
            info!(source = %source, routes = routes.len(), "Expanding olaf handler");
            compiled.insert(source, serde_json::to_value(routes)?);
        }

        walk_servers(config, &mut |handler| {
            let source = olaf_source(handler)?;
            let routes = compiled
                .get(&source)
                .cloned()
                .ok_or_else(|| BuildError::InvalidHandler(format!("source {} not loaded", source)))?;

            handler.remove("type");
            handler.remove("path");
            handler.remove("timeout");
            handler.insert("handler".to_string(), Value::from(HANDLER_SUBROUTE));
            handler.insert("routes".to_string(), routes);
            Ok(())
        })
    }
}

type Visitor<'a> = dyn FnMut(&mut Map<String, Value>) -> Result<()> + 'a;

fn walk_servers(config: &mut Value, visit: &mut Visitor<'_>) -> Result<()> {
    let servers = config
        .pointer_mut("/apps/http/servers")
        .and_then(Value::as_object_mut);

    if let Some(servers) = servers {
        for server in servers.values_mut() {
            if let Some(routes) = server.get_mut("routes").and_then(Value::as_array_mut) {
                walk_routes(routes, visit)?;
            }
        }
    }
    Ok(())
}

/// Visit the first `olaf` handler of each route, descending into subroutes
/// that precede it
fn walk_routes(routes: &mut [Value], visit: &mut Visitor<'_>) -> Result<()> {
    for route in routes {
        let Some(handle) = route.get_mut("handle").and_then(Value::as_array_mut) else {
            continue;
        };

        for handler in handle.iter_mut().filter_map(Value::as_object_mut) {
            let name = handler
                .get("handler")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            match name.as_str() {
                HANDLER_OLAF => {
                    visit(handler)?;
                    break;
                }
                HANDLER_SUBROUTE => {
                    if let Some(sub) = handler.get_mut("routes").and_then(Value::as_array_mut) {
                        walk_routes(sub, visit)?;
                    }
                }
                _ => {}
            }
        }
    }
    Ok(())
}

fn str_field<'a>(handler: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    match handler.get(key) {
        None | Some(Value::Null) => Ok(""),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(BuildError::InvalidHandler(format!(
            "{} must be a string, got {}",
            key, other
        ))),
    }
}

/// Timeout of an HTTP source: nanoseconds or a duration string
fn timeout_field(handler: &Map<String, Value>) -> Result<Option<Duration>> {
    let timeout = match handler.get("timeout") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Duration::from_nanos).ok_or_else(|| {
            BuildError::InvalidHandler(format!("invalid timeout {}", n))
        })?,
        Some(Value::String(s)) => parse_duration(s)
            .map_err(|e| BuildError::InvalidHandler(format!("invalid timeout: {}", e)))?,
        Some(other) => {
            return Err(BuildError::InvalidHandler(format!(
                "invalid timeout {}",
                other
            )))
        }
    };

    Ok((!timeout.is_zero()).then_some(timeout))
}

fn olaf_source(handler: &Map<String, Value>) -> Result<Source> {
    let kind = str_field(handler, "type")?;
    let path = str_field(handler, "path")?;
    Ok(Source::from_kind(kind, path, timeout_field(handler)?)?)
}
