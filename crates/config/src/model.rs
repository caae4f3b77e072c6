//! Declarative model of services, routes and plugins
//!
//! The model is produced once per load by a [`crate::SourceLoader`] and is
//! only ever read by the route builder.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The built-in traffic splitting plugin type
pub const PLUGIN_TYPE_CANARY: &str = "canary";

/// Root of the declarative model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    /// Free-form document version
    pub version: String,

    /// Services keyed by name
    pub services: BTreeMap<String, Service>,

    /// Routes in load order
    pub routes: Vec<Route>,

    /// Plugins of every scope in load order
    pub plugins: Vec<Plugin>,
}

impl Model {
    /// Create an empty model with the given version
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Default::default()
        }
    }

    /// Add a service, rejecting duplicate names
    pub fn add_service(&mut self, service: Service) -> Result<()> {
        if self.services.contains_key(&service.name) {
            return Err(ConfigError::DuplicateName {
                kind: "service",
                name: service.name,
            });
        }
        self.services.insert(service.name.clone(), service);
        Ok(())
    }

    /// Add a route, rejecting duplicate names
    pub fn add_route(&mut self, route: Route) -> Result<()> {
        if self.route(&route.name).is_some() {
            return Err(ConfigError::DuplicateName {
                kind: "route",
                name: route.name,
            });
        }
        self.routes.push(route);
        Ok(())
    }

    /// Add a plugin, rejecting duplicate names
    pub fn add_plugin(&mut self, plugin: Plugin) -> Result<()> {
        if self.plugins.iter().any(|p| p.name == plugin.name) {
            return Err(ConfigError::DuplicateName {
                kind: "plugin",
                name: plugin.name,
            });
        }
        self.plugins.push(plugin);
        Ok(())
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn route(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// Routes owned by the given service
    pub fn routes_of<'a>(&'a self, service: &'a str) -> impl Iterator<Item = &'a Route> + 'a {
        self.routes.iter().filter(move |r| r.service_name == service)
    }

    /// Plugins declared on exactly the given scope.
    ///
    /// `(None, None)` lists global plugins, `(Some(s), None)` plugins bound
    /// to service `s` only, and so on.
    pub fn plugins_of<'a>(
        &'a self,
        service: Option<&'a str>,
        route: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Plugin> + 'a {
        self.plugins.iter().filter(move |p| {
            non_empty(&p.service_name) == service && non_empty(&p.route_name) == route
        })
    }

    /// Upstream of the named service, if both exist
    pub fn upstream_of(&self, service: &str) -> Option<&Upstream> {
        self.service(service).and_then(|s| s.upstream.as_ref())
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// A named backend target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub name: String,

    /// Where proxied requests are sent; only static routes may omit it
    #[serde(default)]
    pub upstream: Option<Upstream>,
}

/// Upstream definition of a service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Upstream {
    #[serde(default)]
    pub backends: Vec<Backend>,

    /// HTTP transport settings
    #[serde(default)]
    pub http: Option<TransportHttp>,

    #[serde(default, rename = "lb")]
    pub load_balancing: Option<LoadBalancing>,

    #[serde(default, rename = "active_hc")]
    pub active_health_checks: Option<ActiveHealthChecks>,

    /// Header manipulation on the way to the backend
    #[serde(default)]
    pub header_up: Option<HeaderOps>,

    /// Header manipulation on the way back to the client
    #[serde(default)]
    pub header_down: Option<HeaderOps>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Backend {
    /// Network address to dial (`host:port`, `tcp/host:port`, `unix//path`)
    pub dial: String,

    /// Maximum concurrent requests, 0 = unlimited
    #[serde(default)]
    pub max_requests: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportHttp {
    /// Duration string, e.g. "3s"
    #[serde(default)]
    pub dial_timeout: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancing {
    /// Selection policy name, "random" when empty
    #[serde(default)]
    pub policy: String,

    #[serde(default)]
    pub try_duration: String,

    #[serde(default)]
    pub interval: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveHealthChecks {
    #[serde(default)]
    pub uri: String,

    #[serde(default)]
    pub port: u16,

    #[serde(default)]
    pub interval: String,

    #[serde(default)]
    pub timeout: String,

    /// Expected status code, 0 = any 2xx
    #[serde(default)]
    pub status_code: u16,
}

/// Header manipulations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeaderOps {
    /// Add new header fields or overwrite existing ones
    #[serde(default)]
    pub set: BTreeMap<String, Vec<String>>,

    /// Add new header fields
    #[serde(default)]
    pub add: BTreeMap<String, Vec<String>>,

    /// Remove header fields
    #[serde(default)]
    pub delete: Vec<String>,
}

impl HeaderOps {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.add.is_empty() && self.delete.is_empty()
    }
}

/// Matching rules for a route
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Matcher {
    #[serde(default)]
    pub protocol: String,

    #[serde(default)]
    pub methods: Vec<String>,

    #[serde(default)]
    pub hosts: Vec<String>,

    /// Literal paths, or `~name: pattern` for a regular expression
    #[serde(default)]
    pub paths: Vec<String>,

    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
}

/// URI manipulations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Uri {
    #[serde(default)]
    pub strip_prefix: String,

    #[serde(default)]
    pub strip_suffix: String,

    /// New path, where the first `$` stands for the original request path
    #[serde(default)]
    pub target_path: String,

    /// Legacy form of `target_path`, equivalent to `add_prefix + "$"`
    #[serde(default)]
    pub add_prefix: String,
}

impl Uri {
    pub fn is_empty(&self) -> bool {
        self.strip_prefix.is_empty()
            && self.strip_suffix.is_empty()
            && self.target_path.is_empty()
            && self.add_prefix.is_empty()
    }
}

/// A response written without contacting any backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticResponse {
    #[serde(default)]
    pub status_code: u16,

    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub body: String,

    /// Close the client connection after responding
    #[serde(default)]
    pub close: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub service_name: String,

    /// Unique route name
    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub matcher: Matcher,

    #[serde(flatten)]
    pub uri: Uri,

    /// When set, everything proxy related is ignored
    #[serde(default)]
    pub response: Option<StaticResponse>,

    /// Routes are matched from highest priority to lowest
    #[serde(default)]
    pub priority: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plugin {
    #[serde(default)]
    pub disabled: bool,

    #[serde(default)]
    pub name: String,

    #[serde(default, rename = "type")]
    pub plugin_type: String,

    /// Type of another plugin this one must run after
    #[serde(default)]
    pub order_after: String,

    /// Opaque handler configuration, only interpreted for built-in types
    #[serde(default)]
    pub config: Map<String, Value>,

    #[serde(default)]
    pub route_name: String,

    #[serde(default)]
    pub service_name: String,
}

impl Plugin {
    pub fn is_canary(&self) -> bool {
        self.plugin_type == PLUGIN_TYPE_CANARY
    }
}
