//! Parsing of model documents
//!
//! Two document shapes are understood:
//!
//! - the nested YAML form written by operators, where routes and plugins are
//!   declared inside the service that owns them, and
//! - the flat JSON form served by HTTP sources, where every entity kind is a
//!   map keyed by name.

use crate::error::Result;
use crate::model::{
    ActiveHealthChecks, Backend, HeaderOps, LoadBalancing, Model, Plugin, Route, Service,
    TransportHttp, Upstream,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Parse the nested YAML document into a model
pub fn parse_yaml(content: &str) -> Result<Model> {
    if content.trim().is_empty() {
        return Ok(Model::default());
    }
    let doc: Document = serde_yaml::from_str(content)?;
    doc.into_model()
}

/// Parse the flat JSON document into a model
pub fn parse_json(content: &str) -> Result<Model> {
    let doc: FlatDocument = serde_json::from_str(content)?;
    doc.into_model()
}

#[derive(Debug, Default, Deserialize)]
struct Document {
    #[serde(default)]
    version: String,

    #[serde(default)]
    services: Vec<ServiceEntry>,

    /// Global plugins
    #[serde(default)]
    plugins: Vec<Plugin>,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceEntry {
    #[serde(default)]
    name: String,

    #[serde(default)]
    upstream: Option<UpstreamEntry>,

    #[serde(default)]
    routes: Vec<RouteEntry>,

    /// Plugins applied to every route of the service
    #[serde(default)]
    plugins: Vec<Plugin>,
}

/// Upstream settings as written in the YAML document
#[derive(Debug, Default, Deserialize)]
struct UpstreamEntry {
    #[serde(default)]
    backends: Vec<String>,

    /// Applied to every backend
    #[serde(default)]
    max_requests: u32,

    #[serde(default)]
    dial_timeout: String,

    #[serde(default)]
    lb_policy: String,

    #[serde(default)]
    lb_try_duration: String,

    #[serde(default)]
    lb_try_interval: String,

    #[serde(default)]
    health_uri: String,

    #[serde(default)]
    health_port: u16,

    #[serde(default)]
    health_interval: String,

    #[serde(default)]
    health_timeout: String,

    #[serde(default)]
    health_status: u16,

    #[serde(default)]
    header_up: Option<HeaderOps>,

    #[serde(default)]
    header_down: Option<HeaderOps>,
}

impl UpstreamEntry {
    fn into_upstream(self) -> Upstream {
        let max_requests = self.max_requests;
        let backends = self
            .backends
            .into_iter()
            .map(|dial| Backend { dial, max_requests })
            .collect();

        let http = (!self.dial_timeout.is_empty()).then(|| TransportHttp {
            dial_timeout: self.dial_timeout,
        });

        let has_lb = !self.lb_policy.is_empty()
            || !self.lb_try_duration.is_empty()
            || !self.lb_try_interval.is_empty();
        let load_balancing = has_lb.then(|| LoadBalancing {
            policy: self.lb_policy,
            try_duration: self.lb_try_duration,
            interval: self.lb_try_interval,
        });

        let active_health_checks = (!self.health_uri.is_empty()).then(|| ActiveHealthChecks {
            uri: self.health_uri,
            port: self.health_port,
            interval: self.health_interval,
            timeout: self.health_timeout,
            status_code: self.health_status,
        });

        Upstream {
            backends,
            http,
            load_balancing,
            active_health_checks,
            header_up: self.header_up,
            header_down: self.header_down,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RouteEntry {
    #[serde(flatten)]
    route: Route,

    /// Plugins applied to this route only
    #[serde(default)]
    plugins: Vec<Plugin>,
}

impl Document {
    fn into_model(self) -> Result<Model> {
        let mut model = Model::new(self.version);

        for (i, entry) in self.services.into_iter().enumerate() {
            let service_name = if entry.name.is_empty() {
                format!("service_{}", i)
            } else {
                entry.name
            };

            for (j, mut route_entry) in entry.routes.into_iter().enumerate() {
                let route = &mut route_entry.route;
                if route.name.is_empty() {
                    route.name = format!("{}_route_{}", service_name, j);
                }
                route.service_name = service_name.clone();
                let route_name = route.name.clone();

                for mut plugin in chain_plugins(route_entry.plugins, |k| {
                    format!("{}_plugin_{}", route_name, k)
                }) {
                    plugin.service_name = service_name.clone();
                    plugin.route_name = route_name.clone();
                    model.add_plugin(plugin)?;
                }
                model.add_route(route_entry.route)?;
            }

            for mut plugin in chain_plugins(entry.plugins, |j| {
                format!("{}_plugin_{}", service_name, j)
            }) {
                plugin.service_name = service_name.clone();
                plugin.route_name.clear();
                model.add_plugin(plugin)?;
            }

            model.add_service(Service {
                name: service_name,
                upstream: entry.upstream.map(UpstreamEntry::into_upstream),
            })?;
        }

        for mut plugin in chain_plugins(self.plugins, |i| format!("plugin_{}", i)) {
            plugin.service_name.clear();
            plugin.route_name.clear();
            model.add_plugin(plugin)?;
        }

        debug!(
            services = model.services.len(),
            routes = model.routes.len(),
            plugins = model.plugins.len(),
            "Parsed YAML document"
        );
        Ok(model)
    }
}

/// Name unnamed plugins and order each plugin after its predecessor in the
/// same list unless it says otherwise.
fn chain_plugins<F>(plugins: Vec<Plugin>, default_name: F) -> Vec<Plugin>
where
    F: Fn(usize) -> String,
{
    let mut previous_type: Option<String> = None;
    plugins
        .into_iter()
        .enumerate()
        .map(|(k, mut plugin)| {
            if plugin.name.is_empty() {
                plugin.name = default_name(k);
            }
            if plugin.order_after.is_empty() {
                if let Some(prev) = &previous_type {
                    plugin.order_after = prev.clone();
                }
            }
            previous_type = Some(plugin.plugin_type.clone());
            plugin
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct FlatDocument {
    #[serde(default)]
    version: String,

    #[serde(default)]
    services: BTreeMap<String, Service>,

    #[serde(default)]
    routes: BTreeMap<String, Route>,

    #[serde(default)]
    plugins: BTreeMap<String, Plugin>,
}

impl FlatDocument {
    fn into_model(self) -> Result<Model> {
        let mut model = Model::new(self.version);

        for (key, mut service) in self.services {
            if service.name.is_empty() {
                service.name = key;
            }
            model.add_service(service)?;
        }
        for (key, mut route) in self.routes {
            if route.name.is_empty() {
                route.name = key;
            }
            model.add_route(route)?;
        }
        for (key, mut plugin) in self.plugins {
            if plugin.name.is_empty() {
                plugin.name = key;
            }
            model.add_plugin(plugin)?;
        }

        debug!(
            services = model.services.len(),
            routes = model.routes.len(),
            plugins = model.plugins.len(),
            "Parsed JSON document"
        );
        Ok(model)
    }
}
