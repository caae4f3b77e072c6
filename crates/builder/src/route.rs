//! Route assembly: the compile entry point
//!
//! Routes are compiled from highest priority to lowest. Each becomes one
//! top-level rule guarded by the route's matcher, whose subroute either
//! returns a static response or runs, in order:
//!
//! 1. the route's own URI rewrites
//! 2. the route's plugins (canary splits and pass-through handlers)
//! 3. the reverse proxy to the route's service

use crate::canary::canary_routes;
use crate::error::{BuildError, Result};
use crate::handler::{Handler, StaticResponseHandler, SubrouteHandler};
use crate::handler::Route as Rule;
use crate::matcher::build_route_matches;
use crate::proxy::reverse_proxy;
use crate::rewrite::manipulate_uri;
use config::{Model, Plugin, Route, Service, StaticResponse};
use plugin::PluginResolver;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

/// Compiler settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Reject plugins that have no `order_after` and nothing depends on,
    /// unless they are the only plugin of their route
    pub strict_plugin_order: bool,
}

/// Routes from highest priority to lowest, ties by name
pub fn sort_routes(routes: &[Route]) -> Vec<&Route> {
    let mut sorted: Vec<&Route> = routes.iter().collect();
    sorted.sort_by(|a, b| {
        b.priority
            .total_cmp(&a.priority)
            .then_with(|| a.name.cmp(&b.name))
    });
    sorted
}

/// Compile the model into Caddy routes.
///
/// Any invalid route, service or plugin fails the whole compilation.
pub fn compile(model: &Model, options: &CompileOptions) -> Result<Vec<Rule>> {
    let resolver = PluginResolver::new(&model.plugins).strict(options.strict_plugin_order);

    let mut rules = Vec::with_capacity(model.routes.len());
    for route in sort_routes(&model.routes) {
        let service = model
            .service(&route.service_name)
            .ok_or_else(|| BuildError::ServiceNotFound {
                service: route.service_name.clone(),
                route: route.name.clone(),
            })?;

        let subroutes = build_subroutes(route, service, model, &resolver)?;
        debug!(
            route = %route.name,
            priority = route.priority,
            subroutes = subroutes.len(),
            "Route compiled"
        );

        rules.push(Rule {
            matches: build_route_matches(&route.matcher),
            handle: vec![Handler::Subroute(SubrouteHandler { routes: subroutes })],
        });
    }

    info!(routes = rules.len(), "Compilation finished");
    Ok(rules)
}

fn build_subroutes(
    route: &Route,
    service: &Service,
    model: &Model,
    resolver: &PluginResolver<'_>,
) -> Result<Vec<Rule>> {
    if let Some(response) = &route.response {
        return Ok(vec![static_response(response)]);
    }

    let mut routes = manipulate_uri(&route.uri, None);

    for plugin in resolver.resolve(&route.name, &route.service_name)? {
        if plugin.is_canary() {
            routes.extend(canary_routes(plugin, model)?);
        } else {
            routes.push(plugin_route(plugin));
        }
    }

    // Canary proxies must come before the default one.
    routes.push(reverse_proxy(service, None)?);
    Ok(routes)
}

fn static_response(response: &StaticResponse) -> Rule {
    Rule::new(Handler::StaticResponse(StaticResponseHandler {
        status_code: response.status_code,
        headers: response.headers.clone(),
        body: response.body.clone(),
        close: response.close,
    }))
}

/// Pass a third-party plugin through with its config inlined
fn plugin_route(plugin: &Plugin) -> Rule {
    let mut handler = plugin.config.clone();
    handler.insert(
        "handler".to_string(),
        Value::String(plugin.plugin_type.clone()),
    );
    Rule::new(Handler::Plugin(handler))
}
