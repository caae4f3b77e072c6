//! Traffic splitting rules of the canary plugin

use crate::error::{BuildError, Result};
use crate::handler::{MatchSet, RequestMatcher, Route};
use crate::proxy::reverse_proxy;
use crate::rewrite::manipulate_uri;
use config::{Model, Plugin};
use plugin::{CanaryConfig, TrafficSplit};
use tracing::debug;

/// Build the rules diverting matching requests to the canary's upstream
/// service: its URI rewrites followed by its reverse proxy, all gated by
/// the same condition.
pub fn canary_routes(plugin: &Plugin, model: &Model) -> Result<Vec<Route>> {
    let config = CanaryConfig::from_plugin(plugin)?;

    let service = model
        .service(&config.upstream_service_name)
        .ok_or_else(|| BuildError::UpstreamServiceNotFound {
            service: config.upstream_service_name.clone(),
            plugin: plugin.name.clone(),
        })?;

    let matcher = match config.traffic_split(&plugin.name)? {
        TrafficSplit::Matcher(raw) => MatchSet::Raw(raw),
        TrafficSplit::Expression(expression) => MatchSet::Request(RequestMatcher {
            expression,
            ..Default::default()
        }),
    };

    debug!(
        plugin = %plugin.name,
        upstream = %service.name,
        "Canary split built"
    );

    let mut routes = manipulate_uri(&config.uri, Some(&matcher));
    routes.push(reverse_proxy(service, Some(&matcher))?);
    Ok(routes)
}
