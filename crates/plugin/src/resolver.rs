//! Plugin resolution for a route
//!
//! Enabled plugins are partitioned once into four scope buckets. Resolving a
//! route walks the buckets from the most specific scope to the global one,
//! keeps the first plugin seen for each type, and orders the result.

use crate::error::Result;
use crate::order::{order_plugins, UnorderedPolicy};
use config::Plugin;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Scope a plugin was declared in, most specific first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PluginScope {
    /// Bound to both a route and its service
    RouteAndService,
    /// Bound to a route only
    Route,
    /// Bound to a service only
    Service,
    /// Applies to every route
    Global,
}

impl PluginScope {
    pub fn of(plugin: &Plugin) -> Self {
        match (plugin.route_name.is_empty(), plugin.service_name.is_empty()) {
            (false, false) => PluginScope::RouteAndService,
            (false, true) => PluginScope::Route,
            (true, false) => PluginScope::Service,
            (true, true) => PluginScope::Global,
        }
    }
}

/// Selects and orders the plugins applicable to a route
#[derive(Debug, Default)]
pub struct PluginResolver<'a> {
    route_and_service: HashMap<&'a str, Vec<&'a Plugin>>,
    route: HashMap<&'a str, Vec<&'a Plugin>>,
    service: HashMap<&'a str, Vec<&'a Plugin>>,
    global: Vec<&'a Plugin>,
    policy: UnorderedPolicy,
}

impl<'a> PluginResolver<'a> {
    /// Partition the enabled plugins by scope, keeping declaration order.
    ///
    /// Plugins bound to both a route and a service are looked up by route
    /// name alone.
    pub fn new(plugins: &'a [Plugin]) -> Self {
        let mut resolver = Self::default();

        for plugin in plugins.iter().filter(|p| !p.disabled) {
            match PluginScope::of(plugin) {
                PluginScope::RouteAndService => resolver
                    .route_and_service
                    .entry(plugin.route_name.as_str())
                    .or_default()
                    .push(plugin),
                PluginScope::Route => resolver
                    .route
                    .entry(plugin.route_name.as_str())
                    .or_default()
                    .push(plugin),
                PluginScope::Service => resolver
                    .service
                    .entry(plugin.service_name.as_str())
                    .or_default()
                    .push(plugin),
                PluginScope::Global => resolver.global.push(plugin),
            }
        }

        resolver
    }

    /// Reject plugins that are neither ordered nor depended upon
    pub fn strict(mut self, strict: bool) -> Self {
        self.policy = if strict {
            UnorderedPolicy::Reject
        } else {
            UnorderedPolicy::Append
        };
        self
    }

    /// Plugins applicable to the route, at most one per type, in
    /// precedence order
    pub fn select(&self, route_name: &str, service_name: &str) -> Vec<&'a Plugin> {
        let buckets = [
            self.route_and_service.get(route_name),
            self.route.get(route_name),
            self.service.get(service_name),
            Some(&self.global),
        ];

        let mut seen: HashSet<&str> = HashSet::new();
        let mut selected = Vec::new();

        for plugin in buckets.into_iter().flatten().flatten() {
            if seen.insert(plugin.plugin_type.as_str()) {
                selected.push(*plugin);
            } else {
                debug!(
                    route = %route_name,
                    plugin = %plugin.name,
                    plugin_type = %plugin.plugin_type,
                    "Plugin shadowed by a more specific one"
                );
            }
        }

        selected
    }

    /// Plugins to apply to the route, in execution order
    pub fn resolve(&self, route_name: &str, service_name: &str) -> Result<Vec<&'a Plugin>> {
        let selected = self.select(route_name, service_name);
        let ordered = order_plugins(selected, self.policy)?;

        debug!(
            route = %route_name,
            plugins = ?ordered.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            "Plugins resolved"
        );
        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PluginError;

    fn plugin(name: &str, plugin_type: &str, route: &str, service: &str) -> Plugin {
        Plugin {
            name: name.to_string(),
            plugin_type: plugin_type.to_string(),
            route_name: route.to_string(),
            service_name: service.to_string(),
            ..Default::default()
        }
    }

    fn names(plugins: &[&Plugin]) -> Vec<String> {
        plugins.iter().map(|p| p.name.clone()).collect()
    }

    #[test]
    fn test_scope_of() {
        assert_eq!(
            PluginScope::of(&plugin("p", "t", "r", "s")),
            PluginScope::RouteAndService
        );
        assert_eq!(PluginScope::of(&plugin("p", "t", "r", "")), PluginScope::Route);
        assert_eq!(PluginScope::of(&plugin("p", "t", "", "s")), PluginScope::Service);
        assert_eq!(PluginScope::of(&plugin("p", "t", "", "")), PluginScope::Global);
    }

    #[test]
    fn test_most_specific_plugin_wins() {
        let plugins = vec![
            plugin("global_limit", "rate_limit", "", ""),
            plugin("service_limit", "rate_limit", "", "web"),
            plugin("route_limit", "rate_limit", "api", "web"),
        ];
        let resolver = PluginResolver::new(&plugins);

        let resolved = resolver.resolve("api", "web").unwrap();
        assert_eq!(names(&resolved), vec!["route_limit"]);

        let resolved = resolver.resolve("home", "web").unwrap();
        assert_eq!(names(&resolved), vec!["service_limit"]);

        let resolved = resolver.resolve("docs", "docs").unwrap();
        assert_eq!(names(&resolved), vec!["global_limit"]);
    }

    #[test]
    fn test_route_scope_beats_service_scope() {
        let plugins = vec![
            plugin("by_service", "auth", "", "web"),
            plugin("by_route", "auth", "api", ""),
        ];
        let resolver = PluginResolver::new(&plugins);
        assert_eq!(names(&resolver.select("api", "web")), vec!["by_route"]);
    }

    #[test]
    fn test_first_declared_wins_within_scope() {
        let plugins = vec![
            plugin("first", "auth", "", ""),
            plugin("second", "auth", "", ""),
        ];
        let resolver = PluginResolver::new(&plugins);
        assert_eq!(names(&resolver.select("any", "any")), vec!["first"]);
    }

    #[test]
    fn test_disabled_plugins_ignored() {
        let mut disabled = plugin("route_auth", "auth", "api", "web");
        disabled.disabled = true;
        let plugins = vec![disabled, plugin("global_auth", "auth", "", "")];

        let resolver = PluginResolver::new(&plugins);
        assert_eq!(names(&resolver.select("api", "web")), vec!["global_auth"]);
    }

    #[test]
    fn test_route_and_service_keyed_by_route() {
        let plugins = vec![
            plugin("by_route", "auth", "api", ""),
            plugin("elsewhere", "auth", "api", "other"),
        ];
        let resolver = PluginResolver::new(&plugins);
        assert_eq!(names(&resolver.select("api", "web")), vec!["elsewhere"]);
        assert!(resolver.select("home", "other").is_empty());
    }

    #[test]
    fn test_resolve_orders_and_dedups() {
        let mut a = plugin("a", "a", "api", "web");
        a.order_after = "b".to_string();
        let mut b = plugin("b", "b", "", "web");
        b.order_after = "c".to_string();
        let c = plugin("c", "c", "", "");
        let shadowed = plugin("c_shadowed", "c", "", "");
        let plugins = vec![a, b, c, shadowed];

        let resolver = PluginResolver::new(&plugins);
        let resolved = resolver.resolve("api", "web").unwrap();
        assert_eq!(names(&resolved), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_strict_rejects_unordered() {
        let mut a = plugin("a", "a", "", "");
        a.order_after = "b".to_string();
        let plugins = vec![a, plugin("b", "b", "", ""), plugin("lone", "lone", "", "")];

        let lenient = PluginResolver::new(&plugins);
        assert_eq!(
            names(&lenient.resolve("r", "s").unwrap()),
            vec!["b", "a", "lone"]
        );

        let strict = PluginResolver::new(&plugins).strict(true);
        assert!(matches!(
            strict.resolve("r", "s"),
            Err(PluginError::Unordered { .. })
        ));
    }
}
