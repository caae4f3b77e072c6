//! Execution order of the plugins selected for a route
//!
//! A plugin may name the type of another plugin it must run after
//! (`order_after`). Each dependency chain is walked from the dependent plugin
//! down to a plugin with no `order_after`, then emitted dependency first.

use crate::error::{PluginError, Result};
use config::Plugin;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// How plugins that take no part in any dependency chain are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnorderedPolicy {
    /// Append them after all chains, in the order they were selected
    #[default]
    Append,
    /// Reject them with [`PluginError::Unordered`]
    Reject,
}

/// Order the selected plugins (at most one per type) by `order_after`.
///
/// `selected` is expected in precedence order; chains are emitted in the
/// order their dependent plugins appear there.
pub fn order_plugins<'a>(
    selected: Vec<&'a Plugin>,
    policy: UnorderedPolicy,
) -> Result<Vec<&'a Plugin>> {
    // A lone plugin has nothing to be ordered against.
    if selected.len() <= 1 {
        return Ok(selected);
    }

    let by_type: HashMap<&str, &'a Plugin> = selected
        .iter()
        .map(|p| (p.plugin_type.as_str(), *p))
        .collect();

    let mut processed: HashSet<&str> = HashSet::new();
    let mut ordered = Vec::with_capacity(selected.len());

    for &start in selected.iter().filter(|p| !p.order_after.is_empty()) {
        let mut pending: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&'a Plugin> = Vec::new();
        let mut plugin = start;

        loop {
            let plugin_type = plugin.plugin_type.as_str();
            if processed.contains(plugin_type) {
                if pending.contains(plugin_type) {
                    return Err(PluginError::CircularDependency {
                        plugin: plugin.name.clone(),
                        plugin_type: plugin.plugin_type.clone(),
                    });
                }
                break;
            }
            processed.insert(plugin_type);
            pending.insert(plugin_type);
            stack.push(plugin);

            if plugin.order_after.is_empty() {
                break;
            }

            plugin = by_type
                .get(plugin.order_after.as_str())
                .copied()
                .ok_or_else(|| PluginError::DependencyNotFound {
                    plugin: plugin.name.clone(),
                    order_after: plugin.order_after.clone(),
                })?;
        }

        ordered.extend(stack.into_iter().rev());
    }

    for &plugin in selected.iter().filter(|p| p.order_after.is_empty()) {
        if processed.contains(plugin.plugin_type.as_str()) {
            continue;
        }
        match policy {
            UnorderedPolicy::Reject => {
                return Err(PluginError::Unordered {
                    plugin: plugin.name.clone(),
                    plugin_type: plugin.plugin_type.clone(),
                });
            }
            UnorderedPolicy::Append => {
                debug!(plugin = %plugin.name, plugin_type = %plugin.plugin_type, "Plugin has no ordering constraint");
                ordered.push(plugin);
            }
        }
    }

    Ok(ordered)
}
