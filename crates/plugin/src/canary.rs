//! Built-in canary plugin configuration
//!
//! A canary plugin diverts part of a route's traffic to another service.
//! The split is either an advanced matcher passed through verbatim, or a
//! boolean expression built from a shorthand key variable and a whitelist
//! template.

use crate::error::{PluginError, Result};
use config::{Plugin, Uri};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

static KEY_VAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\{(\w+)\.(.+)\}$").expect("key variable pattern is valid")
});

/// Decoded `config` of a plugin of type `canary`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CanaryConfig {
    /// Service receiving the diverted traffic
    #[serde(rename = "upstream")]
    pub upstream_service_name: String,

    /// Shorthand key variable, e.g. `{header.X-User}`
    #[serde(rename = "key")]
    pub key_name: String,

    /// Optional coercion applied to the key, e.g. `int`
    #[serde(rename = "type")]
    pub key_type: String,

    /// Expression template, `$` standing for the key
    pub whitelist: String,

    /// Advanced matcher, used verbatim
    pub matcher: Map<String, Value>,

    #[serde(flatten)]
    pub uri: Uri,
}

/// How a canary selects the requests it diverts
#[derive(Debug, Clone, PartialEq)]
pub enum TrafficSplit {
    /// Host matcher object supplied by the user
    Matcher(Map<String, Value>),
    /// Boolean expression over a request placeholder
    Expression(String),
}

impl CanaryConfig {
    /// Decode the config of a canary plugin
    pub fn from_plugin(plugin: &Plugin) -> Result<Self> {
        serde_json::from_value(Value::Object(plugin.config.clone())).map_err(|source| {
            PluginError::InvalidCanaryConfig {
                plugin: plugin.name.clone(),
                source,
            }
        })
    }

    /// Derive the condition gating the canary's routes
    pub fn traffic_split(&self, plugin: &str) -> Result<TrafficSplit> {
        if !self.matcher.is_empty() {
            if !self.key_name.is_empty() || !self.key_type.is_empty() || !self.whitelist.is_empty()
            {
                return Err(PluginError::MutuallyExclusive {
                    plugin: plugin.to_string(),
                });
            }
            return Ok(TrafficSplit::Matcher(self.matcher.clone()));
        }

        let mut key = parse_key_var(&self.key_name, plugin)?;
        if !self.key_type.is_empty() {
            key = format!("{}({})", self.key_type, key);
        }

        if self.whitelist.is_empty() {
            return Err(PluginError::EmptyWhitelist {
                plugin: plugin.to_string(),
            });
        }

        Ok(TrafficSplit::Expression(self.whitelist.replace('$', &key)))
    }
}

/// Expand a shorthand key variable into a request placeholder.
///
/// `{path.x}`, `{query.x}`, `{header.X}`, `{cookie.x}` and `{body.x}` are
/// understood.
pub fn parse_key_var(key: &str, plugin: &str) -> Result<String> {
    let caps = KEY_VAR.captures(key).ok_or_else(|| PluginError::InvalidKey {
        plugin: plugin.to_string(),
        key: key.to_string(),
    })?;
    let (location, name) = (&caps[1], &caps[2]);

    let prefix = match location {
        "path" => "http.request.uri.path",
        "query" => "http.request.uri.query",
        "header" => "http.request.header",
        "cookie" => "http.request.cookie",
        "body" => "http.request.body",
        _ => {
            return Err(PluginError::UnrecognizedKey {
                plugin: plugin.to_string(),
                key: key.to_string(),
            })
        }
    };

    Ok(format!("{{{}.{}}}", prefix, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canary(config: Value) -> Plugin {
        Plugin {
            name: "split".to_string(),
            plugin_type: config::PLUGIN_TYPE_CANARY.to_string(),
            config: config.as_object().cloned().unwrap_or_default(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_key_var() {
        assert_eq!(
            parse_key_var("{header.X-Canary}", "p").unwrap(),
            "{http.request.header.X-Canary}"
        );
        assert_eq!(
            parse_key_var("{query.uid}", "p").unwrap(),
            "{http.request.uri.query.uid}"
        );
        assert_eq!(
            parse_key_var("{path.0}", "p").unwrap(),
            "{http.request.uri.path.0}"
        );
        assert_eq!(
            parse_key_var("{cookie.sid}", "p").unwrap(),
            "{http.request.cookie.sid}"
        );
        assert_eq!(
            parse_key_var("{body.user.id}", "p").unwrap(),
            "{http.request.body.user.id}"
        );
    }

    #[test]
    fn test_parse_key_var_errors() {
        let err = parse_key_var("{foo.bar}", "split").unwrap_err();
        assert!(matches!(err, PluginError::UnrecognizedKey { .. }));
        assert!(err.to_string().contains("\"split\""));

        let err = parse_key_var("header.X-User", "split").unwrap_err();
        assert!(matches!(err, PluginError::InvalidKey { .. }));
        assert!(err.to_string().contains("\"split\""));
    }

    #[test]
    fn test_decode_config() {
        let plugin = canary(json!({
            "upstream": "web_v2",
            "key": "{header.X-User}",
            "type": "int",
            "whitelist": "$ in [1, 2]",
            "strip_prefix": "/api",
            "target_path": "/v2$",
        }));

        let config = CanaryConfig::from_plugin(&plugin).unwrap();
        assert_eq!(config.upstream_service_name, "web_v2");
        assert_eq!(config.key_type, "int");
        assert_eq!(config.uri.strip_prefix, "/api");
        assert_eq!(config.uri.target_path, "/v2$");
        assert!(config.matcher.is_empty());
    }

    #[test]
    fn test_decode_invalid_config() {
        let plugin = canary(json!({"upstream": 42}));
        let err = CanaryConfig::from_plugin(&plugin).unwrap_err();
        assert!(matches!(err, PluginError::InvalidCanaryConfig { plugin, .. } if plugin == "split"));
    }

    #[test]
    fn test_expression_split() {
        let config = CanaryConfig {
            key_name: "{header.X-User}".to_string(),
            key_type: "int".to_string(),
            whitelist: "$ == 1 || $ == 2".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.traffic_split("split").unwrap(),
            TrafficSplit::Expression(
                "int({http.request.header.X-User}) == 1 || int({http.request.header.X-User}) == 2"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_empty_whitelist() {
        let config = CanaryConfig {
            key_name: "{cookie.sid}".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.traffic_split("split"),
            Err(PluginError::EmptyWhitelist { .. })
        ));
    }

    #[test]
    fn test_matcher_split() {
        let matcher = json!({"header": {"X-Canary": ["1"]}});
        let mut config = CanaryConfig {
            matcher: matcher.as_object().cloned().unwrap(),
            ..Default::default()
        };
        assert_eq!(
            config.traffic_split("split").unwrap(),
            TrafficSplit::Matcher(matcher.as_object().cloned().unwrap())
        );

        config.whitelist = "$ > 1".to_string();
        assert!(matches!(
            config.traffic_split("split"),
            Err(PluginError::MutuallyExclusive { .. })
        ));
    }
}
