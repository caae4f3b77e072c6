//! Caddy routing configuration types
//!
//! Everything the builder emits is expressed with these types. They only
//! serialize, and empty or unset fields are left out so the output matches
//! what Caddy itself writes for the same configuration.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

fn is_zero<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

fn nanos<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_nanos() as u64)
}

fn optional_nanos<S: Serializer>(
    duration: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match duration {
        Some(duration) => nanos(duration, serializer),
        None => serializer.serialize_none(),
    }
}

/// A routing rule: all handlers run when any match set matches
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Route {
    #[serde(rename = "match", skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<MatchSet>,

    pub handle: Vec<Handler>,
}

impl Route {
    /// A rule with a single handler
    pub fn new(handler: Handler) -> Self {
        Self {
            matches: Vec::new(),
            handle: vec![handler],
        }
    }

    /// Gate the rule behind a single match set
    pub fn with_match(mut self, matcher: Option<&MatchSet>) -> Self {
        if let Some(matcher) = matcher {
            self.matches = vec![matcher.clone()];
        }
        self
    }
}

/// One alternative of a rule's `match` list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MatchSet {
    Request(RequestMatcher),
    /// Matcher object supplied verbatim by the user
    Raw(Map<String, Value>),
}

/// Conditions on the request, all of which must hold
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestMatcher {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,

    #[serde(rename = "method", skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,

    #[serde(rename = "host", skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,

    #[serde(rename = "path", skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_regexp: Option<PathRegexp>,

    #[serde(rename = "header", skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Vec<String>>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub expression: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PathRegexp {
    pub name: String,
    pub pattern: String,
}

/// An HTTP handler module
#[derive(Debug, Clone, PartialEq)]
pub enum Handler {
    Subroute(SubrouteHandler),
    StaticResponse(StaticResponseHandler),
    Rewrite(RewriteHandler),
    ReverseProxy(ReverseProxyHandler),
    /// Third-party handler: its `handler` key and config, passed through
    Plugin(Map<String, Value>),
}

impl Handler {
    /// Module name written to the `handler` key
    pub fn name(&self) -> &str {
        match self {
            Handler::Subroute(_) => "subroute",
            Handler::StaticResponse(_) => "static_response",
            Handler::Rewrite(_) => "rewrite",
            Handler::ReverseProxy(_) => "reverse_proxy",
            Handler::Plugin(config) => config
                .get("handler")
                .and_then(Value::as_str)
                .unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct Tagged<'a, T> {
    handler: &'a str,
    #[serde(flatten)]
    inner: &'a T,
}

impl Serialize for Handler {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let handler = self.name();
        match self {
            Handler::Subroute(inner) => Tagged { handler, inner }.serialize(serializer),
            Handler::StaticResponse(inner) => Tagged { handler, inner }.serialize(serializer),
            Handler::Rewrite(inner) => Tagged { handler, inner }.serialize(serializer),
            Handler::ReverseProxy(inner) => Tagged { handler, inner }.serialize(serializer),
            Handler::Plugin(config) => config.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubrouteHandler {
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StaticResponseHandler {
    #[serde(skip_serializing_if = "is_zero")]
    pub status_code: u16,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Vec<String>>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub body: String,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub close: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RewriteHandler {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub strip_path_prefix: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub strip_path_suffix: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReverseProxyHandler {
    pub upstreams: Vec<UpstreamDial>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancing: Option<LoadBalancing>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_checks: Option<HealthChecks>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Headers>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpstreamDial {
    pub dial: String,

    #[serde(skip_serializing_if = "is_zero")]
    pub max_requests: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Transport {
    pub protocol: String,

    #[serde(serialize_with = "nanos")]
    pub dial_timeout: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadBalancing {
    pub selection_policy: SelectionPolicy,

    #[serde(
        serialize_with = "optional_nanos",
        skip_serializing_if = "Option::is_none"
    )]
    pub try_duration: Option<Duration>,

    #[serde(
        serialize_with = "optional_nanos",
        skip_serializing_if = "Option::is_none"
    )]
    pub try_interval: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectionPolicy {
    pub policy: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthChecks {
    pub active: ActiveHealthCheck,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActiveHealthCheck {
    pub uri: String,

    #[serde(skip_serializing_if = "is_zero")]
    pub port: u16,

    #[serde(
        serialize_with = "optional_nanos",
        skip_serializing_if = "Option::is_none"
    )]
    pub interval: Option<Duration>,

    #[serde(
        serialize_with = "optional_nanos",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,

    #[serde(skip_serializing_if = "is_zero")]
    pub expect_status: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Headers {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<HeaderOps>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<HeaderOps>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeaderOps {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub set: BTreeMap<String, Vec<String>>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub add: BTreeMap<String, Vec<String>>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub delete: Vec<String>,
}

impl From<&config::HeaderOps> for HeaderOps {
    fn from(ops: &config::HeaderOps) -> Self {
        Self {
            set: ops.set.clone(),
            add: ops.add.clone(),
            delete: ops.delete.clone(),
        }
    }
}
