//! Reverse proxy rules for services

use crate::duration::parse_duration;
use crate::error::{BuildError, Result};
use crate::handler::{
    ActiveHealthCheck, Handler, HeaderOps, Headers, HealthChecks, LoadBalancing, MatchSet,
    ReverseProxyHandler, Route, SelectionPolicy, Transport,
};
use crate::upstream::build_upstream;
use config::Service;
use std::time::Duration;

const DEFAULT_POLICY: &str = "random";

fn duration(service: &str, field: &'static str, value: &str) -> Result<Option<Duration>> {
    if value.is_empty() {
        return Ok(None);
    }
    parse_duration(value)
        .map(Some)
        .map_err(|source| BuildError::InvalidDuration {
            service: service.to_string(),
            field,
            source,
        })
}

/// Build the reverse proxy rule for a service, gated by `matcher` when given
pub fn reverse_proxy(service: &Service, matcher: Option<&MatchSet>) -> Result<Route> {
    let name = service.name.as_str();
    let upstream = service.upstream.as_ref().ok_or_else(|| BuildError::NoUpstream {
        service: name.to_string(),
    })?;

    if upstream.backends.is_empty() {
        return Err(BuildError::NoBackends {
            service: name.to_string(),
        });
    }

    let upstreams = upstream
        .backends
        .iter()
        .map(|b| build_upstream(name, &b.dial, b.max_requests))
        .collect::<Result<Vec<_>>>()?;

    let transport = match &upstream.http {
        Some(http) => Some(Transport {
            protocol: "http".to_string(),
            dial_timeout: duration(name, "dial_timeout", &http.dial_timeout)?.unwrap_or_default(),
        }),
        None => None,
    };

    let load_balancing = match &upstream.load_balancing {
        Some(lb) => {
            let policy = if lb.policy.is_empty() {
                DEFAULT_POLICY
            } else {
                lb.policy.as_str()
            };
            Some(LoadBalancing {
                selection_policy: SelectionPolicy {
                    policy: policy.to_string(),
                },
                try_duration: duration(name, "lb_try_duration", &lb.try_duration)?,
                try_interval: duration(name, "lb_try_interval", &lb.interval)?,
            })
        }
        None => None,
    };

    let active = upstream
        .active_health_checks
        .as_ref()
        .filter(|hc| !hc.uri.is_empty());
    let health_checks = match active {
        Some(hc) => Some(HealthChecks {
            active: ActiveHealthCheck {
                uri: hc.uri.clone(),
                port: hc.port,
                interval: duration(name, "health_interval", &hc.interval)?,
                timeout: duration(name, "health_timeout", &hc.timeout)?,
                expect_status: hc.status_code,
            },
        }),
        None => None,
    };

    let header_ops = |ops: &Option<config::HeaderOps>| -> Option<HeaderOps> {
        ops.as_ref().filter(|o| !o.is_empty()).map(Into::into)
    };
    let headers = Headers {
        request: header_ops(&upstream.header_up),
        response: header_ops(&upstream.header_down),
    };

    let handler = ReverseProxyHandler {
        upstreams,
        transport,
        load_balancing,
        health_checks,
        headers: (headers != Headers::default()).then_some(headers),
    };

    Ok(Route::new(Handler::ReverseProxy(handler)).with_match(matcher))
}
