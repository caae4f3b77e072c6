//! Top-level match sets of a route

use crate::handler::{MatchSet, PathRegexp, RequestMatcher};
use config::Matcher;
use once_cell::sync::Lazy;
use regex::Regex;

/// `~name: pattern` or `~: pattern`
static REGEXP_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"~(\w+)?:\s*(.+)").expect("regexp path pattern is valid"));

/// Split a path into the name and pattern of a regexp path, if it is one
pub fn parse_regexp_path(path: &str) -> Option<PathRegexp> {
    let caps = REGEXP_PATH.captures(path)?;
    Some(PathRegexp {
        name: caps.get(1).map_or("", |m| m.as_str()).to_string(),
        pattern: caps[2].to_string(),
    })
}

/// Build the match alternatives of a route.
///
/// Literal paths share one alternative; every distinct regexp path gets its
/// own. Protocol, methods, hosts and headers are repeated in each. A route
/// without paths has no match sets.
pub fn build_route_matches(matcher: &Matcher) -> Vec<MatchSet> {
    let mut paths = Vec::new();
    let mut regexps: Vec<PathRegexp> = Vec::new();

    for path in &matcher.paths {
        match parse_regexp_path(path) {
            Some(regexp) => {
                if !regexps.iter().any(|r| r.pattern == regexp.pattern) {
                    regexps.push(regexp);
                }
            }
            None => paths.push(path.clone()),
        }
    }

    let shared = RequestMatcher {
        protocol: matcher.protocol.clone(),
        methods: matcher.methods.clone(),
        hosts: matcher.hosts.clone(),
        headers: matcher.headers.clone(),
        ..Default::default()
    };

    let mut matches = Vec::with_capacity(regexps.len() + 1);
    if !paths.is_empty() {
        matches.push(MatchSet::Request(RequestMatcher {
            paths,
            ..shared.clone()
        }));
    }
    for regexp in regexps {
        matches.push(MatchSet::Request(RequestMatcher {
            path_regexp: Some(regexp),
            ..shared.clone()
        }));
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_regexp_path() {
        assert_eq!(
            parse_regexp_path("~user: ^/users/(\\d+)$"),
            Some(PathRegexp {
                name: "user".to_string(),
                pattern: "^/users/(\\d+)$".to_string(),
            })
        );
        assert_eq!(
            parse_regexp_path("~:/files/.*"),
            Some(PathRegexp {
                name: String::new(),
                pattern: "/files/.*".to_string(),
            })
        );
        assert_eq!(parse_regexp_path("/api/*"), None);
    }

    #[test]
    fn test_literal_and_regexp_paths() {
        let matcher = Matcher {
            methods: vec!["GET".to_string()],
            hosts: vec!["example.com".to_string()],
            paths: vec![
                "/api/*".to_string(),
                "~user: ^/users/(\\d+)$".to_string(),
                "/health".to_string(),
                "~other: ^/users/(\\d+)$".to_string(),
            ],
            ..Default::default()
        };

        let matches = build_route_matches(&matcher);
        assert_eq!(
            serde_json::to_value(&matches).unwrap(),
            json!([
                {"method": ["GET"], "host": ["example.com"], "path": ["/api/*", "/health"]},
                {
                    "method": ["GET"],
                    "host": ["example.com"],
                    "path_regexp": {"name": "user", "pattern": "^/users/(\\d+)$"},
                },
            ])
        );
    }

    #[test]
    fn test_no_paths_no_matches() {
        let matcher = Matcher {
            hosts: vec!["example.com".to_string()],
            ..Default::default()
        };
        assert!(build_route_matches(&matcher).is_empty());
    }

    #[test]
    fn test_protocol_and_headers() {
        let matcher = Matcher {
            protocol: "https".to_string(),
            paths: vec!["/".to_string()],
            headers: [("X-Env".to_string(), vec!["prod".to_string()])].into(),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(build_route_matches(&matcher)).unwrap(),
            json!([{"protocol": "https", "path": ["/"], "header": {"X-Env": ["prod"]}}])
        );
    }
}
