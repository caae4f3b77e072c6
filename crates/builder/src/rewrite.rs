//! URI rewriting fragments

use crate::handler::{Handler, MatchSet, RewriteHandler, Route};
use config::Uri;

/// Placeholder for the path of the original request
pub const REQUEST_PATH: &str = "{http.request.uri.path}";

/// Effective target path template of a URI transform.
///
/// The legacy `add_prefix` is equivalent to `<add_prefix>$`.
fn target_path(uri: &Uri) -> String {
    if uri.target_path.is_empty() && !uri.add_prefix.is_empty() {
        format!("{}$", uri.add_prefix)
    } else {
        uri.target_path.clone()
    }
}

/// Build the rewrite rules for a URI transform.
///
/// The strip rule, if any, comes before the URI rule. Only the first `$` of
/// the target path is replaced by the request path. Each rule is gated by
/// `matcher` when given.
pub fn manipulate_uri(uri: &Uri, matcher: Option<&MatchSet>) -> Vec<Route> {
    let mut routes = Vec::new();
    if uri.is_empty() {
        return routes;
    }

    if !uri.strip_prefix.is_empty() || !uri.strip_suffix.is_empty() {
        let strip = RewriteHandler {
            strip_path_prefix: uri.strip_prefix.clone(),
            strip_path_suffix: uri.strip_suffix.clone(),
            ..Default::default()
        };
        routes.push(Route::new(Handler::Rewrite(strip)).with_match(matcher));
    }

    let target = target_path(uri);
    if !target.is_empty() {
        let rewrite = RewriteHandler {
            uri: target.replacen('$', REQUEST_PATH, 1),
            ..Default::default()
        };
        routes.push(Route::new(Handler::Rewrite(rewrite)).with_match(matcher));
    }

    routes
}
