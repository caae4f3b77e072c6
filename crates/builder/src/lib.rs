//! olaf-builder: Compiles olaf models into Caddy routing configuration
//!
//! [`compile`] turns a [`config::Model`] into an ordered list of Caddy
//! routes. [`Expander`] splices those routes into a complete Caddy JSON
//! config in place of `olaf` handlers.

pub mod canary;
pub mod duration;
pub mod error;
pub mod expand;
pub mod handler;
pub mod matcher;
pub mod proxy;
pub mod rewrite;
pub mod route;
pub mod upstream;

pub use duration::{parse_duration, DurationError};
pub use error::{BuildError, Result};
pub use expand::Expander;
pub use handler::{Handler, MatchSet, Route};
pub use route::{compile, sort_routes, CompileOptions};
