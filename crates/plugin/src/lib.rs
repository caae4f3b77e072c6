//! olaf-plugin: Plugin resolution for olaf routes
//!
//! Decides which plugins apply to a route, in which order, and decodes the
//! configuration of the built-in canary plugin.

pub mod canary;
pub mod error;
pub mod order;
pub mod resolver;

pub use canary::{parse_key_var, CanaryConfig, TrafficSplit};
pub use error::{PluginError, Result};
pub use order::{order_plugins, UnorderedPolicy};
pub use resolver::{PluginResolver, PluginScope};
