//! Plugin error types

use thiserror::Error;

/// Plugin error type
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin type {order_after:?} (depended by plugin {plugin:?}) not found")]
    DependencyNotFound { plugin: String, order_after: String },

    #[error("circular order dependency is detected for plugin {plugin:?} (of type {plugin_type:?})")]
    CircularDependency { plugin: String, plugin_type: String },

    #[error("plugin {plugin:?} (of type {plugin_type:?}) is unordered")]
    Unordered { plugin: String, plugin_type: String },

    #[error("config of plugin {plugin:?} cannot be decoded into a canary config: {source}")]
    InvalidCanaryConfig {
        plugin: String,
        source: serde_json::Error,
    },

    #[error("invalid config of plugin {plugin:?}: `matcher` and (`key`, `type`, `whitelist`) are mutually exclusive")]
    MutuallyExclusive { plugin: String },

    #[error("invalid key {key:?} for canary plugin {plugin:?}")]
    InvalidKey { plugin: String, key: String },

    #[error("unrecognized key {key:?} for canary plugin {plugin:?}")]
    UnrecognizedKey { plugin: String, key: String },

    #[error("whitelist of canary plugin {plugin:?} is empty")]
    EmptyWhitelist { plugin: String },
}

/// Result type alias for plugin operations
pub type Result<T> = std::result::Result<T, PluginError>;
