//! Build error types

use crate::duration::DurationError;
use thiserror::Error;

/// Build error type
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("service {service:?} of route {route:?} not found")]
    ServiceNotFound { service: String, route: String },

    #[error("upstream service {service:?} of plugin {plugin:?} not found")]
    UpstreamServiceNotFound { service: String, plugin: String },

    #[error("service {service:?} has no upstream")]
    NoUpstream { service: String },

    #[error("service {service:?} has no upstream.backends")]
    NoBackends { service: String },

    #[error("failed to parse upstream.{field} of service {service:?}: {source}")]
    InvalidDuration {
        service: String,
        field: &'static str,
        source: DurationError,
    },

    #[error("invalid {network} address {address:?} of service {service:?}")]
    InvalidAddress {
        service: String,
        network: &'static str,
        address: String,
    },

    #[error("invalid TCP address {address:?} of service {service:?}: port ranges cannot be dialed")]
    PortRange { service: String, address: String },

    #[error("unsupported UDP address {address:?} of service {service:?}")]
    UnsupportedUdp { service: String, address: String },

    #[error("invalid olaf handler: {0}")]
    InvalidHandler(String),

    #[error("failed to encode compiled routes: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Plugin(#[from] plugin::PluginError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

/// Result type alias for build operations
pub type Result<T> = std::result::Result<T, BuildError>;
