//! Dial addresses of upstream backends

use crate::error::{BuildError, Result};
use crate::handler::UpstreamDial;
use once_cell::sync::Lazy;
use regex::Regex;

const PREFIX_TCP: &str = "tcp/";
const PREFIX_UDP: &str = "udp/";
const PREFIX_UNIX: &str = "unix/";

const DEFAULT_PORT: &str = "80";

static TCP_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^:]+)?(:\d+(-\d+)?)?$").expect("TCP address pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Tcp,
    Unix,
}

/// A validated network address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetAddr {
    pub network: Network,
    /// `host:port`, or the complete `unix//path` for Unix sockets
    pub address: String,
    /// Whether the address was written with an explicit `tcp/` prefix
    pub explicit: bool,
}

impl NetAddr {
    /// Parse a `[network/]address` string, adding port 80 to TCP
    /// addresses without one
    pub fn parse(service: &str, s: &str) -> Result<Self> {
        if s.starts_with(PREFIX_UDP) {
            return Err(BuildError::UnsupportedUdp {
                service: service.to_string(),
                address: s.to_string(),
            });
        }

        if s.starts_with(PREFIX_UNIX) {
            if !s[PREFIX_UNIX.len()..].starts_with('/') {
                return Err(BuildError::InvalidAddress {
                    service: service.to_string(),
                    network: "Unix",
                    address: s.to_string(),
                });
            }
            return Ok(Self {
                network: Network::Unix,
                address: s.to_string(),
                explicit: true,
            });
        }

        let (host_port, explicit) = match s.strip_prefix(PREFIX_TCP) {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        let address = with_default_port(host_port);
        if address.is_empty() || !TCP_ADDRESS.is_match(&address) {
            return Err(BuildError::InvalidAddress {
                service: service.to_string(),
                network: "TCP",
                address: s.to_string(),
            });
        }

        Ok(Self {
            network: Network::Tcp,
            address,
            explicit,
        })
    }

    /// Address in the form given to the dialer
    pub fn dial(&self) -> String {
        match self.network {
            Network::Tcp if self.explicit => format!("{}{}", PREFIX_TCP, self.address),
            _ => self.address.clone(),
        }
    }
}

fn with_default_port(address: &str) -> String {
    if address.is_empty() || address.contains(':') {
        address.to_string()
    } else {
        format!("{}:{}", address, DEFAULT_PORT)
    }
}

/// Build the upstream entry for a backend.
///
/// A TCP address to dial must name a single port, not a range.
pub fn build_upstream(service: &str, dial: &str, max_requests: u32) -> Result<UpstreamDial> {
    let addr = NetAddr::parse(service, dial)?;

    if addr.network == Network::Tcp {
        let port = addr.address.split_once(':').map_or("", |(_, port)| port);
        if port.contains('-') {
            return Err(BuildError::PortRange {
                service: service.to_string(),
                address: dial.to_string(),
            });
        }
    }

    Ok(UpstreamDial {
        dial: addr.dial(),
        max_requests,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dial(address: &str) -> Result<String> {
        build_upstream("web", address, 0).map(|u| u.dial)
    }

    #[test]
    fn test_default_port() {
        assert_eq!(dial("10.0.0.1").unwrap(), "10.0.0.1:80");
        assert_eq!(dial("10.0.0.1:9000").unwrap(), "10.0.0.1:9000");
        assert_eq!(dial("localhost").unwrap(), "localhost:80");
        assert_eq!(dial(":8080").unwrap(), ":8080");
    }

    #[test]
    fn test_explicit_tcp_prefix_kept() {
        assert_eq!(dial("tcp/example.com").unwrap(), "tcp/example.com:80");
        assert_eq!(dial("tcp/example.com:8443").unwrap(), "tcp/example.com:8443");
    }

    #[test]
    fn test_port_range_rejected() {
        let err = dial("tcp/example.com:8080-8090").unwrap_err();
        assert!(matches!(err, BuildError::PortRange { ref address, .. } if address == "tcp/example.com:8080-8090"));
        assert!(matches!(dial("example.com:8080-8090"), Err(BuildError::PortRange { .. })));
    }

    #[test]
    fn test_unix_socket() {
        assert_eq!(dial("unix//run/app.sock").unwrap(), "unix//run/app.sock");
        assert!(matches!(
            dial("unix/run/app.sock"),
            Err(BuildError::InvalidAddress { network: "Unix", .. })
        ));
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(matches!(
            dial("udp/10.0.0.1:53"),
            Err(BuildError::UnsupportedUdp { .. })
        ));
        assert!(matches!(dial(""), Err(BuildError::InvalidAddress { .. })));
        assert!(matches!(dial("tcp/"), Err(BuildError::InvalidAddress { .. })));
        assert!(matches!(
            dial("example.com:http"),
            Err(BuildError::InvalidAddress { .. })
        ));
        assert!(matches!(
            dial("a:1:2"),
            Err(BuildError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_max_requests_kept() {
        let upstream = build_upstream("web", "10.0.0.1:9000", 64).unwrap();
        assert_eq!(upstream.max_requests, 64);
    }
}
