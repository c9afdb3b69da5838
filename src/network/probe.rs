//! Connectivity gate
//!
//! Resolves a well-known host and opens a TCP connection to it with a
//! short timeout. Used once per start, before the player is touched.

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use crate::config::ConnectivityConfig;
use crate::error::ConnectivityError;

/// Answers whether the outside world is reachable
pub trait Reachability: Send + Sync {
    fn is_reachable(&self) -> bool;
}

/// DNS resolution followed by a bounded TCP connect
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    pub fn from_config(config: &ConnectivityConfig) -> Self {
        Self::new(
            config.host.clone(),
            config.port,
            Duration::from_millis(config.timeout_ms),
        )
    }

    /// Resolve the probe host
    pub fn resolve(&self) -> Result<SocketAddr, ConnectivityError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| ConnectivityError::Resolve {
                host: self.host.clone(),
                reason: e.to_string(),
            })?
            .next()
            .ok_or_else(|| ConnectivityError::NoAddress(self.host.clone()))
    }

    /// Open and immediately drop a TCP connection to `addr`
    pub fn connect(&self, addr: SocketAddr) -> Result<(), ConnectivityError> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ConnectivityError::ConnectFailed {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
        socket
            .connect_timeout(&SockAddr::from(addr), self.timeout)
            .map_err(|e| ConnectivityError::ConnectFailed {
                addr: addr.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn check(&self) -> Result<(), ConnectivityError> {
        let addr = self.resolve()?;
        self.connect(addr)
    }
}

impl Reachability for TcpProbe {
    fn is_reachable(&self) -> bool {
        match self.check() {
            Ok(()) => {
                tracing::debug!("{}:{} is reachable", self.host, self.port);
                true
            }
            Err(e) => {
                tracing::warn!("Connectivity check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_probe_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = TcpProbe::new("127.0.0.1", port, Duration::from_secs(2));
        assert!(probe.is_reachable());
    }

    #[test]
    fn test_probe_closed_port() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let probe = TcpProbe::new("127.0.0.1", port, Duration::from_millis(500));
        assert!(matches!(probe.check(), Err(ConnectivityError::ConnectFailed { .. })));
        assert!(!probe.is_reachable());
    }

    #[test]
    fn test_probe_unresolvable_host() {
        let probe = TcpProbe::new("name.invalid", 80, Duration::from_millis(500));
        assert!(probe.resolve().is_err());
    }
}
