//! Error types for the discovery system.

use std::fmt;
use std::net::SocketAddr;

/// Error type for discovery operations.
#[derive(Debug)]
pub enum DiscoveryError {
    /// A UDP socket could not be bound, usually because the port is taken
    Bind { addr: SocketAddr, reason: String },
    /// Socket options, multicast membership or send/receive failed
    NetworkError(String),
    /// A location header without a usable `http://<host>:<port>`
    InvalidLocation(String),
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::Bind { addr, reason } => write!(f, "Failed to bind {}: {}", addr, reason),
            DiscoveryError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DiscoveryError::InvalidLocation(location) => write!(f, "Invalid location '{}'", location),
        }
    }
}

impl std::error::Error for DiscoveryError {}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let bind = DiscoveryError::Bind {
            addr: "0.0.0.0:1900".parse().unwrap(),
            reason: "Address already in use".to_string(),
        };
        assert_eq!(bind.to_string(), "Failed to bind 0.0.0.0:1900: Address already in use");
        assert_eq!(
            DiscoveryError::InvalidLocation("http://10.0.0.5/".to_string()).to_string(),
            "Invalid location 'http://10.0.0.5/'"
        );
    }
}
