//! Discovered device records and location URL parsing.

use serde::Serialize;

use crate::error::{DiscoveryError, Result};
use crate::ssdp::SearchReply;

/// Name used when a reply carries no `nl-devicename` header
pub const DEFAULT_DEVICE_NAME: &str = "Nanoleaf device";

/// A controller found by an active search
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DiscoveredDevice {
    pub host: String,
    pub port: u16,
    pub name: String,
}

impl DiscoveredDevice {
    /// Build a record from a search reply.
    ///
    /// Replies with a location that has no host part fall back to the
    /// packet source address.
    pub fn from_reply(reply: &SearchReply) -> Result<Self> {
        let (host, port) = parse_location(&reply.location)
            .ok_or_else(|| DiscoveryError::InvalidLocation(reply.location.clone()))?;
        let host = host.unwrap_or_else(|| reply.address.to_string());
        let name = reply
            .device_name
            .clone()
            .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string());

        Ok(Self { host, port, name })
    }
}

/// Extract `(host, port)` from a location such as `http://10.0.0.5:16021`.
///
/// The match is case-insensitive and may start anywhere in the string.
/// The host is optional (`http://:16021`) and limited to alphanumerics and
/// dots. At most five port digits are read.
pub fn parse_location(location: &str) -> Option<(Option<String>, u16)> {
    const SCHEME: &str = "http://";

    let lower = location.to_ascii_lowercase();
    let mut from = 0;
    while let Some(offset) = lower[from..].find(SCHEME) {
        let start = from + offset + SCHEME.len();
        if let Some(found) = match_host_port(&location[start..]) {
            return Some(found);
        }
        from = start;
    }
    None
}

fn match_host_port(rest: &str) -> Option<(Option<String>, u16)> {
    let host_len = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'.')
        .count();
    let after_host = &rest[host_len..];
    let digits = after_host.strip_prefix(':')?;
    let port_len = digits.bytes().take(5).take_while(u8::is_ascii_digit).count();
    if port_len == 0 {
        return None;
    }
    let port = digits[..port_len].parse::<u16>().ok()?;
    let host = (host_len > 0).then(|| rest[..host_len].to_string());

    Some((host, port))
}
