//! Active M-SEARCH discovery.
//!
//! One search request is multicast, then replies are collected until the
//! window elapses:
//! 1. Replies with a wrong status line are ignored
//! 2. Replies whose `ST` is not an accepted service type are ignored
//! 3. Each location URL is reduced to host, port and friendly name
//! 4. Records are de-duplicated by host and port

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use crate::device::DiscoveredDevice;
use crate::error::{DiscoveryError, Result};
use crate::ssdp::{search_message, SearchReply, MULTICAST_ADDR, MULTICAST_PORT, SEARCH_ALL};

/// Default reply collection window
pub const DEFAULT_SEARCH_WINDOW: Duration = Duration::from_millis(5000);

/// Parameters of one active search
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// `ST` value sent in the request
    pub search_target: String,
    /// How long replies are collected
    pub window: Duration,
    /// Service types whose replies are kept; empty keeps every reply
    pub service_types: Vec<String>,
    /// Local address the search socket binds to
    pub bind_addr: SocketAddr,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            search_target: SEARCH_ALL.to_string(),
            window: DEFAULT_SEARCH_WINDOW,
            service_types: Vec::new(),
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        }
    }
}

impl SearchOptions {
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_service_types<I, S>(mut self, service_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.service_types = service_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_bind_addr(mut self, bind_addr: SocketAddr) -> Self {
        self.bind_addr = bind_addr;
        self
    }
}

/// Run one search and return the de-duplicated devices found in the window
pub fn search(options: &SearchOptions) -> Result<Vec<DiscoveredDevice>> {
    let socket = UdpSocket::bind(options.bind_addr).map_err(|e| DiscoveryError::Bind {
        addr: options.bind_addr,
        reason: e.to_string(),
    })?;
    socket
        .set_multicast_loop_v4(true)
        .map_err(|e| DiscoveryError::NetworkError(format!("Failed to set multicast loop: {}", e)))?;

    let request = search_message(&options.search_target);
    socket
        .send_to(request.as_bytes(), (MULTICAST_ADDR, MULTICAST_PORT))
        .map_err(|e| DiscoveryError::NetworkError(format!("Failed to send M-SEARCH: {}", e)))?;
    tracing::debug!("M-SEARCH sent for '{}'", options.search_target);

    let devices = collect_replies(&socket, options)?;
    tracing::debug!("M-SEARCH: {} devices found", devices.len());
    Ok(devices)
}

/// Receive replies on `socket` until the search window closes
pub(crate) fn collect_replies(socket: &UdpSocket, options: &SearchOptions) -> Result<Vec<DiscoveredDevice>> {
    let deadline = Instant::now() + options.window;
    let mut buffer = [0u8; 2048];
    let mut seen = HashSet::new();
    let mut devices = Vec::new();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        socket
            .set_read_timeout(Some(remaining))
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to set read timeout: {}", e)))?;

        match socket.recv_from(&mut buffer) {
            Ok((size, from)) => {
                let Ok(text) = std::str::from_utf8(&buffer[..size]) else {
                    continue;
                };
                if let Some(device) = accept_reply(text, from.ip(), &options.service_types) {
                    if seen.insert((device.host.clone(), device.port)) {
                        devices.push(device);
                    }
                }
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                break;
            }
            Err(e) => return Err(DiscoveryError::NetworkError(format!("Socket error: {}", e))),
        }
    }

    Ok(devices)
}

/// Parse a reply packet and keep it only for an accepted service type
pub fn accept_reply(packet: &str, source: IpAddr, service_types: &[String]) -> Option<DiscoveredDevice> {
    let reply = SearchReply::parse(packet, source)?;
    if !service_types.is_empty() && !service_types.iter().any(|st| *st == reply.search_target) {
        return None;
    }
    match DiscoveredDevice::from_reply(&reply) {
        Ok(device) => Some(device),
        Err(e) => {
            tracing::debug!("Ignoring reply from {}: {}", source, e);
            None
        }
    }
}
