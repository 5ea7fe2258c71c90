//! Passive presence notifications
//!
//! [`NotificationListener`] owns a socket joined to the SSDP multicast group
//! and a background thread that parses `NOTIFY` packets. Parsed
//! notifications are handed to a [`NotificationHub`], which forwards them to
//! the handlers registered for the matching (availability, service type) key.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::error::{DiscoveryError, Result};
use crate::ssdp::{Availability, Notification, MULTICAST_ADDR, MULTICAST_PORT};

/// How often the listener thread checks for shutdown
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Callback invoked for each matching notification
pub type NotificationHandler = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Handle returned by [`NotificationHub::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type SubscriptionKey = (Availability, String);

#[derive(Default)]
struct HubInner {
    next_id: u64,
    handlers: HashMap<SubscriptionKey, Vec<(SubscriptionId, NotificationHandler)>>,
}

/// Routes notifications to subscribers keyed by availability and service type
///
/// Cloning the hub shares the subscriber table.
#[derive(Clone, Default)]
pub struct NotificationHub {
    inner: Arc<RwLock<HubInner>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for notifications of `kind` about `service_type`
    pub fn subscribe<F>(&self, kind: Availability, service_type: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner
            .handlers
            .entry((kind, service_type.to_string()))
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler, returning whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let mut removed = false;
        inner.handlers.retain(|_, handlers| {
            let before = handlers.len();
            handlers.retain(|(handler_id, _)| *handler_id != id);
            removed |= handlers.len() != before;
            !handlers.is_empty()
        });
        removed
    }

    /// Deliver a notification, returning the number of handlers called
    ///
    /// Handlers run outside the table lock so they may (un)subscribe.
    pub fn dispatch(&self, notification: &Notification) -> usize {
        let handlers: Vec<NotificationHandler> = {
            let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
            inner
                .handlers
                .get(&(notification.kind, notification.notification_type.clone()))
                .map(|list| list.iter().map(|(_, handler)| Arc::clone(handler)).collect())
                .unwrap_or_default()
        };

        for handler in &handlers {
            handler(notification);
        }
        handlers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.handlers.values().map(Vec::len).sum()
    }
}

impl std::fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHub")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Background receiver for SSDP presence notifications
pub struct NotificationListener {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl NotificationListener {
    /// Join the SSDP multicast group on `interface` and start listening
    pub fn bind(hub: NotificationHub, interface: Ipv4Addr) -> Result<Self> {
        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, MULTICAST_PORT);
        Self::bind_to(addr, Some(interface), hub)
    }

    /// Listen on `addr`, joining the multicast group only when an interface is given
    ///
    /// The port is shared with other SSDP stacks on the host.
    pub fn bind_to(addr: SocketAddrV4, interface: Option<Ipv4Addr>, hub: NotificationHub) -> Result<Self> {
        let socket = bind_shared(addr)?;
        if let Some(interface) = interface {
            socket
                .join_multicast_v4(&MULTICAST_ADDR, &interface)
                .map_err(|e| DiscoveryError::NetworkError(format!("Failed to join multicast group: {}", e)))?;
        }
        socket
            .set_read_timeout(Some(POLL_INTERVAL))
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to set read timeout: {}", e)))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| DiscoveryError::NetworkError(e.to_string()))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("ssdp-listener".to_string())
            .spawn(move || receive_loop(socket, hub, flag))
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to spawn listener: {}", e)))?;

        tracing::debug!("SSDP listener started on {}", local_addr);
        Ok(Self {
            local_addr,
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the background thread and wait for it to exit
    pub fn close(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("SSDP listener thread panicked");
            }
            tracing::debug!("SSDP listener stopped");
        }
    }
}

impl Drop for NotificationListener {
    fn drop(&mut self) {
        self.close();
    }
}

/// Bind a UDP socket with address (and on unix, port) reuse enabled
fn bind_shared(addr: SocketAddrV4) -> Result<UdpSocket> {
    let bind_error = |e: std::io::Error| DiscoveryError::Bind {
        addr: SocketAddr::V4(addr),
        reason: e.to_string(),
    };

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(bind_error)?;
    socket.set_reuse_address(true).map_err(bind_error)?;
    #[cfg(unix)]
    socket.set_reuse_port(true).map_err(bind_error)?;
    socket.bind(&SockAddr::from(addr)).map_err(bind_error)?;

    Ok(socket.into())
}

fn receive_loop(socket: UdpSocket, hub: NotificationHub, shutdown: Arc<AtomicBool>) {
    let mut buffer = [0u8; 2048];

    while !shutdown.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buffer) {
            Ok((size, from)) => {
                let Ok(text) = std::str::from_utf8(&buffer[..size]) else {
                    continue;
                };
                if let Some(notification) = Notification::parse(text, from.ip()) {
                    tracing::trace!(
                        "SSDP notify: {} {} from {}",
                        notification.kind,
                        notification.notification_type,
                        notification.address
                    );
                    hub.dispatch(&notification);
                }
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                tracing::warn!("SSDP listener socket error: {}", e);
                break;
            }
        }
    }
}
