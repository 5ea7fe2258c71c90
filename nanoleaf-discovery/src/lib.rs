//! Nanoleaf controller discovery
//!
//! This crate finds Nanoleaf controllers on the local network with SSDP and
//! watches their presence announcements.
//!
//! # Active search
//!
//! ```no_run
//! use nanoleaf_discovery::{search, SearchOptions};
//!
//! let options = SearchOptions::default().with_service_types(["nanoleaf:nl29", "nanoleaf:nl42"]);
//! for device in search(&options).unwrap_or_default() {
//!     println!("Found {} at {}:{}", device.name, device.host, device.port);
//! }
//! ```
//!
//! # Presence notifications
//!
//! ```no_run
//! use std::net::Ipv4Addr;
//! use nanoleaf_discovery::{Availability, NotificationHub, NotificationListener};
//!
//! let hub = NotificationHub::new();
//! hub.subscribe(Availability::Alive, "nanoleaf:nl29", |n| println!("alive: {}", n.usn));
//! let _listener = NotificationListener::bind(hub.clone(), Ipv4Addr::UNSPECIFIED);
//! ```

mod error;
mod discovery;
mod listener;
pub mod device;
pub mod ssdp;

pub use device::{parse_location, DiscoveredDevice, DEFAULT_DEVICE_NAME};
pub use discovery::{accept_reply, search, SearchOptions, DEFAULT_SEARCH_WINDOW};
pub use error::{DiscoveryError, Result};
pub use listener::{NotificationHandler, NotificationHub, NotificationListener, SubscriptionId};
pub use ssdp::{Availability, Notification, SearchReply};
