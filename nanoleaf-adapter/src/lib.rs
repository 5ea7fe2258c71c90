//! Nanoleaf adapter
//!
//! Keeps a [`state_store::StateStore`] in sync with one Nanoleaf controller
//! and forwards user writes back to the device.
//!
//! # Overview
//!
//! - [`Supervisor`]: owns the connection, picks polling or the event stream,
//!   watches SSDP keep-alives and reconnects after failures
//! - [`commands`]: turns unacknowledged state writes into device calls, one at a time
//! - [`config`]: operator settings and their clamped timer intervals
//! - [`logging`]: `tracing` subscriber setup for the binary
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use nanoleaf_adapter::{AdapterConfig, ConnectionState, Supervisor};
//! use nanoleaf_api::OpenApiClient;
//! use state_store::StateStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AdapterConfig::new("192.168.1.40", "my-token");
//! let timeout = config.intervals().request_timeout;
//! let client = OpenApiClient::new(&config.host, config.port, &config.auth_token, timeout)?;
//!
//! let store = StateStore::new();
//! let handle = Supervisor::new(config, Arc::new(client), store.clone())?.spawn();
//!
//! let mut state = handle.watch_state();
//! state.wait_for(|s| *s == ConnectionState::Connected).await?;
//! store.set_state("Canvas.brightness", 40u8, false)?;
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod search;
pub mod session;
pub mod supervisor;

pub use commands::{log_api_error, CommandError, CommandSerializer, DeviceCall, PendingCommand};
pub use config::{AdapterConfig, Intervals, KeepAliveStrategy};
pub use error::{AdapterError, ConfigError, Result};
pub use logging::{init_logging, init_logging_from_env, LoggingError, LoggingMode};
pub use search::{pair, search_devices};
pub use session::{ConnectFailure, ConnectionState, ErrorTracker, KeepAlive, Transition, UpdateMode};
pub use supervisor::{Supervisor, SupervisorHandle};
