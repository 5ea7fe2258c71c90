//! Connection state and update-mode selection

use std::fmt;
use std::time::Duration;

use nanoleaf_api::ApiError;
use nanoleaf_state::DeviceProfile;

use crate::config::{AdapterConfig, Intervals, KeepAliveStrategy};

/// Lifecycle of the device connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

/// A change of [`ConnectionState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

/// Liveness check used alongside the event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAlive {
    /// SSDP notifications reset a watchdog
    Discovery { window: Duration },
    /// Periodic info requests whose content is ignored
    Polling { interval: Duration },
}

/// The single mechanism that keeps the store up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Polling { interval: Duration },
    EventStream { keep_alive: KeepAlive },
}

impl UpdateMode {
    /// Pick the mode for a connected device
    ///
    /// The event stream is used when the firmware is newer than the
    /// profile's minimum and the operator has not disabled it.
    pub fn select(profile: &DeviceProfile, firmware: &str, config: &AdapterConfig, intervals: &Intervals) -> Self {
        if config.disable_sse || !profile.supports_event_stream(firmware) {
            return UpdateMode::Polling {
                interval: intervals.polling,
            };
        }
        let keep_alive = match config.keep_alive {
            KeepAliveStrategy::Discovery => KeepAlive::Discovery {
                window: intervals.keep_alive_window,
            },
            KeepAliveStrategy::Polling => KeepAlive::Polling {
                interval: intervals.keep_alive_polling,
            },
        };
        UpdateMode::EventStream { keep_alive }
    }

    /// Interval of the poll timer, if this mode polls at all
    pub fn poll_interval(&self) -> Option<Duration> {
        match self {
            UpdateMode::Polling { interval } => Some(*interval),
            UpdateMode::EventStream {
                keep_alive: KeepAlive::Polling { interval },
            } => Some(*interval),
            UpdateMode::EventStream { .. } => None,
        }
    }

    /// Whether poll results are written to the store
    pub fn applies_snapshots(&self) -> bool {
        matches!(self, UpdateMode::Polling { .. })
    }

    pub fn uses_event_stream(&self) -> bool {
        matches!(self, UpdateMode::EventStream { .. })
    }

    pub fn watchdog_window(&self) -> Option<Duration> {
        match self {
            UpdateMode::EventStream {
                keep_alive: KeepAlive::Discovery { window },
            } => Some(*window),
            _ => None,
        }
    }
}

/// How a failed connect attempt is handled
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectFailure {
    /// 401/403; retrying cannot help
    PermissionDenied(u16),
    /// Any other HTTP status
    Protocol(u16),
    /// The info body could not be decoded
    InvalidDeviceInfo(String),
    /// Timeouts, refused connections, DNS problems
    Transient(ApiError),
}

impl ConnectFailure {
    pub fn classify(err: ApiError) -> Self {
        match err {
            ApiError::Http(status @ (401 | 403)) => ConnectFailure::PermissionDenied(status),
            ApiError::Http(status) => ConnectFailure::Protocol(status),
            ApiError::Parse(msg) => ConnectFailure::InvalidDeviceInfo(msg),
            other => ConnectFailure::Transient(other),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConnectFailure::Transient(_))
    }
}

/// Suppresses repeated log lines for the same connect failure
#[derive(Debug, Default)]
pub struct ErrorTracker {
    last_signature: Option<String>,
}

impl ErrorTracker {
    /// Whether a transient failure deserves an error-level log line
    ///
    /// Timeouts during automatic reconnection are expected and never reported.
    pub fn should_report(&mut self, err: &ApiError, is_reconnect: bool) -> bool {
        let signature = err.signature();
        let changed = self.last_signature.as_deref() != Some(signature.as_str());
        if changed && !(is_reconnect && err.is_timeout()) {
            self.last_signature = Some(signature);
            true
        } else {
            false
        }
    }

    /// Remember the failure that ended a session
    pub fn record(&mut self, err: &ApiError) {
        self.last_signature = Some(err.signature());
    }

    pub fn reset(&mut self) {
        self.last_signature = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nanoleaf_state::profile::{LIGHT_PANELS, SHAPES};
    use rstest::rstest;

    #[test]
    fn test_select_polling_for_old_firmware() {
        let config = AdapterConfig::new("h", "t");
        let intervals = config.intervals();

        let mode = UpdateMode::select(&SHAPES, "4.0.2", &config, &intervals);
        assert_eq!(mode, UpdateMode::Polling { interval: intervals.polling });
        assert!(mode.applies_snapshots());
        assert_eq!(mode.watchdog_window(), None);
    }

    #[test]
    fn test_select_event_stream() {
        let config = AdapterConfig::new("h", "t");
        let intervals = config.intervals();

        let mode = UpdateMode::select(&LIGHT_PANELS, "3.3.2", &config, &intervals);
        assert_eq!(mode.watchdog_window(), Some(Duration::from_secs(75)));
        assert_eq!(mode.poll_interval(), None);

        let polling_keep_alive = config.clone().with_keep_alive(KeepAliveStrategy::Polling);
        let mode = UpdateMode::select(&LIGHT_PANELS, "3.3.2", &polling_keep_alive, &intervals);
        assert_eq!(mode.poll_interval(), Some(intervals.keep_alive_polling));
        assert!(!mode.applies_snapshots());

        let disabled = config.with_sse_disabled(true);
        assert!(!UpdateMode::select(&LIGHT_PANELS, "3.3.2", &disabled, &intervals).uses_event_stream());
    }

    #[rstest]
    #[case(ApiError::Http(401), true)]
    #[case(ApiError::Http(403), true)]
    #[case(ApiError::Http(500), true)]
    #[case(ApiError::Parse("eof".into()), true)]
    #[case(ApiError::Timeout("timed out".into()), false)]
    #[case(ApiError::Transport("connection refused".into()), false)]
    fn test_classify(#[case] err: ApiError, #[case] terminal: bool) {
        assert_eq!(ConnectFailure::classify(err).is_terminal(), terminal);
    }

    #[test]
    fn test_error_tracker_suppresses_repeats() {
        let mut tracker = ErrorTracker::default();
        let refused = ApiError::Transport("connection refused".into());
        let timeout = ApiError::Timeout("timed out".into());

        assert!(tracker.should_report(&refused, false));
        assert!(!tracker.should_report(&refused, true));
        assert!(!tracker.should_report(&timeout, true));
        assert!(tracker.should_report(&timeout, false));

        tracker.reset();
        assert!(tracker.should_report(&refused, true));
    }
}
