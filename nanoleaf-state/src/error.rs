//! Error types for nanoleaf-state

use std::fmt;

use state_store::StoreError;

/// Result type for synchronisation operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised while writing device state into the store
#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    /// The store rejected a write, usually because the state was never provisioned
    Store(StoreError),

    /// A reported value could not be represented as a state value
    InvalidValue { id: String, reason: String },
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Store(err) => write!(f, "{}", err),
            SyncError::InvalidValue { id, reason } => write!(f, "Invalid value for '{}': {}", id, reason),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        SyncError::Store(err)
    }
}
