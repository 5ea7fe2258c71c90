use thiserror::Error;

/// Errors returned by the device API
///
/// Every failure is either an HTTP status reported by the controller or a
/// transport problem that never produced a status.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// The controller answered with a non-success status
    #[error("HTTP status {0}")]
    Http(u16),

    /// The request did not complete in time
    #[error("{0}")]
    Timeout(String),

    /// Connection refused, reset, DNS failure and similar
    #[error("{0}")]
    Transport(String),

    /// The controller answered with a body that could not be decoded
    #[error("Invalid response: {0}")]
    Parse(String),

    /// A request payload was rejected locally before any I/O
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The server-sent event stream ended
    #[error("Event stream closed")]
    StreamClosed,
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http(status) => Some(*status),
            _ => None,
        }
    }

    /// 401 and 403 can only be fixed by a new authorization token
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, ApiError::Http(401) | ApiError::Http(403))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout(_))
    }

    /// Identifies repeated occurrences of the same failure
    pub fn signature(&self) -> String {
        match self {
            ApiError::Http(status) => format!("http:{}", status),
            ApiError::Timeout(_) => "timeout".to_string(),
            ApiError::Transport(msg) => format!("transport:{}", msg),
            ApiError::Parse(_) => "parse".to_string(),
            ApiError::InvalidPayload(_) => "payload".to_string(),
            ApiError::StreamClosed => "stream-closed".to_string(),
        }
    }

    /// Human readable message for logs
    ///
    /// HTTP statuses get their reason phrase, transport messages are
    /// prefixed with `Error: ` unless they already mention an error, and
    /// timeouts are annotated.
    pub fn format_error(&self) -> String {
        match self {
            ApiError::Http(status) => match reason_phrase(*status) {
                Some(reason) => format!("HTTP status {} ({})", status, reason),
                None => format!("HTTP status {}", status),
            },
            ApiError::Timeout(msg) => format!("{} (Timeout)", with_error_prefix(msg)),
            ApiError::Transport(msg) => with_error_prefix(msg),
            other => other.to_string(),
        }
    }
}

fn with_error_prefix(msg: &str) -> String {
    if msg.to_ascii_lowercase().contains("error") {
        msg.to_string()
    } else {
        format!("Error: {}", msg)
    }
}

/// Reason phrases for the statuses the controller is documented to return
pub fn reason_phrase(status: u16) -> Option<&'static str> {
    match status {
        200 => Some("OK"),
        204 => Some("No Content"),
        400 => Some("Bad Request"),
        401 => Some("Unauthorized"),
        403 => Some("Forbidden"),
        404 => Some("Not Found"),
        422 => Some("Unprocessable Entity"),
        _ => None,
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return ApiError::Timeout(describe(&error));
        }
        if let Some(status) = error.status() {
            return ApiError::Http(status.as_u16());
        }
        if error.is_decode() {
            return ApiError::Parse(describe(&error));
        }
        ApiError::Transport(describe(&error))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::Parse(error.to_string())
    }
}

/// Message including the innermost cause, which carries the OS error text
fn describe(error: &reqwest::Error) -> String {
    let mut source: Option<&dyn std::error::Error> = std::error::Error::source(error);
    let mut innermost = None;
    while let Some(cause) = source {
        innermost = Some(cause.to_string());
        source = cause.source();
    }
    match innermost {
        Some(cause) => format!("{}: {}", error, cause),
        None => error.to_string(),
    }
}

/// Type alias for results that can return an ApiError
pub type Result<T> = std::result::Result<T, ApiError>;
