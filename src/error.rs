use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Main error type for the token-ring service
#[derive(Debug)]
pub enum RingError {
    /// Configuration or CLI argument errors
    Config(String),

    /// Shared membership registry could not be read or written
    RegistryUnavailable(String),

    /// A registry entry could not be parsed as a member id
    MemberParse(String),

    /// Outbound token hand-off could not complete
    Transport(String),

    /// A token state transition was attempted from the wrong phase
    InvalidTransition(String),

    /// Audit log sink errors
    Audit(String),
}

impl fmt::Display for RingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RingError::Config(msg) => write!(f, "Configuration error: {}", msg),
            RingError::RegistryUnavailable(msg) => write!(f, "Registry unavailable: {}", msg),
            RingError::MemberParse(msg) => write!(f, "Malformed registry entry: {}", msg),
            RingError::Transport(msg) => write!(f, "Transport error: {}", msg),
            RingError::InvalidTransition(msg) => write!(f, "Invalid token transition: {}", msg),
            RingError::Audit(msg) => write!(f, "Audit log error: {}", msg),
        }
    }
}

impl std::error::Error for RingError {}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, RingError>;

impl RingError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RingError::Config(_) => StatusCode::BAD_REQUEST,
            RingError::MemberParse(_) => StatusCode::BAD_REQUEST,
            RingError::InvalidTransition(_) => StatusCode::CONFLICT,
            RingError::RegistryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RingError::Transport(_) => StatusCode::BAD_GATEWAY,
            RingError::Audit(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            RingError::Config(_) => "configuration_error",
            RingError::RegistryUnavailable(_) => "registry_unavailable",
            RingError::MemberParse(_) => "member_parse_error",
            RingError::Transport(_) => "transport_failure",
            RingError::InvalidTransition(_) => "invalid_transition",
            RingError::Audit(_) => "audit_error",
        }
    }

    /// Transient errors are retried on the next loop tick instead of surfacing
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RingError::RegistryUnavailable(_) | RingError::Transport(_) | RingError::Audit(_)
        )
    }
}

// Axum IntoResponse implementation for HTTP error responses
impl IntoResponse for RingError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let error_response = json!({
            "error": {
                "code": status_code.as_u16(),
                "message": self.to_string(),
                "type": self.error_type(),
            }
        });

        (status_code, Json(error_response)).into_response()
    }
}

// Conversions from library error types
impl From<reqwest::Error> for RingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RingError::Transport(format!("request timed out: {}", err))
        } else if err.is_connect() {
            RingError::Transport(format!("connection failed: {}", err))
        } else {
            RingError::Transport(err.to_string())
        }
    }
}

// Helper macros for common error construction patterns
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::RingError::Config($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::RingError::Config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! registry_error {
    ($msg:expr) => {
        $crate::error::RingError::RegistryUnavailable($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::RingError::RegistryUnavailable(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! transport_error {
    ($msg:expr) => {
        $crate::error::RingError::Transport($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::RingError::Transport(format!($fmt, $($arg)*))
    };
}
