use http::StatusCode;
use thiserror::Error;

/// Errors that can occur while negotiating connections and relaying requests
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Invalid profile definition '{profile}': {reason}")]
    InvalidProfileDefinition { profile: String, reason: String },

    #[error("Failed to resolve {host}: {reason}")]
    ResolutionError { host: String, reason: String },

    #[error("Failed to connect to {target}: {reason}")]
    ConnectError { target: String, reason: String },

    #[error("TLS handshake with {host} failed: {reason}")]
    HandshakeError { host: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Response timed out after {0} ms")]
    ResponseTimeout(u128),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    pub fn invalid_profile(profile: &str, reason: impl Into<String>) -> Self {
        Self::InvalidProfileDefinition { profile: profile.to_string(), reason: reason.into() }
    }

    /// Transport-class failures get exactly one more attempt on a fresh connection.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectError { .. } | Self::HandshakeError { .. } | Self::Transport(_)
        )
    }

    /// Stable label used for metrics and by callers that need a machine-readable kind
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::ProfileNotFound(_) => "profile_not_found",
            Self::InvalidProfileDefinition { .. } => "invalid_profile_definition",
            Self::ResolutionError { .. } => "resolution_error",
            Self::ConnectError { .. } => "connect_error",
            Self::HandshakeError { .. } => "handshake_error",
            Self::Transport(_) => "transport_error",
            Self::ResponseTimeout(_) => "response_timeout",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
        }
    }

    /// Status code a front end should answer with when a relay call fails
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ProfileNotFound(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::ResolutionError { .. }
            | Self::ConnectError { .. }
            | Self::HandshakeError { .. }
            | Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::ResponseTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::InvalidProfileDefinition { .. } | Self::Config(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<&RelayError> for StatusCode {
    fn from(e: &RelayError) -> StatusCode {
        e.status_code()
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_class_errors_are_retryable() {
        let connect = RelayError::ConnectError { target: "a:443".into(), reason: "refused".into() };
        let handshake = RelayError::HandshakeError { host: "a".into(), reason: "reset".into() };
        assert!(connect.is_retryable());
        assert!(handshake.is_retryable());
        assert!(RelayError::Transport("broken pipe".into()).is_retryable());
    }

    #[test]
    fn profile_and_timeout_errors_are_not_retryable() {
        assert!(!RelayError::ProfileNotFound("x".into()).is_retryable());
        assert!(!RelayError::invalid_profile("x", "empty alpn").is_retryable());
        assert!(!RelayError::ResponseTimeout(10).is_retryable());
        let resolution = RelayError::ResolutionError { host: "a".into(), reason: "nx".into() };
        assert!(!resolution.is_retryable());
    }

    #[test]
    fn status_code_mapping() {
        assert_eq!(RelayError::ProfileNotFound("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(RelayError::ResponseTimeout(1).status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            StatusCode::from(&RelayError::Transport("reset".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            RelayError::Config("bad".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
