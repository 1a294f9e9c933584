//! Error types for Zabbix API operations.
//!
//! Errors are categorized so callers can tell transport trouble (worth
//! retrying) from an API rejection (fix the request) from a missing object
//! (often fine to ignore on delete).

use std::fmt;

/// Result type alias for Zabbix API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Messages the API uses when an object id does not resolve.
const NOT_FOUND_MARKERS: &[&str] = &[
    "does not exist",
    "No permissions to referred object",
    "not found",
];

/// Messages the API uses when the session or token is not accepted.
const AUTH_MARKERS: &[&str] = &[
    "Not authorised",
    "Not authorized",
    "Session terminated",
    "Incorrect user name or password",
];

/// Categories of API errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transport failure (transient, retryable).
    Network,
    /// Credentials or session rejected.
    Auth,
    /// Referenced object does not exist.
    NotFound,
    /// The API rejected the request.
    Api,
    /// The response could not be decoded.
    Format,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Auth => "Authentication failed",
            Self::NotFound => "Object not found",
            Self::Api => "Request rejected by the API",
            Self::Format => "Unexpected API response",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check that the server URL is reachable and try again",
            Self::Auth => "Check the configured user and password, or the API token",
            Self::NotFound => "The object may have been removed outside of zlink",
            Self::Api => "Check the request parameters in the error details",
            Self::Format => "The server may run an unsupported Zabbix version",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to the Zabbix API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// The API returned a JSON-RPC error object.
    #[error("{method}: {message} {data}")]
    Api {
        /// Method that was called.
        method: String,
        /// JSON-RPC error code.
        code: i64,
        /// Short error message.
        message: String,
        /// Detailed error description.
        data: String,
    },

    /// Authentication could not be established.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Invalid response from API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status,
        }
    }

    /// Get the error category for retry logic.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Http { status, .. } => match status {
                Some(401 | 403) => ErrorCategory::Auth,
                Some(code) if *code < 500 => ErrorCategory::Api,
                _ => ErrorCategory::Network,
            },
            Error::Api { message, data, .. } => {
                let text = format!("{message} {data}");
                if AUTH_MARKERS.iter().any(|m| text.contains(m)) {
                    ErrorCategory::Auth
                } else if NOT_FOUND_MARKERS.iter().any(|m| text.contains(m)) {
                    ErrorCategory::NotFound
                } else {
                    ErrorCategory::Api
                }
            }
            Error::Auth(_) => ErrorCategory::Auth,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether the API reported that the referenced object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {}", code),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(message: &str, data: &str) -> Error {
        Error::Api {
            method: "graph.delete".to_string(),
            code: -32500,
            message: message.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::NotFound.is_retryable());
        assert!(!ErrorCategory::Api.is_retryable());
        assert!(!ErrorCategory::Format.is_retryable());
        assert!(!ErrorCategory::Other.is_retryable());
    }

    #[test]
    fn test_error_category_advice() {
        assert!(!ErrorCategory::Network.advice().is_empty());
        assert!(!ErrorCategory::Auth.advice().is_empty());
        assert!(format!("{}", ErrorCategory::Network).contains("Network"));
    }

    #[test]
    fn test_http_status_categories() {
        assert_eq!(Error::http("reset", None).category(), ErrorCategory::Network);
        assert_eq!(Error::http("HTTP 502", Some(502)).category(), ErrorCategory::Network);
        assert_eq!(Error::http("HTTP 401", Some(401)).category(), ErrorCategory::Auth);
        assert_eq!(Error::http("HTTP 404", Some(404)).category(), ErrorCategory::Api);
        assert!(Error::http("HTTP 503", Some(503)).is_retryable());
    }

    #[test]
    fn test_not_found_detection() {
        let err = api(
            "Application error.",
            "No permissions to referred object or it does not exist!",
        );
        assert!(err.is_not_found());

        let err = api("Invalid params.", "Invalid parameter \"/1/name\": cannot be empty.");
        assert!(!err.is_not_found());
        assert_eq!(err.category(), ErrorCategory::Api);
    }

    #[test]
    fn test_auth_detection() {
        let err = api("Not authorised.", "Session terminated, re-login, please.");
        assert_eq!(err.category(), ErrorCategory::Auth);
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_api_error_display() {
        let err = api("Application error.", "Graph with name \"CPU\" already exists.");
        let display = err.to_string();
        assert!(display.contains("graph.delete"));
        assert!(display.contains("already exists"));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        let err: Error = json_err.into();
        assert_eq!(err.category(), ErrorCategory::Format);
    }
}
