//! Error kinds for shellmate operations

use std::fmt;

/// The kind of error that occurred.
///
/// Callers match on `ErrorKind` to decide what to tell the user: a missing
/// key is reported once at startup, a service failure ends the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// The requested feature or operation is not supported
    Unsupported,

    /// Invalid configuration or parameters
    ConfigInvalid,

    /// API credentials are missing or blank
    CredentialsMissing,

    // =========================================================================
    // Generation service errors
    // =========================================================================
    /// The model call failed
    InferenceFailed,

    /// The model answered without any text
    EmptyResponse,

    /// Rate limit or quota exceeded
    RateLimited,

    /// The service rejected the credentials
    AuthenticationFailed,

    /// Provider not reachable or not available
    ProviderUnavailable,

    // =========================================================================
    // IO errors
    // =========================================================================
    /// Network error
    NetworkFailed,

    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    // =========================================================================
    // Input errors
    // =========================================================================
    /// Failed to parse input or a service response
    ParseFailed,

    /// Invalid argument passed to function
    InvalidArgument,

    /// The user interrupted an interactive prompt
    Interrupted,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::CredentialsMissing => "CredentialsMissing",

            ErrorKind::InferenceFailed => "InferenceFailed",
            ErrorKind::EmptyResponse => "EmptyResponse",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::AuthenticationFailed => "AuthenticationFailed",
            ErrorKind::ProviderUnavailable => "ProviderUnavailable",

            ErrorKind::NetworkFailed => "NetworkFailed",
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",

            ErrorKind::ParseFailed => "ParseFailed",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::Interrupted => "Interrupted",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::InferenceFailed
                | ErrorKind::NetworkFailed
                | ErrorKind::RateLimited
                | ErrorKind::ProviderUnavailable
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::CredentialsMissing.to_string(), "CredentialsMissing");
        assert_eq!(ErrorKind::InferenceFailed.to_string(), "InferenceFailed");
    }

    #[test]
    fn test_is_retryable() {
        assert!(ErrorKind::NetworkFailed.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(!ErrorKind::CredentialsMissing.is_retryable());
        assert!(!ErrorKind::Interrupted.is_retryable());
    }
}
