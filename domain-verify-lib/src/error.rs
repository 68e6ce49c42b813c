//! Error handling for domain verification operations.
//!
//! This module defines a single error type that covers the ways the pipeline
//! can fail, from resolver and WHOIS trouble to unreadable config files.
//! Most of these never reach the caller of a batch: the orchestrator turns
//! them into verdicts and logs them.

use std::fmt;

/// Main error type for domain verification operations.
#[derive(Debug, Clone)]
pub enum DomainVerifyError {
    /// Invalid domain name format
    InvalidDomain { domain: String, reason: String },

    /// Network-related errors (connection refused, unreachable, etc.)
    NetworkError {
        message: String,
        source: Option<String>,
    },

    /// WHOIS query errors reported by the server or client
    WhoisError { domain: String, message: String },

    /// JSON or WHOIS response parsing errors
    ParseError {
        message: String,
        content: Option<String>,
    },

    /// Configuration errors (invalid settings, etc.)
    ConfigError { message: String },

    /// File I/O errors on the cache, checkpoint or input files
    FileError { path: String, message: String },

    /// Timeout errors when operations take too long
    Timeout {
        operation: String,
        duration: std::time::Duration,
    },

    /// Rate limiting errors when servers reject requests
    RateLimited {
        service: String,
        message: String,
        retry_after: Option<std::time::Duration>,
    },

    /// Generic internal errors that don't fit other categories
    Internal { message: String },
}

impl DomainVerifyError {
    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a new network error.
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new WHOIS error.
    pub fn whois<D: Into<String>, M: Into<String>>(domain: D, message: M) -> Self {
        Self::WhoisError {
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// Create a new rate limit error.
    pub fn rate_limited<S: Into<String>, M: Into<String>>(service: S, message: M) -> Self {
        Self::RateLimited {
            service: service.into(),
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error came back from an attempted WHOIS query.
    ///
    /// Query errors carry server or transport text the WHOIS classifier can
    /// interpret. Anything else means the lookup backend itself failed and
    /// is handed to the caller untouched.
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            Self::WhoisError { .. }
                | Self::Timeout { .. }
                | Self::NetworkError { .. }
                | Self::RateLimited { .. }
        )
    }
}

impl fmt::Display for DomainVerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDomain { domain, reason } => {
                write!(f, "Invalid domain '{}': {}", domain, reason)
            }
            Self::NetworkError { message, source } => {
                if let Some(source) = source {
                    write!(f, "Network error: {} (source: {})", message, source)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            Self::WhoisError { domain, message } => {
                write!(f, "WHOIS error for '{}': {}", domain, message)
            }
            Self::ParseError { message, content: _ } => {
                write!(f, "Parse error: {}", message)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::RateLimited {
                service,
                message,
                retry_after,
            } => {
                if let Some(retry) = retry_after {
                    write!(
                        f,
                        "Rate limited by {} (retry after {:?}): {}",
                        service, retry, message
                    )
                } else {
                    write!(f, "Rate limited by {}: {}", service, message)
                }
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for DomainVerifyError {}

impl From<serde_json::Error> for DomainVerifyError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError {
            message: format!("JSON parsing failed: {}", err),
            content: None,
        }
    }
}

impl From<toml::de::Error> for DomainVerifyError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigError {
            message: format!("Failed to parse TOML configuration: {}", err),
        }
    }
}

impl From<std::io::Error> for DomainVerifyError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_query_errors_are_classifiable() {
        assert!(DomainVerifyError::whois("a.com", "No match").is_query_error());
        assert!(DomainVerifyError::timeout("WHOIS query", Duration::from_secs(10)).is_query_error());
        assert!(DomainVerifyError::rate_limited("whois", "slow down").is_query_error());
        assert!(DomainVerifyError::network("connection reset").is_query_error());

        assert!(!DomainVerifyError::internal("boom").is_query_error());
        assert!(!DomainVerifyError::invalid_domain("", "empty").is_query_error());
        assert!(!DomainVerifyError::file_error("/tmp/x", "denied").is_query_error());
    }

    #[test]
    fn test_display_messages() {
        let err = DomainVerifyError::whois("example.com", "connection refused");
        assert_eq!(
            err.to_string(),
            "WHOIS error for 'example.com': connection refused"
        );

        let err = DomainVerifyError::network_with_source("Connection failed", "reset by peer");
        assert_eq!(
            err.to_string(),
            "Network error: Connection failed (source: reset by peer)"
        );
    }
}
