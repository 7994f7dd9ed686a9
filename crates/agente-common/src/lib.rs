//! # Agente Common
//!
//! Common error types and logging configuration for the Mi Agente Viajes
//! PWA shell.
//!
//! ## Features
//!
//! - Unified error type for the service-worker crates
//! - Logging configuration and setup
//! - Result extension traits

use thiserror::Error;

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};

/// Unified error type for the PWA shell.
#[derive(Error, Debug)]
pub enum AgenteError {
    /// Network-related errors (fetch rejected, timed out).
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Cache store errors.
    #[error("Cache error: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Worker lifecycle errors (bad state transition).
    #[error("Lifecycle error: {message}")]
    Lifecycle {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Control channel errors.
    #[error("Message error: {message}")]
    Message {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors.
    #[error("Config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl AgenteError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source.
    pub fn network_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
            source: None,
        }
    }

    /// Create a lifecycle error.
    pub fn lifecycle(message: impl Into<String>) -> Self {
        Self::Lifecycle {
            message: message.into(),
            source: None,
        }
    }

    /// Create a message error.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Check if this error is retryable once connectivity returns.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgenteError::Network { .. })
    }

    /// Get the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            AgenteError::Network { .. } => "network",
            AgenteError::Cache { .. } => "cache",
            AgenteError::Lifecycle { .. } => "lifecycle",
            AgenteError::Message { .. } => "message",
            AgenteError::Config { .. } => "config",
            AgenteError::NotFound(_) => "not_found",
            AgenteError::InvalidArgument(_) => "invalid_argument",
        }
    }
}

/// Result type alias for PWA shell operations.
pub type Result<T> = std::result::Result<T, AgenteError>;

/// Extension trait for Option.
pub trait OptionExt<T> {
    /// Convert None to a NotFound error.
    fn ok_or_not_found(self, resource: impl Into<String>) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, resource: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| AgenteError::NotFound(resource.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(AgenteError::network("test").category(), "network");
        assert_eq!(AgenteError::cache("test").category(), "cache");
        assert_eq!(AgenteError::NotFound("x".into()).category(), "not_found");
    }

    #[test]
    fn test_retryable() {
        assert!(AgenteError::network("test").is_retryable());
        assert!(!AgenteError::cache("test").is_retryable());
        assert!(!AgenteError::lifecycle("test").is_retryable());
    }

    #[test]
    fn test_option_ext() {
        let some: Option<i32> = Some(42);
        assert_eq!(some.ok_or_not_found("test").unwrap(), 42);

        let none: Option<i32> = None;
        assert!(matches!(
            none.ok_or_not_found("test"),
            Err(AgenteError::NotFound(_))
        ));
    }
}
