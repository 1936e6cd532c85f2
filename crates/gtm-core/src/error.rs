//! Error types for GTM reconciliation and reporting
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

use crate::engine::FailedUpdate;

/// Result type alias for GTM operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the GTM tooling
#[derive(Error, Debug)]
pub enum Error {
    /// The desired change is malformed or cannot be applied unambiguously
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Domain, property, datacenter or nickname does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration service errors
    #[error("Configuration service error: {0}")]
    ConfigService(String),

    /// Reporting service errors
    #[error("Reporting service error: {0}")]
    ReportService(String),

    /// Local configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Service-specific error
    #[error("Service error ({service}): {message}")]
    Service {
        /// Service name
        service: String,
        /// Error message
        message: String,
    },

    /// Every attempted property submission in a batch was rejected
    #[error("All {} property update(s) failed", .0.len())]
    AllUpdatesFailed(Vec<FailedUpdate>),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a configuration service error
    pub fn config_service(msg: impl Into<String>) -> Self {
        Self::ConfigService(msg.into())
    }

    /// Create a reporting service error
    pub fn report_service(msg: impl Into<String>) -> Self {
        Self::ReportService(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a service-specific error
    pub fn service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Whether the error was raised locally before any remote call
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Operator-facing message.
    ///
    /// Verbose mode surfaces the underlying error text. Otherwise only the
    /// category is reported, except for validation failures whose text is the
    /// operator's own input problem.
    pub fn user_message(&self, verbose: bool) -> String {
        if verbose {
            return self.to_string();
        }
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::NotFound(_) => "Requested object not found".to_string(),
            Self::ConfigService(_) | Self::Service { .. } | Self::Http(_) => {
                "Unable to communicate with the configuration service".to_string()
            }
            Self::ReportService(_) => "Unable to retrieve status".to_string(),
            Self::Authentication(_) => "Authentication failed".to_string(),
            Self::RateLimited(_) => "Request rate limited, try again later".to_string(),
            Self::Config(_) => "Invalid configuration".to_string(),
            Self::Json(_) => "Unable to display status results".to_string(),
            Self::AllUpdatesFailed(_) => "No property updates succeeded".to_string(),
            Self::Other(_) => "Operation failed".to_string(),
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
