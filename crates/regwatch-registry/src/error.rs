//! Error types for registry operations.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::oci::ErrorResponse;

/// Result type alias using [`RegistryError`].
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Distribution API error codes that mean the requested object does not exist.
const NOT_FOUND_CODES: [&str; 3] = ["MANIFEST_UNKNOWN", "NAME_UNKNOWN", "BLOB_UNKNOWN"];

/// Distribution API error code for rate limiting.
const RATE_LIMIT_CODE: &str = "TOOMANYREQUESTS";

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Failed to connect to registry.
    #[error("failed to connect to registry at {url}: {source}")]
    ConnectionFailed {
        /// Request URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// Authentication or credential exchange failed.
    #[error("authentication failed: {message}")]
    AuthenticationFailed {
        /// Error message.
        message: String,
    },

    /// The repository, manifest, or blob does not exist.
    #[error("{repository}:{reference} not found")]
    NotFound {
        /// Repository path.
        repository: String,
        /// Tag or digest.
        reference: String,
    },

    /// The registry asked the client to slow down.
    #[error("rate limited by registry: {message}")]
    RateLimited {
        /// Delay requested through `Retry-After`, if any.
        retry_after: Option<Duration>,
        /// Error message.
        message: String,
    },

    /// Unsuccessful HTTP status from the registry.
    #[error("HTTP error from registry: {status} - {message}")]
    HttpError {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// JSON decoding error.
    #[error("JSON error: {source}")]
    JsonError {
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Repository reference could not be parsed.
    #[error("invalid repository reference '{reference}': {reason}")]
    InvalidReference {
        /// Reference string.
        reference: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A configured CA certificate could not be loaded.
    #[error("invalid CA certificate: {message}")]
    InvalidCertificate {
        /// Error message.
        message: String,
    },

    /// The manifest could not be interpreted.
    #[error("invalid manifest for {repository}:{reference}: {message}")]
    InvalidManifest {
        /// Repository path.
        repository: String,
        /// Tag or digest.
        reference: String,
        /// Error message.
        message: String,
    },
}

impl RegistryError {
    /// Classifies an unsuccessful registry response.
    ///
    /// Error codes in the body take precedence over the status code, since
    /// some registries report a missing manifest with a 400 or 403.
    #[must_use]
    pub fn from_response(
        status: StatusCode,
        body: &str,
        retry_after: Option<Duration>,
        repository: &str,
        reference: &str,
    ) -> Self {
        let codes: Vec<String> = serde_json::from_str::<ErrorResponse>(body)
            .map(|response| response.errors.into_iter().map(|e| e.code).collect())
            .unwrap_or_default();
        let has_code = |wanted: &[&str]| codes.iter().any(|c| wanted.contains(&c.as_str()));

        let message = if body.is_empty() {
            status.to_string()
        } else {
            body.trim().to_string()
        };

        if status == StatusCode::TOO_MANY_REQUESTS || has_code(&[RATE_LIMIT_CODE]) {
            return Self::RateLimited {
                retry_after,
                message,
            };
        }

        if status == StatusCode::NOT_FOUND || has_code(&NOT_FOUND_CODES) {
            return Self::NotFound {
                repository: repository.to_string(),
                reference: reference.to_string(),
            };
        }

        if status == StatusCode::UNAUTHORIZED {
            return Self::AuthenticationFailed { message };
        }

        Self::HttpError {
            status: status.as_u16(),
            message,
        }
    }

    /// Returns true if the requested object does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the registry rate-limited the request.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Returns the delay the registry asked for, if any.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::HttpError {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::ConnectionFailed {
                url: err
                    .url()
                    .map_or_else(|| "unknown".to_string(), ToString::to_string),
                source: err,
            }
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError { source: err }
    }
}
