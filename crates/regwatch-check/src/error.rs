//! Error types for checks.

use std::fmt;

use regwatch_registry::RegistryError;
use thiserror::Error;

/// Result type alias using [`CheckError`].
pub type Result<T> = std::result::Result<T, CheckError>;

/// The step of a check.
///
/// Discovery runs `ListTags → FilterCandidates → [FetchCreationTime] → Sort →
/// LocateCursor → Emit`; single-tag tracking runs `ResolveTag → Emit`. Both
/// start with `Validate` and `Authenticate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Decoding and validating the request, building clients.
    Validate,
    /// Exchanging cloud credentials for registry credentials.
    Authenticate,
    /// Resolving the tracked tag and the cursor.
    ResolveTag,
    /// Listing the repository's tags.
    ListTags,
    /// Selecting tags and resolving their digests.
    FilterCandidates,
    /// Reading image creation times.
    FetchCreationTime,
    /// Ordering candidates.
    Sort,
    /// Finding the cursor among the candidates.
    LocateCursor,
    /// Producing the response.
    Emit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validate => "validating request",
            Self::Authenticate => "authenticating",
            Self::ResolveTag => "resolving tag",
            Self::ListTags => "listing tags",
            Self::FilterCandidates => "resolving candidates",
            Self::FetchCreationTime => "fetching creation times",
            Self::Sort => "sorting",
            Self::LocateCursor => "locating cursor",
            Self::Emit => "emitting",
        };
        f.write_str(name)
    }
}

/// Errors that end a check.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The request is malformed or its source is invalid.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] regwatch_core::Error),

    /// The repository could not be parsed.
    #[error("failed to resolve repository: {0}")]
    InvalidRepository(#[source] RegistryError),

    /// ECR credentials could not be obtained.
    #[error("cannot authenticate with ECR: {0}")]
    Authentication(#[source] RegistryError),

    /// A registry client could not be built, e.g. because of a bad CA certificate.
    #[error("failed to configure client for {host}: {source}")]
    Client {
        /// Registry host.
        host: String,
        /// Underlying error.
        #[source]
        source: RegistryError,
    },

    /// The origin registry failed.
    #[error("checking origin {host} failed ({stage}): {source}")]
    Origin {
        /// Origin registry host.
        host: String,
        /// Step that failed.
        stage: Stage,
        /// Underlying error.
        #[source]
        source: RegistryError,
    },

    /// An image config blob could not be decoded.
    #[error("invalid image config for tag '{tag}': {source}")]
    InvalidImageConfig {
        /// Tag whose config was read.
        tag: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

impl CheckError {
    /// Wraps an origin registry error with the step it happened in.
    pub fn origin(stage: Stage, host: impl Into<String>, source: RegistryError) -> Self {
        Self::Origin {
            host: host.into(),
            stage,
            source,
        }
    }

    /// Returns the step the check failed in.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::InvalidRequest(_) | Self::InvalidRepository(_) | Self::Client { .. } => {
                Stage::Validate
            }
            Self::Authentication(_) => Stage::Authenticate,
            Self::Origin { stage, .. } => *stage,
            Self::InvalidImageConfig { .. } => Stage::FetchCreationTime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_error_names_host_and_stage() {
        let err = CheckError::origin(
            Stage::ListTags,
            "registry.example.com",
            RegistryError::HttpError {
                status: 500,
                message: "boom".to_string(),
            },
        );

        assert_eq!(err.stage(), Stage::ListTags);
        assert_eq!(
            err.to_string(),
            "checking origin registry.example.com failed (listing tags): HTTP error from registry: 500 - boom"
        );
    }

    #[test]
    fn test_invalid_request_stage() {
        let err = CheckError::from(regwatch_core::Error::InvalidConstraint {
            constraint: "~>".to_string(),
            reason: "unexpected end".to_string(),
        });
        assert_eq!(err.stage(), Stage::Validate);
        assert!(err.to_string().starts_with("invalid request:"));
    }
}
