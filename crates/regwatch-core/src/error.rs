//! Error types for regwatch core operations.
//!
//! Everything in this module is a configuration problem: it is detected
//! before any registry is contacted.

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding or validating a check request.
#[derive(Error, Debug)]
pub enum Error {
    /// The request payload could not be decoded.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// The source configuration failed validation.
    #[error("invalid source: {0}")]
    InvalidSource(#[from] ValidationErrors),

    /// The tag regular expression does not compile.
    #[error("invalid tag_regex '{pattern}': {source}")]
    InvalidRegex {
        /// The offending pattern.
        pattern: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// The semver constraint could not be parsed.
    #[error("invalid semver_constraint '{constraint}': {reason}")]
    InvalidConstraint {
        /// The offending constraint.
        constraint: String,
        /// Reason for the parse failure.
        reason: String,
    },
}
