//! Check request and response documents.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::source::Source;
use crate::validation::Validate;

/// A discovered image version: a tag and the manifest digest it points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Version {
    /// Tag name; empty in cursors written by older pipelines.
    #[serde(default)]
    pub tag: String,
    /// Manifest digest, e.g. `sha256:...`.
    pub digest: String,
}

impl Version {
    /// Creates a version.
    pub fn new(tag: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            digest: digest.into(),
        }
    }
}

/// Input document for a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckRequest {
    /// Repository-selection policy.
    pub source: Source,
    /// The last version seen, if any.
    #[serde(default)]
    pub version: Option<Version>,
}

/// Output document of a check, oldest first.
pub type CheckResponse = Vec<Version>;

impl CheckRequest {
    /// Decodes a request from JSON bytes and validates its source.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is malformed, contains unknown
    /// fields, or the source fails validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use regwatch_core::CheckRequest;
    ///
    /// let request = CheckRequest::from_slice(
    ///     br#"{"source": {"repository": "alpine"}, "version": {"digest": "sha256:abc"}}"#,
    /// )
    /// .unwrap();
    /// assert_eq!(request.source.tag(), "latest");
    /// assert_eq!(request.version.unwrap().tag, "");
    /// ```
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        let request: Self = serde_json::from_slice(payload)?;
        request.source.validate()?;
        Ok(request)
    }

    /// Decodes a request from a reader and validates its source.
    ///
    /// # Errors
    ///
    /// Same as [`CheckRequest::from_slice`].
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let request: Self = serde_json::from_reader(reader)?;
        request.source.validate()?;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_request_without_version() {
        let request = CheckRequest::from_slice(br#"{"source": {"repository": "alpine"}}"#).unwrap();
        assert!(request.version.is_none());

        let request =
            CheckRequest::from_slice(br#"{"source": {"repository": "alpine"}, "version": null}"#)
                .unwrap();
        assert!(request.version.is_none());
    }

    #[test]
    fn test_request_unknown_top_level_field() {
        let err = CheckRequest::from_slice(br#"{"source": {"repository": "alpine"}, "params": {}}"#)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
    }

    #[test]
    fn test_request_invalid_source() {
        let err = CheckRequest::from_slice(br#"{"source": {"repository": ""}}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidSource(_)));
    }

    #[test]
    fn test_request_missing_digest() {
        let err = CheckRequest::from_slice(
            br#"{"source": {"repository": "alpine"}, "version": {"tag": "3.19"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
    }

    #[test]
    fn test_response_serialization() {
        let response: CheckResponse = vec![Version::new("3.19", "sha256:abc")];
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"[{"tag":"3.19","digest":"sha256:abc"}]"#
        );

        let empty: CheckResponse = Vec::new();
        assert_eq!(serde_json::to_string(&empty).unwrap(), "[]");
    }

    #[test]
    fn test_from_reader() {
        let payload: &[u8] = br#"{"source": {"repository": "alpine", "tag": 3}}"#;
        let request = CheckRequest::from_reader(payload).unwrap();
        assert_eq!(request.source.tag(), "3");
    }
}
