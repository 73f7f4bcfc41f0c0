//! Request builders and helpers for check tests.
//!
//! # Examples
//!
//! ```rust
//! use regwatch_test::{digest, RequestBuilder};
//!
//! let request = RequestBuilder::new("team/app")
//!     .semver_constraint("1.2.x")
//!     .cursor("1.2.1", digest("1.2.1"))
//!     .build();
//!
//! assert_eq!(request.source.semver_constraint.as_deref(), Some("1.2.x"));
//! assert_eq!(request.version.unwrap().tag, "1.2.1");
//! ```

use chrono::{DateTime, Utc};
use regwatch_core::{CheckRequest, RegistryMirror, Source, Version};
use regwatch_registry::oci::sha256_digest;
use serde_json::Value;

/// Returns a well-formed `sha256:` digest derived from `seed`.
///
/// Equal seeds give equal digests, so tests can name images by a short label.
#[must_use]
pub fn digest(seed: &str) -> String {
    sha256_digest(seed.as_bytes())
}

/// Parses an RFC 3339 timestamp.
///
/// # Panics
///
/// Panics if `value` is not RFC 3339.
#[must_use]
pub fn timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .unwrap_or_else(|e| panic!("bad timestamp {value}: {e}"))
        .with_timezone(&Utc)
}

/// Returns the tags of `versions`, in order.
#[must_use]
pub fn tags(versions: &[Version]) -> Vec<&str> {
    versions.iter().map(|v| v.tag.as_str()).collect()
}

/// Asserts that `versions` holds exactly `expected` `(tag, digest)` pairs, in order.
///
/// # Panics
///
/// Panics if the sequences differ.
pub fn assert_versions(versions: &[Version], expected: &[(&str, &str)]) {
    let actual: Vec<(&str, &str)> = versions
        .iter()
        .map(|v| (v.tag.as_str(), v.digest.as_str()))
        .collect();
    assert_eq!(actual, expected, "unexpected versions");
}

/// Fluent builder for [`CheckRequest`]s.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    source: Source,
    version: Option<Version>,
}

impl RequestBuilder {
    /// Starts a request for `repository` with no cursor.
    #[must_use]
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            source: Source::new(repository),
            version: None,
        }
    }

    /// Sets the fixed tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.source.tag = Some(tag.into());
        self
    }

    /// Sets the tag regex.
    #[must_use]
    pub fn tag_regex(mut self, pattern: impl Into<String>) -> Self {
        self.source.tag_regex = Some(pattern.into());
        self
    }

    /// Orders regex matches by image creation time.
    #[must_use]
    pub const fn created_at_sort(mut self) -> Self {
        self.source.created_at_sort = true;
        self
    }

    /// Sets the version constraint.
    #[must_use]
    pub fn semver_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.source.semver_constraint = Some(constraint.into());
        self
    }

    /// Sets the tracked variant.
    #[must_use]
    pub fn variant(mut self, variant: impl Into<String>) -> Self {
        self.source.variant = Some(variant.into());
        self
    }

    /// Includes pre-release tags.
    #[must_use]
    pub const fn pre_releases(mut self) -> Self {
        self.source.pre_releases = true;
        self
    }

    /// Adds extra pre-release prefixes.
    #[must_use]
    pub fn pre_release_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source
            .pre_release_prefixes
            .extend(prefixes.into_iter().map(Into::into));
        self
    }

    /// Sets static origin credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.source.username = Some(username.into());
        self.source.password = Some(password.into());
        self
    }

    /// Configures an anonymous mirror.
    #[must_use]
    pub fn mirror(mut self, host: impl Into<String>) -> Self {
        self.source.registry_mirror = Some(RegistryMirror {
            host: host.into(),
            username: None,
            password: None,
        });
        self
    }

    /// Adds a trusted CA certificate.
    #[must_use]
    pub fn ca_cert(mut self, pem: impl Into<String>) -> Self {
        self.source.ca_certs.push(pem.into());
        self
    }

    /// Sets the cursor.
    #[must_use]
    pub fn cursor(mut self, tag: impl Into<String>, digest: impl Into<String>) -> Self {
        self.version = Some(Version::new(tag, digest));
        self
    }

    /// Returns the source built so far.
    #[must_use]
    pub fn source(&self) -> Source {
        self.source.clone()
    }

    /// Builds the request.
    #[must_use]
    pub fn build(self) -> CheckRequest {
        CheckRequest {
            source: self.source,
            version: self.version,
        }
    }

    /// Builds the request as the JSON document a pipeline would send.
    #[must_use]
    pub fn to_json(self) -> Value {
        serde_json::to_value(self.build()).unwrap_or_default()
    }
}
