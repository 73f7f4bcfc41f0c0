//! In-memory [`Registry`] for exercising discovery without a network.
//!
//! A [`FakeRegistry`] holds an ordered tag list, the digests the tags point
//! at, and optional creation times for the image configs. Failures and rate
//! limiting can be injected per operation, and every call is recorded so
//! tests can assert on what was asked of the registry.
//!
//! # Examples
//!
//! ```rust
//! use regwatch_test::{digest, FakeRegistry, Failure, Operation};
//!
//! let registry = FakeRegistry::new("origin")
//!     .with_tag("1.0.0", digest("a"))
//!     .with_tag("latest", digest("a"))
//!     .with_failure(Operation::FetchConfig, Failure::Unavailable);
//!
//! assert_eq!(registry.digest_of("latest"), Some(digest("a").as_str()));
//! assert_eq!(registry.call_count(Operation::ListTags), 0);
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use regwatch_registry::{Registry, RegistryError, Result};
use serde_json::json;

/// A registry read, used to target injected failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `list_tags`.
    ListTags,
    /// `resolve_digest`.
    ResolveDigest,
    /// `fetch_manifest`.
    FetchManifest,
    /// `fetch_config`.
    FetchConfig,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ListTags => "list_tags",
            Self::ResolveDigest => "resolve_digest",
            Self::FetchManifest => "fetch_manifest",
            Self::FetchConfig => "fetch_config",
        };
        f.write_str(name)
    }
}

/// An error the fake registry can be told to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The repository or reference does not exist.
    NotFound,
    /// A 503 from the registry.
    Unavailable,
    /// The credentials were rejected.
    Unauthorized,
}

impl Failure {
    fn to_error(self, repository: &str, reference: &str) -> RegistryError {
        match self {
            Self::NotFound => RegistryError::NotFound {
                repository: repository.to_string(),
                reference: reference.to_string(),
            },
            Self::Unavailable => RegistryError::HttpError {
                status: 503,
                message: "service unavailable".to_string(),
            },
            Self::Unauthorized => RegistryError::AuthenticationFailed {
                message: "UNAUTHORIZED: authentication required".to_string(),
            },
        }
    }
}

/// One recorded registry call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Which read was made.
    pub operation: Operation,
    /// Repository path passed in.
    pub repository: String,
    /// Tag or digest, empty for `list_tags`.
    pub reference: String,
}

/// An in-memory registry.
#[derive(Debug)]
pub struct FakeRegistry {
    name: String,
    repository: Option<String>,
    tags: Vec<(String, String)>,
    untagged: HashSet<String>,
    created: HashMap<String, DateTime<Utc>>,
    failures: HashMap<Operation, Failure>,
    rate_limited: AtomicUsize,
    calls: Mutex<Vec<Call>>,
}

impl FakeRegistry {
    /// Creates an empty registry reporting `name` as its host.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repository: None,
            tags: Vec::new(),
            untagged: HashSet::new(),
            created: HashMap::new(),
            failures: HashMap::new(),
            rate_limited: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Serves only `repository`; any other path is reported as unknown.
    #[must_use]
    pub fn for_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    /// Appends a tag pointing at `digest`. Tags are listed in insertion
    /// order; adding an existing tag repoints it in place.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>, digest: impl Into<String>) -> Self {
        let (tag, digest) = (tag.into(), digest.into());
        match self.tags.iter_mut().find(|(name, _)| *name == tag) {
            Some(existing) => existing.1 = digest,
            None => self.tags.push((tag, digest)),
        }
        self
    }

    /// Appends several tags, each pointing at a digest derived from its name.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            let digest = crate::digest(&tag);
            self = self.with_tag(tag, digest);
        }
        self
    }

    /// Keeps a manifest that is reachable by digest but has no tag.
    #[must_use]
    pub fn with_untagged(mut self, digest: impl Into<String>) -> Self {
        self.untagged.insert(digest.into());
        self
    }

    /// Sets the creation time recorded in the config of the image `digest`.
    #[must_use]
    pub fn with_created(mut self, digest: impl Into<String>, created: DateTime<Utc>) -> Self {
        self.created.insert(digest.into(), created);
        self
    }

    /// Makes every call of `operation` fail.
    #[must_use]
    pub fn with_failure(mut self, operation: Operation, failure: Failure) -> Self {
        self.failures.insert(operation, failure);
        self
    }

    /// Makes every operation fail.
    #[must_use]
    pub fn failing(self, failure: Failure) -> Self {
        [
            Operation::ListTags,
            Operation::ResolveDigest,
            Operation::FetchManifest,
            Operation::FetchConfig,
        ]
        .into_iter()
        .fold(self, |registry, operation| registry.with_failure(operation, failure))
    }

    /// Answers the next `count` calls, of any operation, with a rate-limit error.
    #[must_use]
    pub fn rate_limited(self, count: usize) -> Self {
        self.rate_limited.store(count, Ordering::SeqCst);
        self
    }

    /// Returns every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns how many times `operation` was called.
    #[must_use]
    pub fn call_count(&self, operation: Operation) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    /// Returns the digest `tag` points at, if the tag exists.
    #[must_use]
    pub fn digest_of(&self, tag: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(name, _)| name == tag)
            .map(|(_, digest)| digest.as_str())
    }

    fn record(&self, operation: Operation, repository: &str, reference: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Call {
                operation,
                repository: repository.to_string(),
                reference: reference.to_string(),
            });

        let throttled = self
            .rate_limited
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if throttled {
            return Err(RegistryError::RateLimited {
                retry_after: Some(Duration::from_secs(1)),
                message: "TOOMANYREQUESTS: rate limit exceeded".to_string(),
            });
        }

        if let Some(failure) = self.failures.get(&operation) {
            return Err(failure.to_error(repository, reference));
        }

        match &self.repository {
            Some(served) if served != repository => Err(RegistryError::NotFound {
                repository: repository.to_string(),
                reference: reference.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn lookup(&self, repository: &str, reference: &str) -> Result<String> {
        let found = if reference.starts_with("sha256:") {
            let known = self.untagged.contains(reference)
                || self.tags.iter().any(|(_, digest)| digest == reference);
            known.then(|| reference.to_string())
        } else {
            self.digest_of(reference).map(ToString::to_string)
        };

        found.ok_or_else(|| RegistryError::NotFound {
            repository: repository.to_string(),
            reference: reference.to_string(),
        })
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        self.record(Operation::ListTags, repository, "")?;
        Ok(self.tags.iter().map(|(tag, _)| tag.clone()).collect())
    }

    async fn resolve_digest(&self, repository: &str, reference: &str) -> Result<String> {
        self.record(Operation::ResolveDigest, repository, reference)?;
        self.lookup(repository, reference)
    }

    async fn fetch_manifest(&self, repository: &str, reference: &str) -> Result<Vec<u8>> {
        self.record(Operation::FetchManifest, repository, reference)?;
        let digest = self.lookup(repository, reference)?;
        let manifest = json!({
            "schemaVersion": 2,
            "mediaType": "application/vnd.oci.image.manifest.v1+json",
            "config": {
                "mediaType": "application/vnd.oci.image.config.v1+json",
                "digest": crate::digest(&format!("config:{digest}")),
                "size": 0
            },
            "layers": []
        });
        Ok(manifest.to_string().into_bytes())
    }

    async fn fetch_config(&self, repository: &str, reference: &str) -> Result<Vec<u8>> {
        self.record(Operation::FetchConfig, repository, reference)?;
        let digest = self.lookup(repository, reference)?;
        let config = self.created.get(&digest).map_or_else(
            || json!({}),
            |created| json!({ "created": created.to_rfc3339_opts(SecondsFormat::Secs, true) }),
        );
        Ok(config.to_string().into_bytes())
    }
}
