//! Mirror-then-origin failover.

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::registry::Registry;

/// A [`Registry`] that tries a mirror before the origin on every call.
///
/// Any mirror error, including "not found", and an empty tag list from the
/// mirror are logged and answered by the origin instead. Origin results are
/// returned as they are.
#[derive(Debug)]
pub struct MirroredRegistry<O, M> {
    origin: O,
    mirror: Option<M>,
}

impl<O: Registry, M: Registry> MirroredRegistry<O, M> {
    /// Creates the failover pair; `None` sends every call to the origin.
    pub const fn new(origin: O, mirror: Option<M>) -> Self {
        Self { origin, mirror }
    }

    /// Returns the origin registry.
    pub const fn origin(&self) -> &O {
        &self.origin
    }

    /// Returns the mirror registry, if configured.
    pub const fn mirror(&self) -> Option<&M> {
        self.mirror.as_ref()
    }
}

fn warn_failover(mirror: &str, operation: &str, repository: &str, reason: &dyn std::fmt::Display) {
    warn!(
        mirror,
        operation,
        repository,
        reason = %reason,
        "Checking mirror failed, falling back to origin"
    );
}

#[async_trait]
impl<O: Registry, M: Registry> Registry for MirroredRegistry<O, M> {
    fn name(&self) -> &str {
        self.origin.name()
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        if let Some(mirror) = &self.mirror {
            match mirror.list_tags(repository).await {
                Ok(tags) if !tags.is_empty() => return Ok(tags),
                Ok(_) => warn_failover(mirror.name(), "list_tags", repository, &"no tags"),
                Err(e) => warn_failover(mirror.name(), "list_tags", repository, &e),
            }
        }
        self.origin.list_tags(repository).await
    }

    async fn resolve_digest(&self, repository: &str, reference: &str) -> Result<String> {
        if let Some(mirror) = &self.mirror {
            match mirror.resolve_digest(repository, reference).await {
                Ok(digest) => return Ok(digest),
                Err(e) => warn_failover(mirror.name(), "resolve_digest", repository, &e),
            }
        }
        self.origin.resolve_digest(repository, reference).await
    }

    async fn fetch_manifest(&self, repository: &str, reference: &str) -> Result<Vec<u8>> {
        if let Some(mirror) = &self.mirror {
            match mirror.fetch_manifest(repository, reference).await {
                Ok(manifest) => return Ok(manifest),
                Err(e) => warn_failover(mirror.name(), "fetch_manifest", repository, &e),
            }
        }
        self.origin.fetch_manifest(repository, reference).await
    }

    async fn fetch_config(&self, repository: &str, reference: &str) -> Result<Vec<u8>> {
        if let Some(mirror) = &self.mirror {
            match mirror.fetch_config(repository, reference).await {
                Ok(config) => return Ok(config),
                Err(e) => warn_failover(mirror.name(), "fetch_config", repository, &e),
            }
        }
        self.origin.fetch_config(repository, reference).await
    }
}
