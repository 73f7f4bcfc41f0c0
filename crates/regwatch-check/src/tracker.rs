//! Tracking the digest of one fixed tag.

use regwatch_core::{CheckResponse, Version};
use regwatch_registry::Registry;
use tracing::debug;

use crate::error::{CheckError, Result, Stage};

/// Follows a single tag of a repository.
///
/// Registries keep no tag history, so at most two versions are reported: the
/// cursor, when its manifest still exists, and the tag's current digest.
///
/// # Examples
///
/// ```rust
/// use regwatch_check::TagTracker;
/// use regwatch_test::{assert_versions, digest, FakeRegistry};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let registry = FakeRegistry::new("registry.example.com").with_tag("latest", digest("new"));
///
/// let versions = TagTracker::new(&registry, "team/app").check("latest", None).await.unwrap();
/// assert_versions(&versions, &[("latest", &digest("new"))]);
/// # });
/// ```
#[derive(Debug)]
pub struct TagTracker<'a, R: ?Sized> {
    registry: &'a R,
    repository: &'a str,
}

impl<'a, R: Registry + ?Sized> TagTracker<'a, R> {
    /// Creates a tracker for `repository` on `registry`.
    pub const fn new(registry: &'a R, repository: &'a str) -> Self {
        Self {
            registry,
            repository,
        }
    }

    /// Reports the versions of `tag` that are new since `cursor`.
    ///
    /// A tag that does not exist yields an empty response. Every returned
    /// version carries `tag`, including a cursor that was saved without one.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::Origin`] if the registry fails for any reason
    /// other than a missing manifest.
    pub async fn check(&self, tag: &str, cursor: Option<&Version>) -> Result<CheckResponse> {
        let Some(current) = self.resolve(tag).await? else {
            debug!(repository = self.repository, tag, "Tag not found");
            return Ok(Vec::new());
        };

        let Some(cursor) = cursor else {
            return Ok(vec![Version::new(tag, current)]);
        };

        if cursor.digest == current {
            return Ok(vec![Version::new(tag, current)]);
        }

        match self.resolve(&cursor.digest).await? {
            Some(_) => Ok(vec![
                Version::new(tag, cursor.digest.clone()),
                Version::new(tag, current),
            ]),
            None => {
                debug!(
                    repository = self.repository,
                    digest = %cursor.digest,
                    "Cursor digest no longer exists"
                );
                Ok(vec![Version::new(tag, current)])
            }
        }
    }

    async fn resolve(&self, reference: &str) -> Result<Option<String>> {
        match self.registry.resolve_digest(self.repository, reference).await {
            Ok(digest) => Ok(Some(digest)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(CheckError::origin(Stage::ResolveTag, self.registry.name(), e)),
        }
    }
}
