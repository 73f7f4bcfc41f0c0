//! The read-only registry interface the discovery strategies depend on.

use async_trait::async_trait;

use crate::error::Result;

/// Read operations against one registry host.
///
/// `repository` is a path within the registry (`library/alpine`), and
/// `reference` is a tag or a `sha256:` digest.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Returns a short name for the registry, used in log and error messages.
    fn name(&self) -> &str;

    /// Lists every tag of `repository` in registry order.
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>>;

    /// Resolves a tag or digest to the digest of its manifest.
    ///
    /// A missing manifest is reported as an error for which
    /// [`RegistryError::is_not_found`](crate::RegistryError::is_not_found)
    /// returns true.
    async fn resolve_digest(&self, repository: &str, reference: &str) -> Result<String>;

    /// Fetches the raw manifest bytes.
    async fn fetch_manifest(&self, repository: &str, reference: &str) -> Result<Vec<u8>>;

    /// Fetches the image config blob, following an index to one platform.
    async fn fetch_config(&self, repository: &str, reference: &str) -> Result<Vec<u8>>;
}
