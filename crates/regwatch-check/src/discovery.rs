//! Discovery across the full tag list of a repository.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use regex::Regex;
use regwatch_core::{CheckResponse, SemverPolicy, Version};
use regwatch_registry::oci::ImageConfig;
use regwatch_registry::Registry;
use tracing::debug;

use crate::error::{CheckError, Result, Stage};
use crate::filter::{Classified, TagFilter};

/// How many registry requests discovery keeps in flight.
pub const FETCH_CONCURRENCY: usize = 8;

/// Enumerates, filters, and orders the tags of a repository.
#[derive(Debug)]
pub struct TagDiscovery<'a, R: ?Sized> {
    registry: &'a R,
    repository: &'a str,
}

impl<'a, R: Registry + ?Sized> TagDiscovery<'a, R> {
    /// Creates a discovery run for `repository` on `registry`.
    pub const fn new(registry: &'a R, repository: &'a str) -> Self {
        Self {
            registry,
            repository,
        }
    }

    /// Reports tags matching `pattern` anywhere in the name.
    ///
    /// Matches keep the registry's listing order unless `created_at_sort`
    /// is set, in which case they are ordered by image creation time with
    /// the tag name breaking ties. Tags sharing a digest are all reported.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry fails or an image config cannot be
    /// decoded.
    pub async fn regex(
        &self,
        pattern: &Regex,
        created_at_sort: bool,
        cursor: Option<&Version>,
    ) -> Result<CheckResponse> {
        let tags = self.list_tags().await?;
        let matching: Vec<String> = tags.into_iter().filter(|tag| pattern.is_match(tag)).collect();
        debug!(
            repository = self.repository,
            pattern = %pattern,
            matching = matching.len(),
            "Filtered tags"
        );

        let mut versions: Vec<Version> = self
            .resolve_digests(matching)
            .await?
            .into_iter()
            .map(|(tag, digest)| Version::new(tag, digest))
            .collect();

        if created_at_sort {
            let created = self.fetch_creation_times(&versions).await?;
            debug!(stage = %Stage::Sort, "Ordering by creation time");
            let mut keyed: Vec<(Option<DateTime<Utc>>, Version)> =
                created.into_iter().zip(versions).collect();
            keyed.sort_by(|(a_time, a), (b_time, b)| a_time.cmp(b_time).then_with(|| a.tag.cmp(&b.tag)));
            versions = keyed.into_iter().map(|(_, version)| version).collect();
        }

        Ok(since_cursor(versions, cursor))
    }

    /// Reports version-shaped tags selected by `policy`.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry fails.
    pub async fn semver(&self, policy: &SemverPolicy, cursor: Option<&Version>) -> Result<CheckResponse> {
        let tags = self.list_tags().await?;
        let filter = TagFilter::new(policy);

        let classified: Vec<Classified> = tags.iter().filter_map(|tag| filter.classify(tag)).collect();
        debug!(
            repository = self.repository,
            listed = tags.len(),
            candidates = classified.len(),
            "Filtered tags"
        );

        let digests = self
            .resolve_digests(classified.iter().map(|c| c.tag().to_string()).collect())
            .await?;

        // Tags that vanished between listing and resolving are dropped by
        // `resolve_digests`, so pair the survivors back up by name.
        let mut classified = classified.into_iter();
        let candidates: Vec<(Classified, String)> = digests
            .into_iter()
            .filter_map(|(tag, digest)| {
                classified
                    .find(|c| c.tag() == tag)
                    .map(|c| (c, digest))
            })
            .collect();

        debug!(stage = %Stage::Sort, candidates = candidates.len(), "Deduplicating by digest");
        Ok(since_cursor(filter.select(candidates), cursor))
    }

    async fn list_tags(&self) -> Result<Vec<String>> {
        self.registry
            .list_tags(self.repository)
            .await
            .map_err(|e| CheckError::origin(Stage::ListTags, self.registry.name(), e))
    }

    /// Resolves each tag's digest, keeping order. Tags deleted since they
    /// were listed are skipped.
    async fn resolve_digests(&self, tags: Vec<String>) -> Result<Vec<(String, String)>> {
        let results: Vec<_> = stream::iter(tags)
            .map(|tag| async move {
                let digest = self.registry.resolve_digest(self.repository, &tag).await;
                (tag, digest)
            })
            .buffered(FETCH_CONCURRENCY)
            .collect()
            .await;

        let mut resolved = Vec::with_capacity(results.len());
        for (tag, digest) in results {
            match digest {
                Ok(digest) => resolved.push((tag, digest)),
                Err(e) if e.is_not_found() => {
                    debug!(repository = self.repository, tag = %tag, "Tag disappeared while resolving");
                }
                Err(e) => {
                    return Err(CheckError::origin(
                        Stage::FilterCandidates,
                        self.registry.name(),
                        e,
                    ))
                }
            }
        }
        Ok(resolved)
    }

    /// Reads the creation time of each version's image. Every fetch
    /// completes before the results are returned, in input order.
    async fn fetch_creation_times(&self, versions: &[Version]) -> Result<Vec<Option<DateTime<Utc>>>> {
        let results: Vec<_> = stream::iter(versions)
            .map(|version| async move {
                let config = self.registry.fetch_config(self.repository, &version.digest).await;
                (version, config)
            })
            .buffered(FETCH_CONCURRENCY)
            .collect()
            .await;

        results
            .into_iter()
            .map(|(version, config)| {
                let config = config.map_err(|e| {
                    CheckError::origin(Stage::FetchCreationTime, self.registry.name(), e)
                })?;
                let config: ImageConfig =
                    serde_json::from_slice(&config).map_err(|source| CheckError::InvalidImageConfig {
                        tag: version.tag.clone(),
                        source,
                    })?;
                Ok(config.created)
            })
            .collect()
    }
}

/// Returns the cursor and everything after it, or all of `versions` when
/// the cursor is absent or not among them.
///
/// # Examples
///
/// ```
/// use regwatch_check::since_cursor;
/// use regwatch_core::Version;
///
/// let versions = vec![Version::new("1", "a"), Version::new("2", "b"), Version::new("3", "c")];
///
/// let cursor = Version::new("2", "b");
/// assert_eq!(since_cursor(versions.clone(), Some(&cursor)).len(), 2);
///
/// let stale = Version::new("2", "repointed");
/// assert_eq!(since_cursor(versions, Some(&stale)).len(), 3);
/// ```
#[must_use]
pub fn since_cursor(mut versions: Vec<Version>, cursor: Option<&Version>) -> Vec<Version> {
    debug!(stage = %Stage::LocateCursor, "Locating cursor");
    match cursor.and_then(|cursor| versions.iter().position(|v| v == cursor)) {
        Some(index) => versions.split_off(index),
        None => versions,
    }
}
