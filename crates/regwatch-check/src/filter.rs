//! Semver tag selection and digest deduplication.
//!
//! Selection happens in two passes. [`TagFilter::classify`] decides from the
//! tag name alone whether a tag is a candidate, so digests are only resolved
//! for tags that can be reported. [`TagFilter::select`] then collapses tags
//! sharing a digest and orders the survivors.

use std::collections::HashMap;

use regwatch_core::{SemverPolicy, TagVersion, Version};

/// How a tag takes part in semver discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// A version-shaped tag of the tracked variant.
    Versioned(TagVersion),
    /// The bare alias: `latest`, or the variant name itself.
    BareAlias(String),
}

impl Classified {
    /// Returns the tag name.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::Versioned(version) => version.tag(),
            Self::BareAlias(tag) => tag,
        }
    }
}

/// Applies a [`SemverPolicy`] to tag names.
#[derive(Debug, Clone, Copy)]
pub struct TagFilter<'a> {
    policy: &'a SemverPolicy,
}

struct Held {
    version: TagVersion,
    digest: String,
    position: usize,
}

impl<'a> TagFilter<'a> {
    /// Creates a filter for `policy`.
    #[must_use]
    pub const fn new(policy: &'a SemverPolicy) -> Self {
        Self { policy }
    }

    /// Decides whether `tag` is a candidate.
    ///
    /// # Examples
    ///
    /// ```
    /// use regwatch_check::filter::{Classified, TagFilter};
    /// use regwatch_core::{DiscoveryPolicy, Source};
    ///
    /// let mut source = Source::new("team/app");
    /// source.variant = Some("alpine".into());
    /// let DiscoveryPolicy::Semver(policy) = source.discovery_policy().unwrap() else {
    ///     unreachable!()
    /// };
    /// let filter = TagFilter::new(&policy);
    ///
    /// assert!(matches!(filter.classify("1.2.3-alpine"), Some(Classified::Versioned(_))));
    /// assert!(matches!(filter.classify("alpine"), Some(Classified::BareAlias(_))));
    /// assert!(filter.classify("1.2.3").is_none());
    /// assert!(filter.classify("1.2.3-rc.1-alpine").is_none());
    /// ```
    #[must_use]
    pub fn classify(&self, tag: &str) -> Option<Classified> {
        // A constraint excludes the alias, so `latest` only reaches here
        // from a policy with neither a constraint nor a variant.
        if tag == self.policy.bare_alias() {
            return self
                .policy
                .constraint
                .is_none()
                .then(|| Classified::BareAlias(tag.to_string()));
        }

        let version = TagVersion::parse(tag, &self.policy.prefixes, self.policy.variant.as_deref())?;

        if version.is_pre_release() && !self.policy.pre_releases {
            return None;
        }

        if let Some(constraint) = &self.policy.constraint {
            if !constraint.matches(version.version()) {
                return None;
            }
        }

        Some(Classified::Versioned(version))
    }

    /// Collapses candidates that share a digest and orders the rest.
    ///
    /// `candidates` must be in registry order. For each digest the most
    /// fitting tag is kept: a release over a pre-release, then the tag with
    /// more components, then the first listed. Versions are ordered by
    /// precedence, with listing order breaking ties. The bare alias comes
    /// last, and only if no versioned tag shares its digest.
    ///
    /// The bare alias stands for the newest push of the variant, so it is
    /// placed after every version regardless of where it was listed.
    #[must_use]
    pub fn select(&self, candidates: Vec<(Classified, String)>) -> Vec<Version> {
        let mut held: Vec<Held> = Vec::new();
        let mut by_digest: HashMap<String, usize> = HashMap::new();
        let mut alias: Option<(String, String)> = None;

        for (position, (classified, digest)) in candidates.into_iter().enumerate() {
            let version = match classified {
                Classified::Versioned(version) => version,
                Classified::BareAlias(tag) => {
                    alias = Some((tag, digest));
                    continue;
                }
            };

            match by_digest.get(&digest) {
                Some(&index) => {
                    if version.supersedes(&held[index].version) {
                        held[index] = Held {
                            version,
                            digest,
                            position,
                        };
                    }
                }
                None => {
                    by_digest.insert(digest.clone(), held.len());
                    held.push(Held {
                        version,
                        digest,
                        position,
                    });
                }
            }
        }

        held.sort_by(|a, b| {
            a.version
                .cmp_precedence(&b.version)
                .then(a.position.cmp(&b.position))
        });

        let mut versions: Vec<Version> = held
            .into_iter()
            .map(|h| Version::new(h.version.tag(), h.digest))
            .collect();

        if let Some((tag, digest)) = alias {
            if !by_digest.contains_key(&digest) {
                versions.push(Version::new(tag, digest));
            }
        }

        versions
    }
}
