//! Version-shaped tag parsing.
//!
//! Image tags are looser than semantic versions: `1`, `1.2`, and `v1.2.3`
//! are all common, and a `-suffix` may mark either a pre-release (`-rc.1`)
//! or a variant of the image (`-alpine`), or both (`-rc.1-alpine`).
//!
//! This module turns a tag into a [`TagVersion`] with a comparable
//! [`semver::Version`] and a separate variant label.

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;
use semver::{BuildMetadata, Prerelease, Version};

/// Pre-release prefixes recognized without any configuration.
pub const DEFAULT_PRE_RELEASE_PREFIXES: [&str; 3] = ["alpha", "beta", "rc"];

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^v?([0-9]+)(?:\.([0-9]+))?(?:\.([0-9]+))?(?:-([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?(?:\+[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?$",
    )
    .expect("tag pattern is a valid regex")
});

/// The numeric core and raw suffix of a version-shaped tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTag<'a> {
    /// Major component.
    pub major: u64,
    /// Minor component (zero when absent).
    pub minor: u64,
    /// Patch component (zero when absent).
    pub patch: u64,
    /// Everything after the first `-` and before any `+build`.
    pub suffix: Option<&'a str>,
}

impl<'a> ParsedTag<'a> {
    /// Parses a tag of the form `v?MAJOR(.MINOR(.PATCH)?)?(-SUFFIX)?(+BUILD)?`.
    ///
    /// Returns `None` for anything else.
    ///
    /// # Examples
    ///
    /// ```
    /// use regwatch_core::tag::ParsedTag;
    ///
    /// let parsed = ParsedTag::parse("3.2-alpine").unwrap();
    /// assert_eq!((parsed.major, parsed.minor, parsed.patch), (3, 2, 0));
    /// assert_eq!(parsed.suffix, Some("alpine"));
    ///
    /// assert!(ParsedTag::parse("latest").is_none());
    /// ```
    #[must_use]
    pub fn parse(tag: &'a str) -> Option<Self> {
        let captures = TAG_PATTERN.captures(tag)?;
        let component = |index: usize| -> Option<u64> {
            captures
                .get(index)
                .map_or(Some(0), |m| m.as_str().parse().ok())
        };

        Some(Self {
            major: component(1)?,
            minor: component(2)?,
            patch: component(3)?,
            suffix: captures.get(4).map(|m| m.as_str()),
        })
    }
}

/// The pre-release and variant portions of a tag suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SuffixParts<'a> {
    /// Pre-release identifiers, e.g. `rc.1`.
    pub pre_release: Option<&'a str>,
    /// Variant label, e.g. `alpine`.
    pub variant: Option<&'a str>,
}

/// The set of identifiers that mark a tag suffix as a pre-release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreReleasePrefixes {
    prefixes: Vec<String>,
    extended: bool,
}

impl Default for PreReleasePrefixes {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl PreReleasePrefixes {
    /// Creates the prefix set from the defaults plus `extra`.
    ///
    /// Supplying any extra prefix also lets a pre-release carry further
    /// `-`-separated qualifiers before the variant (`rc.1-debug-alpine`).
    #[must_use]
    pub fn new(extra: &[String]) -> Self {
        let mut prefixes: Vec<String> = DEFAULT_PRE_RELEASE_PREFIXES
            .iter()
            .map(ToString::to_string)
            .collect();
        for prefix in extra {
            if !prefixes.contains(prefix) {
                prefixes.push(prefix.clone());
            }
        }

        Self {
            prefixes,
            extended: !extra.is_empty(),
        }
    }

    /// Returns the recognized prefixes.
    #[must_use]
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Returns true if `suffix` starts with a recognized pre-release identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use regwatch_core::tag::PreReleasePrefixes;
    ///
    /// let prefixes = PreReleasePrefixes::default();
    /// assert!(prefixes.is_pre_release("rc1"));
    /// assert!(prefixes.is_pre_release("beta.2-alpine"));
    /// assert!(!prefixes.is_pre_release("alpine"));
    /// ```
    #[must_use]
    pub fn is_pre_release(&self, suffix: &str) -> bool {
        let first = suffix.split('-').next().unwrap_or_default();
        let lead: &str = first
            .split(|c: char| c == '.' || c.is_ascii_digit())
            .next()
            .unwrap_or_default();
        !lead.is_empty() && self.prefixes.iter().any(|p| p == lead)
    }

    /// Splits a tag suffix into pre-release and variant parts.
    ///
    /// `variant` is the variant being tracked; it only matters for extended
    /// prefix sets, where it marks where the pre-release ends.
    #[must_use]
    pub fn split<'a>(&self, suffix: &'a str, variant: Option<&str>) -> SuffixParts<'a> {
        if !self.is_pre_release(suffix) {
            return SuffixParts {
                pre_release: None,
                variant: Some(suffix),
            };
        }

        if !self.extended {
            return match suffix.split_once('-') {
                Some((pre, rest)) => SuffixParts {
                    pre_release: Some(pre),
                    variant: Some(rest),
                },
                None => SuffixParts {
                    pre_release: Some(suffix),
                    variant: None,
                },
            };
        }

        if let Some(variant) = variant {
            if let Some(pre) = suffix
                .strip_suffix(variant)
                .and_then(|rest| rest.strip_suffix('-'))
            {
                return SuffixParts {
                    pre_release: Some(pre),
                    variant: Some(&suffix[pre.len() + 1..]),
                };
            }
        }

        SuffixParts {
            pre_release: Some(suffix),
            variant: None,
        }
    }
}

/// A tag interpreted as a semantic version plus an optional variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagVersion {
    tag: String,
    version: Version,
    variant: Option<String>,
    specificity: usize,
}

impl TagVersion {
    /// Interprets `tag` as a version of `variant` (or of the plain image when
    /// `variant` is `None`).
    ///
    /// Returns `None` when the tag is not version-shaped, its pre-release
    /// identifiers are not valid semver, or its variant differs from
    /// `variant`.
    ///
    /// # Examples
    ///
    /// ```
    /// use regwatch_core::tag::{PreReleasePrefixes, TagVersion};
    ///
    /// let prefixes = PreReleasePrefixes::default();
    ///
    /// let tag = TagVersion::parse("1.0.0-rc.1-alpine", &prefixes, Some("alpine")).unwrap();
    /// assert!(tag.is_pre_release());
    /// assert_eq!(tag.version().to_string(), "1.0.0-rc.1");
    ///
    /// assert!(TagVersion::parse("1.0.0-alpine", &prefixes, None).is_none());
    /// ```
    #[must_use]
    pub fn parse(tag: &str, prefixes: &PreReleasePrefixes, variant: Option<&str>) -> Option<Self> {
        let parsed = ParsedTag::parse(tag)?;
        let parts = parsed
            .suffix
            .map(|suffix| prefixes.split(suffix, variant))
            .unwrap_or_default();

        if parts.variant != variant {
            return None;
        }

        let pre = match parts.pre_release {
            Some(pre) => Prerelease::new(pre).ok()?,
            None => Prerelease::EMPTY,
        };

        Some(Self {
            tag: tag.to_string(),
            version: Version {
                major: parsed.major,
                minor: parsed.minor,
                patch: parsed.patch,
                pre,
                build: BuildMetadata::EMPTY,
            },
            variant: parts.variant.map(ToString::to_string),
            specificity: tag.matches('.').count(),
        })
    }

    /// Returns the original tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the comparable version (variant stripped).
    #[must_use]
    pub const fn version(&self) -> &Version {
        &self.version
    }

    /// Returns the variant label, if any.
    #[must_use]
    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }

    /// Returns true if the tag carries pre-release identifiers.
    #[must_use]
    pub fn is_pre_release(&self) -> bool {
        !self.version.pre.is_empty()
    }

    /// Returns how specific the tag is; `3.2.1` is more specific than `3.2`.
    #[must_use]
    pub const fn specificity(&self) -> usize {
        self.specificity
    }

    /// Compares version precedence, ignoring the variant.
    #[must_use]
    pub fn cmp_precedence(&self, other: &Self) -> Ordering {
        self.version.cmp(&other.version)
    }

    /// Returns true if this tag should represent a digest currently held by
    /// `held`.
    ///
    /// Final releases win over pre-releases; otherwise the more specific tag
    /// wins and ties keep `held`.
    #[must_use]
    pub fn supersedes(&self, held: &Self) -> bool {
        match (held.is_pre_release(), self.is_pre_release()) {
            (false, true) => false,
            (true, false) => true,
            _ => self.specificity > held.specificity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> PreReleasePrefixes {
        PreReleasePrefixes::default()
    }

    fn extended(extra: &[&str]) -> PreReleasePrefixes {
        let extra: Vec<String> = extra.iter().map(ToString::to_string).collect();
        PreReleasePrefixes::new(&extra)
    }

    #[test]
    fn test_parse_partial_versions() {
        let one = ParsedTag::parse("1").unwrap();
        assert_eq!((one.major, one.minor, one.patch), (1, 0, 0));

        let two = ParsedTag::parse("v1.2").unwrap();
        assert_eq!((two.major, two.minor, two.patch), (1, 2, 0));

        let three = ParsedTag::parse("1.2.3+build.7").unwrap();
        assert_eq!((three.major, three.minor, three.patch), (1, 2, 3));
        assert_eq!(three.suffix, None);
    }

    #[test]
    fn test_parse_rejects_non_versions() {
        for tag in ["latest", "1.2.3.4", "1.2.", "non-semver-tag", "gray", "1..2", ""] {
            assert!(ParsedTag::parse(tag).is_none(), "{tag} should not parse");
        }
    }

    #[test]
    fn test_is_pre_release_leading_identifier() {
        let prefixes = defaults();
        assert!(prefixes.is_pre_release("alpha"));
        assert!(prefixes.is_pre_release("alpha1"));
        assert!(prefixes.is_pre_release("rc.1"));
        assert!(!prefixes.is_pre_release("foo1"));
        assert!(!prefixes.is_pre_release("build.1"));
        assert!(!prefixes.is_pre_release("1"));
        assert!(extended(&["build"]).is_pre_release("build.1"));
    }

    #[test]
    fn test_split_default_prefixes() {
        let prefixes = defaults();
        assert_eq!(
            prefixes.split("rc.1-foo", Some("foo")),
            SuffixParts {
                pre_release: Some("rc.1"),
                variant: Some("foo"),
            }
        );
        assert_eq!(
            prefixes.split("rc.1-bar-foo", Some("foo")),
            SuffixParts {
                pre_release: Some("rc.1"),
                variant: Some("bar-foo"),
            }
        );
        assert_eq!(
            prefixes.split("bar-foo", Some("foo")),
            SuffixParts {
                pre_release: None,
                variant: Some("bar-foo"),
            }
        );
    }

    #[test]
    fn test_split_extended_prefixes_allows_qualifiers() {
        let prefixes = extended(&["build"]);
        assert_eq!(
            prefixes.split("rc.1-bar-foo", Some("foo")),
            SuffixParts {
                pre_release: Some("rc.1-bar"),
                variant: Some("foo"),
            }
        );
        assert_eq!(
            prefixes.split("build-foo", Some("foo")),
            SuffixParts {
                pre_release: Some("build"),
                variant: Some("foo"),
            }
        );
        assert_eq!(
            prefixes.split("build.1", None),
            SuffixParts {
                pre_release: Some("build.1"),
                variant: None,
            }
        );
    }

    #[test]
    fn test_tag_version_variant_must_match() {
        let prefixes = defaults();
        assert!(TagVersion::parse("1.0.0-foo", &prefixes, Some("foo")).is_some());
        assert!(TagVersion::parse("1.0.0-foo", &prefixes, Some("bar")).is_none());
        assert!(TagVersion::parse("1.0.0", &prefixes, Some("foo")).is_none());
        assert!(TagVersion::parse("1.0.0-foo.1", &prefixes, None).is_none());
    }

    #[test]
    fn test_tag_version_precedence() {
        let prefixes = defaults();
        let parse = |tag| TagVersion::parse(tag, &prefixes, None).unwrap();

        assert_eq!(parse("1.0.0-alpha.1").cmp_precedence(&parse("1.0.0")), Ordering::Less);
        assert_eq!(parse("1.0.0-rc.1").cmp_precedence(&parse("1.0.0-rc.2")), Ordering::Less);
        assert_eq!(parse("1.0.0-beta").cmp_precedence(&parse("1.0.0-beta.1")), Ordering::Less);
        assert_eq!(parse("1.0.0-rc.2").cmp_precedence(&parse("1.0.0-rc.10")), Ordering::Less);
        assert_eq!(parse("3").cmp_precedence(&parse("3.0.0")), Ordering::Equal);
        assert_eq!(parse("1.10").cmp_precedence(&parse("1.9.9")), Ordering::Greater);
    }

    #[test]
    fn test_tag_version_strips_variant_for_precedence() {
        let prefixes = extended(&["build"]);
        let parse = |tag| TagVersion::parse(tag, &prefixes, Some("foo")).unwrap();

        assert_eq!(
            parse("1.0.0-alpha.1-foo").cmp_precedence(&parse("1.0.0-alpha.1-bar-foo")),
            Ordering::Less
        );
        assert_eq!(
            parse("1.0.0-rc.1-foo").cmp_precedence(&parse("1.0.0-foo")),
            Ordering::Less
        );
    }

    #[test]
    fn test_supersedes() {
        let prefixes = defaults();
        let parse = |tag| TagVersion::parse(tag, &prefixes, None).unwrap();

        assert!(parse("3.2.1").supersedes(&parse("3.2")));
        assert!(!parse("3").supersedes(&parse("3.2")));
        assert!(parse("1.0.0").supersedes(&parse("1.0.0-rc.1")));
        assert!(!parse("1.0.0-rc.1").supersedes(&parse("1.0.0")));
        assert!(!parse("2.1").supersedes(&parse("2.1")));
    }

    #[test]
    fn test_invalid_pre_release_identifiers_rejected() {
        assert!(TagVersion::parse("1.0.0-rc.01", &defaults(), None).is_none());
    }
}
