//! Semver range constraints.
//!
//! Pipelines write constraints the way most container tooling accepts them:
//! `1.2.x`, `>= 1.2, < 2`, `~1.4 || ^2`, `1.2 - 1.4`. This module normalizes
//! that syntax into [`semver::VersionReq`] alternatives.
//!
//! A bare version matches exactly, with missing or wildcard components
//! matching anything (`1.2` and `1.2.x` both mean `>=1.2.0, <1.3.0`).

use std::fmt;

use semver::{Version, VersionReq};

use crate::error::{Error, Result};

const OPERATOR_CHARS: &[char] = &['<', '>', '=', '~', '^'];

/// A parsed version range constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    raw: String,
    alternatives: Vec<VersionReq>,
}

impl VersionConstraint {
    /// Parses a constraint expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConstraint`] if any comparator is malformed.
    ///
    /// # Examples
    ///
    /// ```
    /// use regwatch_core::VersionConstraint;
    /// use semver::Version;
    ///
    /// let constraint = VersionConstraint::parse("1.2.x").unwrap();
    /// assert!(constraint.matches(&Version::new(1, 2, 9)));
    /// assert!(!constraint.matches(&Version::new(1, 3, 0)));
    /// ```
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidConstraint {
            constraint: raw.to_string(),
            reason,
        };

        let mut alternatives = Vec::new();
        for alternative in raw.split("||") {
            let comparators = normalize_alternative(alternative).map_err(&invalid)?;
            let req = if comparators.is_empty() {
                VersionReq::STAR
            } else {
                VersionReq::parse(&comparators.join(", "))
                    .map_err(|e| invalid(e.to_string()))?
            };
            alternatives.push(req);
        }

        Ok(Self {
            raw: raw.to_string(),
            alternatives,
        })
    }

    /// Returns true if `version` satisfies any alternative.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Turns one `||` alternative into `semver` comparator strings.
fn normalize_alternative(alternative: &str) -> std::result::Result<Vec<String>, String> {
    let tokens = merge_operators(alternative.replace(',', " ").split_whitespace());

    if let [lower, dash, upper] = tokens.as_slice() {
        if dash == "-" {
            return Ok(vec![
                normalize_comparator(&format!(">={lower}"))?,
                normalize_comparator(&format!("<={upper}"))?,
            ]
            .into_iter()
            .flatten()
            .collect());
        }
    }

    let mut comparators = Vec::new();
    for token in &tokens {
        if token == "-" {
            return Err("hyphen ranges take exactly two versions".to_string());
        }
        if let Some(comparator) = normalize_comparator(token)? {
            comparators.push(comparator);
        }
    }
    Ok(comparators)
}

/// Joins operators written apart from their version (`>= 1.2`).
fn merge_operators<'a>(raw_tokens: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut pending = String::new();
    for token in raw_tokens {
        if token.chars().all(|c| OPERATOR_CHARS.contains(&c)) {
            pending.push_str(token);
        } else {
            tokens.push(format!("{pending}{token}"));
            pending.clear();
        }
    }
    if !pending.is_empty() {
        tokens.push(pending);
    }
    tokens
}

/// Normalizes one comparator; `None` means "matches everything".
fn normalize_comparator(token: &str) -> std::result::Result<Option<String>, String> {
    let version_start = token
        .find(|c: char| !OPERATOR_CHARS.contains(&c))
        .ok_or_else(|| format!("operator '{token}' has no version"))?;
    let (op, version) = token.split_at(version_start);
    let version = version.strip_prefix('v').unwrap_or(version);

    let components: Vec<&str> = version
        .split('.')
        .take_while(|c| !matches!(*c, "*" | "x" | "X"))
        .collect();

    if components.is_empty() {
        return Ok(None);
    }

    let op = if op.is_empty() { "=" } else { op };
    Ok(Some(format!("{op}{}", components.join("."))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(major: u64, minor: u64, patch: u64) -> Version {
        Version::new(major, minor, patch)
    }

    #[test]
    fn test_wildcard_patch() {
        let constraint = VersionConstraint::parse("1.2.x").unwrap();
        assert!(constraint.matches(&v(1, 2, 1)));
        assert!(constraint.matches(&v(1, 2, 2)));
        assert!(!constraint.matches(&v(1, 0, 0)));
        assert!(!constraint.matches(&v(2, 0, 0)));
    }

    #[test]
    fn test_bare_version_is_exact() {
        let constraint = VersionConstraint::parse("1.2.3").unwrap();
        assert!(constraint.matches(&v(1, 2, 3)));
        assert!(!constraint.matches(&v(1, 2, 4)));
    }

    #[test]
    fn test_spaced_operators_and_commas() {
        let constraint = VersionConstraint::parse(">= 1.2, < 2.0").unwrap();
        assert!(constraint.matches(&v(1, 9, 0)));
        assert!(!constraint.matches(&v(2, 0, 0)));
        assert!(!constraint.matches(&v(1, 1, 9)));

        let spaced = VersionConstraint::parse(">=1.2 <2.0").unwrap();
        assert!(spaced.matches(&v(1, 5, 0)));
    }

    #[test]
    fn test_alternatives() {
        let constraint = VersionConstraint::parse("~1.4 || ^3").unwrap();
        assert!(constraint.matches(&v(1, 4, 7)));
        assert!(constraint.matches(&v(3, 9, 0)));
        assert!(!constraint.matches(&v(2, 0, 0)));
    }

    #[test]
    fn test_hyphen_range() {
        let constraint = VersionConstraint::parse("1.2 - 1.4").unwrap();
        assert!(constraint.matches(&v(1, 2, 0)));
        assert!(constraint.matches(&v(1, 4, 9)));
        assert!(!constraint.matches(&v(1, 5, 0)));
    }

    #[test]
    fn test_star_matches_everything() {
        let constraint = VersionConstraint::parse("*").unwrap();
        assert!(constraint.matches(&v(0, 0, 1)));
        assert!(constraint.matches(&v(42, 0, 0)));
    }

    #[test]
    fn test_v_prefix_accepted() {
        let constraint = VersionConstraint::parse(">=v2").unwrap();
        assert!(constraint.matches(&v(2, 0, 0)));
    }

    #[test]
    fn test_invalid_constraints() {
        for raw in [">=", "1.2 - ", ">=abc", "1 - 2 - 3"] {
            let err = VersionConstraint::parse(raw).unwrap_err();
            assert!(
                matches!(err, Error::InvalidConstraint { .. }),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_display_keeps_raw_text() {
        let constraint = VersionConstraint::parse(" 1.2.x ").unwrap();
        assert_eq!(constraint.to_string(), " 1.2.x ");
    }
}
