//! Source configuration and the discovery policy derived from it.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::constraint::VersionConstraint;
use crate::error::{Error, Result};
use crate::tag::PreReleasePrefixes;
use crate::validation::{Validate, ValidationError, ValidationErrors};

/// Tag tracked when the source does not name one.
pub const DEFAULT_TAG: &str = "latest";

/// Repository-selection policy supplied with every check request.
///
/// Unknown fields are rejected so that typos fail loudly instead of being
/// silently ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Source {
    /// Repository reference, optionally prefixed with a registry host.
    pub repository: String,

    /// Fixed tag to track; numbers are accepted as well as strings.
    #[serde(
        default,
        deserialize_with = "deserialize_tag",
        skip_serializing_if = "Option::is_none"
    )]
    pub tag: Option<String>,

    /// Regular expression selecting tags to track.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_regex: Option<String>,

    /// Order regex-selected tags by image creation time.
    #[serde(default)]
    pub created_at_sort: bool,

    /// Semver range constraint for tracked tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semver_constraint: Option<String>,

    /// Variant suffix to track (e.g. `alpine`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,

    /// Include pre-release tags.
    #[serde(default)]
    pub pre_releases: bool,

    /// Pre-release prefixes recognized in addition to `alpha`, `beta`, `rc`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_release_prefixes: Vec<String>,

    /// Username for the origin registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password for the origin registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// AWS access key used for the ECR token exchange.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_access_key_id: Option<String>,

    /// AWS secret key used for the ECR token exchange.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_secret_access_key: Option<String>,

    /// AWS session token used for the ECR token exchange.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_session_token: Option<String>,

    /// AWS region of the ECR registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_region: Option<String>,

    /// Role to assume before requesting the ECR token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_role_arn: Option<String>,

    /// Mirror registry consulted before the origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_mirror: Option<RegistryMirror>,

    /// Extra trusted certificate authorities, PEM encoded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ca_certs: Vec<String>,

    /// Enable debug logging.
    #[serde(default)]
    pub debug: bool,
}

/// A mirror registry and its own credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryMirror {
    /// Mirror host, optionally with a port.
    pub host: String,

    /// Username for the mirror.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password for the mirror.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl RegistryMirror {
    /// Returns the mirror's basic credentials, if both parts are set.
    #[must_use]
    pub fn credentials(&self) -> Option<BasicCredentials> {
        BasicCredentials::from_parts(self.username.as_deref(), self.password.as_deref())
    }
}

/// Static username/password credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    /// Username.
    pub username: String,
    /// Password or token.
    pub password: String,
}

impl BasicCredentials {
    fn from_parts(username: Option<&str>, password: Option<&str>) -> Option<Self> {
        match (non_empty(username), non_empty(password)) {
            (Some(username), Some(password)) => Some(Self {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => None,
        }
    }
}

/// Inputs for the AWS ECR authorization-token exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Optional session token.
    pub session_token: Option<String>,
    /// Region of the registry.
    pub region: String,
    /// Optional role to assume first.
    pub role_arn: Option<String>,
}

/// How versions are discovered, derived from a [`Source`].
///
/// The variants are exhaustive: every source maps to exactly one of them.
#[derive(Debug, Clone)]
pub enum DiscoveryPolicy {
    /// Track the digest of one fixed tag.
    FixedTag {
        /// The tag to track.
        tag: String,
    },

    /// Track every tag matching a regular expression.
    Regex {
        /// Compiled expression.
        pattern: Regex,
        /// Order by image creation time instead of listing order.
        created_at_sort: bool,
    },

    /// Track version-shaped tags.
    Semver(SemverPolicy),
}

/// Filtering rules for semver discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemverPolicy {
    /// Optional range constraint.
    pub constraint: Option<VersionConstraint>,
    /// Variant to track.
    pub variant: Option<String>,
    /// Include pre-releases.
    pub pre_releases: bool,
    /// Recognized pre-release prefixes.
    pub prefixes: PreReleasePrefixes,
}

impl SemverPolicy {
    /// Returns the non-numeric tag tracked next to versioned tags: the
    /// variant name, or `latest`.
    ///
    /// A policy from [`Source::discovery_policy`] without a variant always
    /// carries a constraint, and a constrained policy never reports its alias.
    /// `latest` is only tracked by policies built directly with neither set.
    #[must_use]
    pub fn bare_alias(&self) -> &str {
        self.variant.as_deref().unwrap_or(DEFAULT_TAG)
    }
}

impl Source {
    /// Creates a source for `repository` with every option at its default.
    #[must_use]
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            ..Self::default()
        }
    }

    /// Returns the tag tracked in fixed-tag mode.
    #[must_use]
    pub fn tag(&self) -> &str {
        non_empty(self.tag.as_deref()).unwrap_or(DEFAULT_TAG)
    }

    /// Returns the origin registry's static credentials, if configured.
    #[must_use]
    pub fn basic_credentials(&self) -> Option<BasicCredentials> {
        BasicCredentials::from_parts(self.username.as_deref(), self.password.as_deref())
    }

    /// Returns the ECR exchange inputs, if the key, secret, and region are all set.
    #[must_use]
    pub fn aws_credentials(&self) -> Option<AwsCredentials> {
        let access_key_id = non_empty(self.aws_access_key_id.as_deref())?;
        let secret_access_key = non_empty(self.aws_secret_access_key.as_deref())?;
        let region = non_empty(self.aws_region.as_deref())?;

        Some(AwsCredentials {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token: non_empty(self.aws_session_token.as_deref()).map(ToString::to_string),
            region: region.to_string(),
            role_arn: non_empty(self.aws_role_arn.as_deref()).map(ToString::to_string),
        })
    }

    /// Derives the discovery policy.
    ///
    /// A regex selects regex discovery, even when a constraint is also set.
    /// A constraint or variant selects semver discovery. Anything else tracks
    /// the fixed tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex or constraint is malformed.
    ///
    /// # Examples
    ///
    /// ```
    /// use regwatch_core::{DiscoveryPolicy, Source};
    ///
    /// let source = Source::new("alpine");
    /// assert!(matches!(
    ///     source.discovery_policy().unwrap(),
    ///     DiscoveryPolicy::FixedTag { tag } if tag == "latest"
    /// ));
    /// ```
    pub fn discovery_policy(&self) -> Result<DiscoveryPolicy> {
        if let Some(pattern) = non_empty(self.tag_regex.as_deref()) {
            let compiled = Regex::new(pattern).map_err(|source| Error::InvalidRegex {
                pattern: pattern.to_string(),
                source,
            })?;
            return Ok(DiscoveryPolicy::Regex {
                pattern: compiled,
                created_at_sort: self.created_at_sort,
            });
        }

        let constraint = non_empty(self.semver_constraint.as_deref())
            .map(VersionConstraint::parse)
            .transpose()?;
        let variant = non_empty(self.variant.as_deref()).map(ToString::to_string);

        if constraint.is_none() && variant.is_none() {
            return Ok(DiscoveryPolicy::FixedTag {
                tag: self.tag().to_string(),
            });
        }

        Ok(DiscoveryPolicy::Semver(SemverPolicy {
            constraint,
            variant,
            pre_releases: self.pre_releases,
            prefixes: PreReleasePrefixes::new(&self.pre_release_prefixes),
        }))
    }
}

impl Validate for Source {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.repository.trim().is_empty() {
            errors.add(ValidationError::required("repository"));
        } else if self.repository.chars().any(char::is_whitespace) {
            errors.add(ValidationError::format(
                "repository",
                "must not contain whitespace",
            ));
        }

        let aws_fields = [
            ("aws_access_key_id", &self.aws_access_key_id),
            ("aws_secret_access_key", &self.aws_secret_access_key),
            ("aws_region", &self.aws_region),
        ];
        let aws_present = aws_fields
            .iter()
            .filter(|(_, value)| non_empty(value.as_deref()).is_some())
            .count();

        if aws_present > 0 && aws_present < aws_fields.len() {
            for (field, value) in aws_fields {
                if non_empty(value.as_deref()).is_none() {
                    errors.add(ValidationError::required(field));
                }
            }
        }

        let static_present = non_empty(self.username.as_deref()).is_some()
            || non_empty(self.password.as_deref()).is_some();
        if static_present && aws_present > 0 {
            errors.add(ValidationError::conflict(
                "username",
                "static credentials cannot be combined with AWS credentials",
            ));
        }

        if let Some(mirror) = &self.registry_mirror {
            if mirror.host.trim().is_empty() {
                errors.add(ValidationError::required("registry_mirror.host"));
            }
        }

        for prefix in &self.pre_release_prefixes {
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphabetic()) {
                errors.add(ValidationError::format(
                    "pre_release_prefixes",
                    format!("'{prefix}' must consist of ASCII letters"),
                ));
            }
        }

        errors.into_result()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Accepts `"1.2"` as well as `1.2` for the tag field.
fn deserialize_tag<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(tag) => Ok(Some(tag)),
        serde_json::Value::Number(number) => Ok(Some(number.to_string())),
        other => Err(D::Error::custom(format!(
            "tag must be a string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Problem;

    fn source_from(json: &str) -> Source {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_default_tag() {
        assert_eq!(Source::new("alpine").tag(), "latest");

        let mut source = Source::new("alpine");
        source.tag = Some(String::new());
        assert_eq!(source.tag(), "latest");
    }

    #[test]
    fn test_numeric_tag_accepted() {
        let source = source_from(r#"{"repository": "alpine", "tag": 3}"#);
        assert_eq!(source.tag(), "3");

        let source = source_from(r#"{"repository": "alpine", "tag": "3.19"}"#);
        assert_eq!(source.tag(), "3.19");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = serde_json::from_str::<Source>(r#"{"repository": "alpine", "bogus": 1}"#);
        assert!(result.is_err());

        let result = serde_json::from_str::<Source>(
            r#"{"repository": "alpine", "registry_mirror": {"host": "m", "port": 1}}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_policy_fixed_tag() {
        let mut source = Source::new("alpine");
        source.tag = Some("edge".to_string());
        source.pre_releases = true;
        assert!(matches!(
            source.discovery_policy().unwrap(),
            DiscoveryPolicy::FixedTag { tag } if tag == "edge"
        ));
    }

    #[test]
    fn test_policy_regex_takes_precedence() {
        let source = source_from(
            r#"{"repository": "alpine", "tag_regex": "gr(a|e)y", "semver_constraint": "1.2.x"}"#,
        );
        assert!(matches!(
            source.discovery_policy().unwrap(),
            DiscoveryPolicy::Regex { created_at_sort: false, .. }
        ));
    }

    #[test]
    fn test_policy_semver_from_variant() {
        let source = source_from(r#"{"repository": "alpine", "variant": "foo"}"#);
        match source.discovery_policy().unwrap() {
            DiscoveryPolicy::Semver(policy) => {
                assert_eq!(policy.variant.as_deref(), Some("foo"));
                assert_eq!(policy.bare_alias(), "foo");
                assert!(policy.constraint.is_none());
            }
            other => panic!("unexpected policy {other:?}"),
        }
    }

    #[test]
    fn test_policy_semver_from_constraint() {
        let source = source_from(r#"{"repository": "alpine", "semver_constraint": "1.2.x"}"#);
        match source.discovery_policy().unwrap() {
            DiscoveryPolicy::Semver(policy) => {
                assert_eq!(policy.bare_alias(), "latest");
                assert!(policy.constraint.is_some());
            }
            other => panic!("unexpected policy {other:?}"),
        }
    }

    #[test]
    fn test_policy_invalid_regex() {
        let source = source_from(r#"{"repository": "alpine", "tag_regex": "gr(a|e"}"#);
        assert!(matches!(
            source.discovery_policy(),
            Err(Error::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_policy_invalid_constraint() {
        let source = source_from(r#"{"repository": "alpine", "semver_constraint": ">="}"#);
        assert!(matches!(
            source.discovery_policy(),
            Err(Error::InvalidConstraint { .. })
        ));
    }

    #[test]
    fn test_validate_requires_repository() {
        let errors = Source::new("  ").validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.iter().next().unwrap().problem, Problem::Missing);
    }

    #[test]
    fn test_validate_partial_aws_credentials() {
        let mut source = Source::new("123.dkr.ecr.us-east-1.amazonaws.com/app");
        source.aws_access_key_id = Some("AKIA".to_string());
        let errors = source.validate().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["aws_secret_access_key", "aws_region"]);
    }

    #[test]
    fn test_validate_static_and_aws_conflict() {
        let mut source = Source::new("app");
        source.username = Some("user".to_string());
        source.password = Some("pass".to_string());
        source.aws_access_key_id = Some("AKIA".to_string());
        source.aws_secret_access_key = Some("secret".to_string());
        source.aws_region = Some("us-east-1".to_string());

        let errors = source.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.problem == Problem::Conflicting));
    }

    #[test]
    fn test_validate_prefixes() {
        let mut source = Source::new("app");
        source.pre_release_prefixes = vec!["build".to_string(), "pre-1".to_string()];
        let errors = source.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_aws_credentials() {
        let mut source = Source::new("app");
        assert!(source.aws_credentials().is_none());

        source.aws_access_key_id = Some("AKIA".to_string());
        source.aws_secret_access_key = Some("secret".to_string());
        source.aws_region = Some("eu-west-1".to_string());
        source.aws_session_token = Some(String::new());

        let creds = source.aws_credentials().unwrap();
        assert_eq!(creds.region, "eu-west-1");
        assert!(creds.session_token.is_none());
        assert!(source.is_valid());
    }

    #[test]
    fn test_mirror_credentials() {
        let mirror = RegistryMirror {
            host: "mirror.example.com".to_string(),
            username: Some("m".to_string()),
            password: None,
        };
        assert!(mirror.credentials().is_none());
    }
}
