//! Repository reference parsing.
//!
//! A reference is `[HOST[:PORT]/]PATH`. The first component is a host only
//! when it contains `.` or `:` or is `localhost`; otherwise the reference
//! names a Docker Hub repository.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{RegistryError, Result};

/// Registry host serving Docker Hub repositories.
pub const DOCKER_HUB_REGISTRY: &str = "index.docker.io";

/// Host aliases that all mean Docker Hub.
const DOCKER_HUB_ALIASES: [&str; 3] = ["docker.io", "index.docker.io", "registry-1.docker.io"];

static PATH_COMPONENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*$").expect("path component pattern is valid")
});

/// A parsed repository reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    registry: String,
    repository: String,
    explicit_registry: bool,
}

impl Reference {
    /// Parses a repository reference.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidReference`] if the reference is empty,
    /// carries a tag or digest, or has an invalid path component.
    ///
    /// # Examples
    ///
    /// ```
    /// use regwatch_registry::Reference;
    ///
    /// let hub = Reference::parse("alpine").unwrap();
    /// assert_eq!(hub.registry(), "index.docker.io");
    /// assert_eq!(hub.repository(), "library/alpine");
    /// assert!(!hub.has_explicit_registry());
    ///
    /// let private = Reference::parse("registry.example.com:5000/team/app").unwrap();
    /// assert_eq!(private.registry(), "registry.example.com:5000");
    /// assert_eq!(private.repository(), "team/app");
    /// ```
    pub fn parse(reference: &str) -> Result<Self> {
        let invalid = |reason: &str| RegistryError::InvalidReference {
            reference: reference.to_string(),
            reason: reason.to_string(),
        };

        if reference.is_empty() {
            return Err(invalid("reference is empty"));
        }
        if reference.contains('@') {
            return Err(invalid("digests are not allowed in a repository reference"));
        }

        let (registry, path, explicit_registry) = match reference.split_once('/') {
            Some((first, rest)) if looks_like_host(first) => (first, rest, true),
            _ => (DOCKER_HUB_REGISTRY, reference, false),
        };

        let registry = if DOCKER_HUB_ALIASES.contains(&registry) {
            DOCKER_HUB_REGISTRY
        } else {
            registry
        };

        for component in path.split('/') {
            if component.contains(':') {
                return Err(invalid("tags are not allowed in a repository reference"));
            }
            if !PATH_COMPONENT.is_match(component) {
                return Err(invalid(&format!(
                    "path component '{component}' must be lowercase alphanumerics separated by '.', '_', or '-'"
                )));
            }
        }

        let repository = if registry == DOCKER_HUB_REGISTRY && !path.contains('/') {
            format!("library/{path}")
        } else {
            path.to_string()
        };

        Ok(Self {
            registry: registry.to_string(),
            repository,
            explicit_registry,
        })
    }

    /// Returns the registry host, with port if one was given.
    #[must_use]
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Returns the repository path within the registry.
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Returns true if the reference named its registry host.
    #[must_use]
    pub const fn has_explicit_registry(&self) -> bool {
        self.explicit_registry
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)
    }
}

/// Returns true if `host` may be reached over plain HTTP when HTTPS fails.
///
/// Loopback and `.local` hosts often run registries without TLS. They are
/// still tried over HTTPS first so that `ca_certs` apply to them.
///
/// # Examples
///
/// ```
/// use regwatch_registry::allows_plain_http;
///
/// assert!(allows_plain_http("localhost:5000"));
/// assert!(!allows_plain_http("ghcr.io"));
/// ```
#[must_use]
pub fn allows_plain_http(host: &str) -> bool {
    let name = if host.starts_with('[') {
        host.split_once(']').map_or(host, |(name, _)| &name[1..])
    } else {
        host.split(':').next().unwrap_or(host)
    };

    name == "localhost" || name.starts_with("127.") || name == "::1" || name.ends_with(".local")
}

fn looks_like_host(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}
