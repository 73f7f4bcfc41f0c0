//! # Regwatch Core
//!
//! Core types for regwatch, a check step that reports new versions of a
//! container image repository.
//!
//! This crate provides the registry-independent pieces:
//!
//! - [`CheckRequest`] and [`Version`] - the JSON documents a check consumes and emits
//! - [`Source`] - repository-selection policy, and the [`DiscoveryPolicy`] derived from it
//! - [`tag`] - interpretation of tags as semantic versions with variants
//! - [`VersionConstraint`] - semver range constraints
//!
//! ## Example
//!
//! ```rust
//! use regwatch_core::{CheckRequest, DiscoveryPolicy};
//!
//! let request = CheckRequest::from_slice(
//!     br#"{"source": {"repository": "alpine", "semver_constraint": "3.x"}}"#,
//! )
//! .unwrap();
//!
//! assert!(matches!(
//!     request.source.discovery_policy().unwrap(),
//!     DiscoveryPolicy::Semver(_)
//! ));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod constraint;
pub mod error;
pub mod source;
pub mod tag;
pub mod validation;
pub mod version;


pub use constraint::VersionConstraint;
pub use error::{Error, Result};
pub use source::{
    AwsCredentials, BasicCredentials, DiscoveryPolicy, RegistryMirror, SemverPolicy, Source,
};
pub use tag::{PreReleasePrefixes, TagVersion};
pub use validation::{Validate, ValidationError};
pub use version::{CheckRequest, CheckResponse, Version};
