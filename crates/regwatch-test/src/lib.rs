//! # Regwatch Test
//!
//! Test support for regwatch.
//!
//! This crate provides:
//!
//! - [`FakeRegistry`], an in-memory [`Registry`](regwatch_registry::Registry)
//!   with failure, rate-limit, and call-recording hooks
//! - [`RequestBuilder`] for check requests
//! - Small helpers for digests, timestamps, and version assertions
//!
//! ## Example
//!
//! ```rust
//! use regwatch_test::{digest, FakeRegistry, RequestBuilder};
//!
//! let registry = FakeRegistry::new("registry.example.com")
//!     .with_tag("1.0.0", digest("one"))
//!     .with_tag("1.1.0", digest("two"));
//!
//! let request = RequestBuilder::new("team/app")
//!     .semver_constraint(">=1.0")
//!     .cursor("1.0.0", digest("one"))
//!     .build();
//! ```

pub mod fake_registry;
pub mod fixtures;

pub use fake_registry::{Call, FakeRegistry, Failure, Operation};
pub use fixtures::{assert_versions, digest, tags, timestamp, RequestBuilder};
