//! # Regwatch Check
//!
//! Discovers the versions of a container image repository that are new
//! since a cursor.
//!
//! ## Strategies
//!
//! - [`TagTracker`] follows one fixed tag and reports its digest.
//! - [`TagDiscovery`] lists every tag and selects them by regular expression
//!   or by semantic version, variant, and pre-release rules.
//!
//! [`Checker`] picks the strategy from the request's source, builds the
//! registry clients (credentials, CA certificates, mirror, rate-limit
//! retry), and runs it.
//!
//! ## Example
//!
//! ```rust
//! use regwatch_check::run;
//! use regwatch_test::{digest, tags, FakeRegistry, RequestBuilder};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let registry = FakeRegistry::new("registry.example.com")
//!     .with_tags(["1.0.0", "1.2.1", "1.2.2", "2.0.0"]);
//! let request = RequestBuilder::new("team/app")
//!     .semver_constraint("1.2.x")
//!     .build();
//!
//! let policy = request.source.discovery_policy().unwrap();
//! let versions = run(&registry, "team/app", &policy, None).await.unwrap();
//! assert_eq!(tags(&versions), vec!["1.2.1", "1.2.2"]);
//! # });
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod checker;
mod discovery;
mod error;
pub mod filter;
mod tracker;


pub use checker::{run, Checker};
pub use discovery::{since_cursor, TagDiscovery, FETCH_CONCURRENCY};
pub use error::{CheckError, Result, Stage};
pub use filter::{Classified, TagFilter};
pub use tracker::TagTracker;
