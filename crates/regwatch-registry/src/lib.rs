//! # Regwatch Registry
//!
//! Read-only OCI distribution client for regwatch.
//!
//! ## Features
//!
//! - **Registry trait**: the four reads discovery needs (tags, digest, manifest, config)
//! - **HTTP client**: Docker Registry v2 / OCI distribution API with bearer-token challenges
//! - **ECR**: AWS authorization-token exchange
//! - **Decorators**: rate-limit retry and mirror-then-origin failover
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use regwatch_registry::{
//!     MirroredRegistry, Reference, Registry, RegistryClient, RegistryConfig, RetryPolicy,
//!     RetryingRegistry,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reference = Reference::parse("alpine")?;
//!     let origin = RegistryClient::new(RegistryConfig::for_host(reference.registry()))?;
//!     let registry = MirroredRegistry::new(
//!         RetryingRegistry::new(origin, RetryPolicy::default()),
//!         None::<RegistryClient>,
//!     );
//!
//!     let digest = registry.resolve_digest(reference.repository(), "latest").await?;
//!     println!("{digest}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               MirroredRegistry               │
//! │  ┌────────────────────┐ ┌──────────────────┐ │
//! │  │ RetryingRegistry   │ │ RetryingRegistry │ │
//! │  │  (mirror client)   │ │  (origin client) │ │
//! │  └────────────────────┘ └──────────────────┘ │
//! └──────────────────────────────────────────────┘
//!                        │
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │                 OCI Registry                 │
//! │     (Docker Hub, GHCR, ECR, Harbor, etc.)    │
//! └──────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod auth;
mod client;
mod config;
mod ecr;
mod error;
mod mirror;
pub mod oci;
mod reference;
mod registry;
mod retry;

pub use client::RegistryClient;
pub use config::{RegistryAuth, RegistryConfig, TlsConfig, DEFAULT_TIMEOUT};
pub use ecr::{authorize as ecr_authorize, EcrAuthorization};
pub use error::{RegistryError, Result};
pub use mirror::MirroredRegistry;
pub use reference::{allows_plain_http, Reference, DOCKER_HUB_REGISTRY};
pub use registry::Registry;
pub use retry::{RetryPolicy, RetryingRegistry};
