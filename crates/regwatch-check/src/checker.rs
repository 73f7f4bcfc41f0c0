//! The check entry point: from request to response.

use std::time::Duration;

use regwatch_core::{CheckRequest, CheckResponse, DiscoveryPolicy, Source, Validate, Version};
use regwatch_registry::{
    ecr_authorize, MirroredRegistry, Reference, Registry, RegistryAuth, RegistryClient,
    RegistryConfig, RetryPolicy, RetryingRegistry, TlsConfig, DEFAULT_TIMEOUT,
};
use tracing::{debug, info};

use crate::discovery::TagDiscovery;
use crate::error::{CheckError, Result, Stage};
use crate::tracker::TagTracker;

type Client = RetryingRegistry<RegistryClient>;

/// Runs checks against real registries.
///
/// # Examples
///
/// ```rust,no_run
/// use regwatch_check::Checker;
/// use regwatch_core::CheckRequest;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let request = CheckRequest::from_slice(br#"{"source": {"repository": "alpine"}}"#)?;
/// let versions = Checker::new().check(&request).await?;
/// println!("{}", serde_json::to_string(&versions)?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Checker {
    retry: RetryPolicy,
    timeout: Duration,
}

impl Default for Checker {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Checker {
    /// Creates a checker with the default retry policy and timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry policy for rate-limited requests.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks the repository described by `request` for new versions.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid, credentials cannot be
    /// obtained, or the origin registry fails.
    pub async fn check(&self, request: &CheckRequest) -> Result<CheckResponse> {
        let source = &request.source;
        source.validate().map_err(regwatch_core::Error::from)?;
        let policy = source.discovery_policy()?;

        let (auth, repository) = origin_credentials(source).await?;
        let reference = Reference::parse(&repository).map_err(CheckError::InvalidRepository)?;
        info!(
            repository = %reference,
            policy = policy_name(&policy),
            cursor = request.version.is_some(),
            "Checking for new versions"
        );

        let tls = source
            .ca_certs
            .iter()
            .fold(TlsConfig::new(), |tls, pem| tls.with_ca_cert(pem.clone()));

        let origin = self.client(reference.registry(), auth, &tls)?;
        let mirror = match &source.registry_mirror {
            Some(mirror) if reference.has_explicit_registry() => {
                debug!(
                    mirror = %mirror.host,
                    registry = reference.registry(),
                    "Repository names its registry, not using mirror"
                );
                None
            }
            Some(mirror) => Some(self.client(&mirror.host, mirror.credentials().into(), &tls)?),
            None => None,
        };

        let registry = MirroredRegistry::new(origin, mirror);
        let versions = run(
            &registry,
            reference.repository(),
            &policy,
            request.version.as_ref(),
        )
        .await?;

        info!(
            repository = %reference,
            versions = versions.len(),
            "Check complete"
        );
        Ok(versions)
    }

    fn client(&self, host: &str, auth: RegistryAuth, tls: &TlsConfig) -> Result<Client> {
        let config = RegistryConfig::for_host(host)
            .with_auth(auth)
            .with_timeout(self.timeout)
            .with_tls(tls.clone());
        let client = RegistryClient::new(config).map_err(|source| CheckError::Client {
            host: host.to_string(),
            source,
        })?;
        Ok(RetryingRegistry::new(client, self.retry))
    }
}

/// Runs the strategy selected by `policy` against `registry`.
///
/// # Errors
///
/// Returns an error if the registry fails.
pub async fn run<R: Registry + ?Sized>(
    registry: &R,
    repository: &str,
    policy: &DiscoveryPolicy,
    cursor: Option<&Version>,
) -> Result<CheckResponse> {
    match policy {
        DiscoveryPolicy::FixedTag { tag } => {
            TagTracker::new(registry, repository).check(tag, cursor).await
        }
        DiscoveryPolicy::Regex {
            pattern,
            created_at_sort,
        } => {
            TagDiscovery::new(registry, repository)
                .regex(pattern, *created_at_sort, cursor)
                .await
        }
        DiscoveryPolicy::Semver(semver) => {
            TagDiscovery::new(registry, repository)
                .semver(semver, cursor)
                .await
        }
    }
}

/// Resolves the origin credentials and the repository to check. An ECR
/// exchange also qualifies a bare repository with the account registry.
async fn origin_credentials(source: &Source) -> Result<(RegistryAuth, String)> {
    let Some(aws) = source.aws_credentials() else {
        return Ok((source.basic_credentials().into(), source.repository.clone()));
    };

    debug!(stage = %Stage::Authenticate, region = %aws.region, "Exchanging AWS credentials");
    let authorization = ecr_authorize(&aws)
        .await
        .map_err(CheckError::Authentication)?;
    let repository = authorization.qualify_repository(&source.repository);
    Ok((Some(authorization.credentials).into(), repository))
}

const fn policy_name(policy: &DiscoveryPolicy) -> &'static str {
    match policy {
        DiscoveryPolicy::FixedTag { .. } => "tag",
        DiscoveryPolicy::Regex { .. } => "regex",
        DiscoveryPolicy::Semver(_) => "semver",
    }
}
