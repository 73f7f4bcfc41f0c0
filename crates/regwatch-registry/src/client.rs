//! OCI Distribution API client.
//!
//! This module provides the HTTP implementation of [`Registry`] for one
//! registry host.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use reqwest::header::{HeaderMap, ACCEPT, LINK, RETRY_AFTER};
use reqwest::{Method, Response, StatusCode};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::auth::{self, Challenge};
use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::oci::{sha256_digest, ManifestDocument, MediaType, TagList};
use crate::registry::Registry;

/// Header carrying the manifest digest on manifest responses.
const DOCKER_CONTENT_DIGEST: &str = "docker-content-digest";

/// Client for one OCI-compatible registry.
///
/// Hosts with a plain HTTP fallback are tried over TLS first. Whichever base
/// URL answers first is kept for the life of the client.
#[derive(Debug)]
pub struct RegistryClient {
    config: RegistryConfig,
    host: String,
    http: reqwest::Client,
    token: Mutex<Option<String>>,
    base: OnceCell<String>,
}

impl RegistryClient {
    /// Creates a new registry client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a CA certificate is invalid or the HTTP client
    /// cannot be created.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use regwatch_registry::{RegistryClient, RegistryConfig};
    ///
    /// let config = RegistryConfig::for_host("ghcr.io");
    /// let client = RegistryClient::new(config)?;
    /// # Ok::<(), regwatch_registry::RegistryError>(())
    /// ```
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let http = Self::build_http_client(&config)?;

        Ok(Self {
            host: config.host(),
            config,
            http,
            token: Mutex::new(None),
            base: OnceCell::new(),
        })
    }

    /// Builds the HTTP client with proper configuration.
    fn build_http_client(config: &RegistryConfig) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent);

        for cert in config.tls.root_certificates()? {
            builder = builder.add_root_certificate(cert);
        }

        builder.build().map_err(|e| RegistryError::ConnectionFailed {
            url: config.url.clone(),
            source: e,
        })
    }

    fn manifest_url(&self, repository: &str, reference: &str) -> String {
        format!("{}/v2/{repository}/manifests/{reference}", self.config.url)
    }

    /// Sends a request, answering one authentication challenge if needed.
    async fn send(
        &self,
        method: Method,
        url: &str,
        repository: &str,
        accept_manifests: bool,
    ) -> Result<Response> {
        let response = self.request(method.clone(), url, accept_manifests).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        match Challenge::from_response(&response) {
            Some(Challenge::Bearer {
                realm,
                service,
                scope,
            }) => {
                let token = auth::fetch_token(
                    &self.http,
                    &realm,
                    service.as_deref(),
                    scope.as_deref(),
                    repository,
                    &self.config.auth,
                )
                .await?;
                *self.token.lock().await = Some(token);
                self.request(method, url, accept_manifests).await
            }
            _ => Ok(response),
        }
    }

    async fn request(&self, method: Method, url: &str, accept_manifests: bool) -> Result<Response> {
        let url = self.rebase(url);
        let result = self.dispatch(method.clone(), &url, accept_manifests).await;

        if result.is_ok() {
            self.base.get_or_init(|| self.config.url.clone());
            return result;
        }

        let unreachable = matches!(
            &result,
            Err(RegistryError::ConnectionFailed { source, .. }) if source.is_connect()
        );
        let Some(fallback) = self
            .config
            .plain_http_fallback
            .as_ref()
            .filter(|_| unreachable && self.base.get().is_none())
        else {
            return result;
        };

        let Some(path) = url.strip_prefix(self.config.url.as_str()) else {
            return result;
        };
        let response = self
            .dispatch(method, &format!("{fallback}{path}"), accept_manifests)
            .await?;

        info!(registry = %self.host, "TLS connection failed, using plain HTTP");
        let _ = self.base.set(fallback.clone());
        Ok(response)
    }

    /// Moves a URL built on the configured base onto the base that answered.
    fn rebase(&self, url: &str) -> String {
        match (self.base.get(), url.strip_prefix(self.config.url.as_str())) {
            (Some(base), Some(path)) => format!("{base}{path}"),
            _ => url.to_string(),
        }
    }

    async fn dispatch(&self, method: Method, url: &str, accept_manifests: bool) -> Result<Response> {
        debug!(%method, url, "Registry request");

        let mut builder = self.http.request(method, url);
        if accept_manifests {
            builder = builder.header(ACCEPT, MediaType::accept_header());
        }

        let token = self.token.lock().await.clone();
        builder = match (token, self.config.auth.credentials()) {
            (Some(token), _) => builder.bearer_auth(token),
            (None, Some((username, password))) => builder.basic_auth(username, Some(password)),
            (None, None) => builder,
        };

        builder
            .send()
            .await
            .map_err(|source| RegistryError::ConnectionFailed {
                url: url.to_string(),
                source,
            })
    }

    /// Passes successful responses through and classifies the rest.
    async fn into_success(response: Response, repository: &str, reference: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        Err(RegistryError::from_response(
            status,
            &body,
            retry_after,
            repository,
            reference,
        ))
    }

    async fn fetch_blob(&self, repository: &str, digest: &str) -> Result<Vec<u8>> {
        let url = format!("{}/v2/{repository}/blobs/{digest}", self.config.url);
        let response = self.send(Method::GET, &url, repository, false).await?;
        let response = Self::into_success(response, repository, digest).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Registry for RegistryClient {
    fn name(&self) -> &str {
        &self.host
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        let mut url = format!("{}/v2/{repository}/tags/list", self.config.url);
        let mut tags = Vec::new();

        loop {
            let response = self.send(Method::GET, &url, repository, false).await?;
            let response = Self::into_success(response, repository, "tags/list").await?;

            let next = response
                .headers()
                .get(LINK)
                .and_then(|value| value.to_str().ok())
                .and_then(|link| next_page(link, &url));

            let body = response.bytes().await?;
            let page: TagList = serde_json::from_slice(&body)?;
            tags.extend(page.tags.unwrap_or_default());

            match next {
                Some(next) if next != url => url = next,
                _ => break,
            }
        }

        debug!(registry = %self.host, repository, count = tags.len(), "Listed tags");
        Ok(tags)
    }

    async fn resolve_digest(&self, repository: &str, reference: &str) -> Result<String> {
        let url = self.manifest_url(repository, reference);
        let response = self.send(Method::HEAD, &url, repository, true).await?;

        if response.status() != StatusCode::METHOD_NOT_ALLOWED {
            let response = Self::into_success(response, repository, reference).await?;
            let digest = response
                .headers()
                .get(DOCKER_CONTENT_DIGEST)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty());
            if let Some(digest) = digest {
                return Ok(digest.to_string());
            }
        }

        debug!(repository, reference, "No digest header, hashing manifest body");
        let manifest = self.fetch_manifest(repository, reference).await?;
        Ok(sha256_digest(&manifest))
    }

    async fn fetch_manifest(&self, repository: &str, reference: &str) -> Result<Vec<u8>> {
        let url = self.manifest_url(repository, reference);
        let response = self.send(Method::GET, &url, repository, true).await?;
        let response = Self::into_success(response, repository, reference).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn fetch_config(&self, repository: &str, reference: &str) -> Result<Vec<u8>> {
        let invalid = |message: String| RegistryError::InvalidManifest {
            repository: repository.to_string(),
            reference: reference.to_string(),
            message,
        };

        let bytes = self.fetch_manifest(repository, reference).await?;
        let manifest = match ManifestDocument::from_slice(&bytes).map_err(|e| invalid(e.to_string()))? {
            ManifestDocument::Image(manifest) => manifest,
            ManifestDocument::Index(index) => {
                let entry = index
                    .preferred()
                    .ok_or_else(|| invalid("image index has no manifests".to_string()))?;
                let bytes = self.fetch_manifest(repository, &entry.digest).await?;
                match ManifestDocument::from_slice(&bytes).map_err(|e| invalid(e.to_string()))? {
                    ManifestDocument::Image(manifest) => manifest,
                    ManifestDocument::Index(_) => {
                        return Err(invalid("nested image indexes are not supported".to_string()))
                    }
                }
            }
        };

        self.fetch_blob(repository, &manifest.config.digest).await
    }
}

/// Extracts the `rel="next"` target of a `Link` header, resolved against
/// the URL of the current page.
fn next_page(link: &str, current: &str) -> Option<String> {
    link.split(',')
        .map(str::trim)
        .find(|part| part.contains("rel=\"next\"") || part.contains("rel=next"))
        .and_then(|part| {
            let start = part.find('<')?;
            let end = part.find('>')?;
            let target = part.get(start + 1..end)?;
            url::Url::parse(current).ok()?.join(target).ok()
        })
        .map(String::from)
}

/// Reads `Retry-After` as either delta-seconds or an HTTP date.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    (at.with_timezone(&chrono::Utc) - chrono::Utc::now()).to_std().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_client_creation() {
        let config = RegistryConfig::new("https://registry.example.com");
        let client = RegistryClient::new(config).unwrap();
        assert_eq!(client.name(), "registry.example.com");
    }

    #[test]
    fn test_rebase_after_fallback() {
        let client = RegistryClient::new(RegistryConfig::for_host("localhost:5000")).unwrap();
        let url = "https://localhost:5000/v2/app/tags/list?last=1";
        assert_eq!(client.rebase(url), url);

        client.base.set("http://localhost:5000".to_string()).unwrap();
        assert_eq!(client.rebase(url), "http://localhost:5000/v2/app/tags/list?last=1");
        assert_eq!(
            client.rebase("https://auth.example.com/token"),
            "https://auth.example.com/token"
        );
    }

    #[test]
    fn test_next_page_relative() {
        let link = r#"</v2/app/tags/list?last=1.2.0&n=2>; rel="next""#;
        assert_eq!(
            next_page(link, "https://registry.example.com/v2/app/tags/list").as_deref(),
            Some("https://registry.example.com/v2/app/tags/list?last=1.2.0&n=2")
        );
    }

    #[test]
    fn test_next_page_absolute_and_missing() {
        let link = r#"<https://other.example.com/v2/app/tags/list?last=x>; rel="next""#;
        assert_eq!(
            next_page(link, "https://registry.example.com/v2/app/tags/list").as_deref(),
            Some("https://other.example.com/v2/app/tags/list?last=x")
        );
        assert!(next_page(r#"</v2/app/tags/list>; rel="prev""#, "https://r.example.com/").is_none());
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(7)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers), None);
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }
}
