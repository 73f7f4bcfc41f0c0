//! Configuration types for registry client.

use std::time::Duration;

use regwatch_core::BasicCredentials;

use crate::error::{RegistryError, Result};
use crate::reference::allows_plain_http;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for the registry client.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Registry base URL (e.g., "<https://registry.example.com>").
    pub url: String,

    /// Authentication configuration.
    pub auth: RegistryAuth,

    /// Request timeout.
    pub timeout: Duration,

    /// Extra trust roots.
    pub tls: TlsConfig,

    /// User agent string.
    pub user_agent: String,

    /// Plain HTTP base URL tried when `url` cannot be reached over TLS.
    pub plain_http_fallback: Option<String>,
}

impl RegistryConfig {
    /// Creates a new registry configuration with the given base URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use regwatch_registry::RegistryConfig;
    ///
    /// let config = RegistryConfig::new("https://registry.example.com");
    /// assert_eq!(config.url, "https://registry.example.com");
    /// ```
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            auth: RegistryAuth::Anonymous,
            timeout: DEFAULT_TIMEOUT,
            tls: TlsConfig::default(),
            user_agent: format!("regwatch/{}", env!("CARGO_PKG_VERSION")),
            plain_http_fallback: None,
        }
    }

    /// Creates an HTTPS configuration for a registry host.
    ///
    /// Loopback and `.local` hosts also get a plain HTTP fallback, used only
    /// when the TLS connection cannot be established.
    ///
    /// # Examples
    ///
    /// ```
    /// use regwatch_registry::RegistryConfig;
    ///
    /// let config = RegistryConfig::for_host("localhost:5000");
    /// assert_eq!(config.url, "https://localhost:5000");
    /// assert_eq!(config.plain_http_fallback.as_deref(), Some("http://localhost:5000"));
    /// ```
    #[must_use]
    pub fn for_host(host: &str) -> Self {
        let mut config = Self::new(format!("https://{host}"));
        if allows_plain_http(host) {
            config.plain_http_fallback = Some(format!("http://{host}"));
        }
        config
    }

    /// Sets the authentication method.
    #[must_use]
    pub fn with_auth(mut self, auth: RegistryAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the TLS configuration.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    /// Returns the host (and port) of the registry, for messages.
    #[must_use]
    pub fn host(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|url| {
                url.host_str().map(|host| match url.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host.to_string(),
                })
            })
            .unwrap_or_else(|| self.url.clone())
    }
}

/// Authentication methods for registry access.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RegistryAuth {
    /// No credentials; anonymous bearer tokens are still requested on challenge.
    #[default]
    Anonymous,

    /// Basic authentication (username/password or username/token).
    Basic {
        /// Username.
        username: String,
        /// Password or token.
        password: String,
    },
}

impl RegistryAuth {
    /// Creates basic authentication.
    ///
    /// # Examples
    ///
    /// ```
    /// use regwatch_registry::RegistryAuth;
    ///
    /// let auth = RegistryAuth::basic("user", "pass");
    /// assert!(matches!(auth, RegistryAuth::Basic { .. }));
    /// ```
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the basic credentials, if any.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match self {
            Self::Anonymous => None,
            Self::Basic { username, password } => Some((username.as_str(), password.as_str())),
        }
    }
}

impl From<Option<BasicCredentials>> for RegistryAuth {
    fn from(credentials: Option<BasicCredentials>) -> Self {
        credentials.map_or(Self::Anonymous, |c| Self::basic(c.username, c.password))
    }
}

/// Extra certificate authorities trusted for registry connections.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// PEM-encoded CA certificates.
    pub ca_certs: Vec<String>,
}

impl TlsConfig {
    /// Creates an empty TLS configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ca_certs: Vec::new(),
        }
    }

    /// Adds a PEM-encoded CA certificate.
    #[must_use]
    pub fn with_ca_cert(mut self, pem: impl Into<String>) -> Self {
        self.ca_certs.push(pem.into());
        self
    }

    /// Parses the configured certificates.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidCertificate`] for any entry that is
    /// not a PEM certificate.
    pub fn root_certificates(&self) -> Result<Vec<reqwest::Certificate>> {
        self.ca_certs
            .iter()
            .enumerate()
            .map(|(index, pem)| {
                if !pem.contains("-----BEGIN CERTIFICATE-----") {
                    return Err(RegistryError::InvalidCertificate {
                        message: format!("ca_certs[{index}] is not a PEM certificate"),
                    });
                }
                reqwest::Certificate::from_pem(pem.as_bytes()).map_err(|e| {
                    RegistryError::InvalidCertificate {
                        message: format!("ca_certs[{index}]: {e}"),
                    }
                })
            })
            .collect()
    }
}
