//! Token authentication against registry auth servers.
//!
//! Registries answer an unauthenticated request with `401` and a
//! `WWW-Authenticate` challenge. A `Bearer` challenge names a token realm;
//! the client exchanges its (possibly anonymous) credentials there for a
//! short-lived token and repeats the request.

use reqwest::header::WWW_AUTHENTICATE;
use serde::Deserialize;
use tracing::debug;

use crate::config::RegistryAuth;
use crate::error::{RegistryError, Result};

/// A parsed `WWW-Authenticate` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    /// Token authentication.
    Bearer {
        /// Token endpoint.
        realm: String,
        /// Service the token is for.
        service: Option<String>,
        /// Requested scope.
        scope: Option<String>,
    },
    /// HTTP basic authentication.
    Basic,
}

impl Challenge {
    /// Parses a challenge header value.
    ///
    /// # Examples
    ///
    /// ```
    /// use regwatch_registry::auth::Challenge;
    ///
    /// let challenge = Challenge::parse(
    ///     r#"Bearer realm="https://auth.docker.io/token",service="registry.docker.io""#,
    /// )
    /// .unwrap();
    /// assert!(matches!(challenge, Challenge::Bearer { ref realm, .. } if realm == "https://auth.docker.io/token"));
    /// ```
    #[must_use]
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(' ').unwrap_or((header, ""));

        if scheme.eq_ignore_ascii_case("basic") {
            return Some(Self::Basic);
        }
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for (key, value) in parse_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }

        Some(Self::Bearer {
            realm: realm?,
            service,
            scope,
        })
    }

    /// Extracts the challenge from a response, if it carries one.
    #[must_use]
    pub fn from_response(response: &reqwest::Response) -> Option<Self> {
        response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .and_then(Self::parse)
    }
}

/// Splits `key="value", key=value` pairs, honoring commas inside quotes.
fn parse_params(params: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut rest = params.trim();

    while !rest.is_empty() {
        let Some((key, after_key)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().trim_start_matches(',').trim().to_string();

        let (value, remainder) = if let Some(quoted) = after_key.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after_key.find(',') {
                Some(end) => (&after_key[..end], &after_key[end..]),
                None => (after_key, ""),
            }
        };

        pairs.push((key, value.trim().to_string()));
        rest = remainder.trim_start().trim_start_matches(',').trim_start();
    }

    pairs
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Requests a pull token for `repository` from the challenge's realm.
///
/// # Errors
///
/// Returns [`RegistryError::AuthenticationFailed`] if the realm is not a
/// URL, the auth server rejects the credentials, or it returns no token.
pub async fn fetch_token(
    http: &reqwest::Client,
    realm: &str,
    service: Option<&str>,
    scope: Option<&str>,
    repository: &str,
    auth: &RegistryAuth,
) -> Result<String> {
    let mut url = url::Url::parse(realm).map_err(|e| RegistryError::AuthenticationFailed {
        message: format!("invalid token realm '{realm}': {e}"),
    })?;

    let default_scope = format!("repository:{repository}:pull");
    {
        let mut query = url.query_pairs_mut();
        if let Some(service) = service {
            query.append_pair("service", service);
        }
        query.append_pair("scope", scope.unwrap_or(&default_scope));
    }

    debug!(realm, repository, "Requesting registry token");

    let mut request = http.get(url);
    if let Some((username, password)) = auth.credentials() {
        request = request.basic_auth(username, Some(password));
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RegistryError::AuthenticationFailed {
            message: format!("token request to {realm} returned {status}: {}", body.trim()),
        });
    }

    let token: TokenResponse = response.json().await?;
    token
        .token
        .or(token.access_token)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| RegistryError::AuthenticationFailed {
            message: format!("token response from {realm} contained no token"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer_with_quoted_commas() {
        let challenge = Challenge::parse(
            r#"Bearer realm="https://auth.example.com/token",service="registry.example.com",scope="repository:team/app:pull,push""#,
        )
        .unwrap();

        assert_eq!(
            challenge,
            Challenge::Bearer {
                realm: "https://auth.example.com/token".to_string(),
                service: Some("registry.example.com".to_string()),
                scope: Some("repository:team/app:pull,push".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_bearer_unquoted_and_spaced() {
        let challenge =
            Challenge::parse("Bearer realm=https://auth.example.com/token, service=registry").unwrap();
        assert_eq!(
            challenge,
            Challenge::Bearer {
                realm: "https://auth.example.com/token".to_string(),
                service: Some("registry".to_string()),
                scope: None,
            }
        );
    }

    #[test]
    fn test_parse_basic_and_unknown() {
        assert_eq!(Challenge::parse(r#"Basic realm="Registry""#), Some(Challenge::Basic));
        assert_eq!(Challenge::parse("Negotiate"), None);
        assert_eq!(Challenge::parse(r#"Bearer service="x""#), None);
    }
}
