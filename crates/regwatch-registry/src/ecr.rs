//! AWS ECR authorization-token exchange.
//!
//! ECR does not accept IAM credentials directly. They are exchanged for a
//! registry password through `GetAuthorizationToken`; the returned token is
//! base64 of `AWS:<password>`.

use aws_config::sts::AssumeRoleProvider;
use aws_config::BehaviorVersion;
use aws_sdk_ecr::config::{Credentials, Region};
use aws_sdk_ecr::error::DisplayErrorContext;
use base64::Engine;
use regwatch_core::{AwsCredentials, BasicCredentials};
use tracing::{debug, info};

use crate::error::{RegistryError, Result};

const SESSION_NAME: &str = "regwatch";

/// Credentials for an ECR registry and the host they are valid for.
#[derive(Debug, Clone)]
pub struct EcrAuthorization {
    /// Basic credentials to present to the registry.
    pub credentials: BasicCredentials,
    /// Registry host of the account, without scheme.
    pub registry: String,
}

impl EcrAuthorization {
    /// Prefixes `repository` with the account registry when it names no host.
    ///
    /// # Examples
    ///
    /// ```
    /// use regwatch_core::BasicCredentials;
    /// use regwatch_registry::EcrAuthorization;
    ///
    /// let auth = EcrAuthorization {
    ///     credentials: BasicCredentials { username: "AWS".into(), password: "pw".into() },
    ///     registry: "123456789012.dkr.ecr.us-east-1.amazonaws.com".into(),
    /// };
    /// assert_eq!(
    ///     auth.qualify_repository("team/app"),
    ///     "123456789012.dkr.ecr.us-east-1.amazonaws.com/team/app"
    /// );
    /// assert_eq!(auth.qualify_repository("other.example.com/app"), "other.example.com/app");
    /// ```
    #[must_use]
    pub fn qualify_repository(&self, repository: &str) -> String {
        let first = repository.split('/').next().unwrap_or_default();
        let has_host = repository.contains('/')
            && (first.contains('.') || first.contains(':') || first == "localhost");

        if has_host || self.registry.is_empty() {
            repository.to_string()
        } else {
            format!("{}/{repository}", self.registry)
        }
    }
}

/// Exchanges AWS credentials for ECR registry credentials.
///
/// When a role is configured it is assumed first, using the static keys as
/// the source identity.
///
/// # Errors
///
/// Returns [`RegistryError::AuthenticationFailed`] if the exchange fails or
/// the token is malformed.
pub async fn authorize(aws: &AwsCredentials) -> Result<EcrAuthorization> {
    let region = Region::new(aws.region.clone());
    let static_credentials = Credentials::new(
        aws.access_key_id.clone(),
        aws.secret_access_key.clone(),
        aws.session_token.clone(),
        None,
        SESSION_NAME,
    );

    let base_config = aws_config::defaults(BehaviorVersion::latest())
        .region(region.clone())
        .credentials_provider(static_credentials)
        .load()
        .await;

    let sdk_config = match &aws.role_arn {
        Some(role_arn) => {
            debug!(role_arn = %role_arn, "Assuming role for ECR token exchange");
            let provider = AssumeRoleProvider::builder(role_arn)
                .session_name(SESSION_NAME)
                .region(region.clone())
                .configure(&base_config)
                .build()
                .await;
            aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(provider)
                .load()
                .await
        }
        None => base_config,
    };

    let client = aws_sdk_ecr::Client::new(&sdk_config);
    let output = client
        .get_authorization_token()
        .send()
        .await
        .map_err(|e| RegistryError::AuthenticationFailed {
            message: format!("ECR GetAuthorizationToken failed: {}", DisplayErrorContext(&e)),
        })?;

    let data = output
        .authorization_data()
        .first()
        .ok_or_else(|| RegistryError::AuthenticationFailed {
            message: "ECR returned no authorization data".to_string(),
        })?;

    let token = data
        .authorization_token()
        .ok_or_else(|| RegistryError::AuthenticationFailed {
            message: "ECR returned no authorization token".to_string(),
        })?;

    let credentials = decode_token(token)?;
    let registry = data
        .proxy_endpoint()
        .map(strip_scheme)
        .unwrap_or_default()
        .to_string();

    info!(registry = %registry, "Obtained ECR registry credentials");
    Ok(EcrAuthorization {
        credentials,
        registry,
    })
}

/// Decodes a base64 `user:password` authorization token.
fn decode_token(token: &str) -> Result<BasicCredentials> {
    let malformed = |reason: &str| RegistryError::AuthenticationFailed {
        message: format!("malformed ECR authorization token: {reason}"),
    };

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(token)
        .map_err(|_| malformed("not base64"))?;
    let decoded = String::from_utf8(decoded).map_err(|_| malformed("not UTF-8"))?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| malformed("missing ':' separator"))?;

    Ok(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

fn strip_scheme(endpoint: &str) -> &str {
    endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .unwrap_or(endpoint)
        .trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_token() {
        let token = base64::engine::general_purpose::STANDARD.encode("AWS:secret-password");
        let credentials = decode_token(&token).unwrap();
        assert_eq!(credentials.username, "AWS");
        assert_eq!(credentials.password, "secret-password");
    }

    #[test]
    fn test_decode_token_malformed() {
        assert!(decode_token("%%%").is_err());

        let no_colon = base64::engine::general_purpose::STANDARD.encode("AWS");
        let err = decode_token(&no_colon).unwrap_err();
        assert!(err.to_string().contains("separator"));
    }

    #[test]
    fn test_strip_scheme() {
        assert_eq!(
            strip_scheme("https://123.dkr.ecr.eu-west-1.amazonaws.com"),
            "123.dkr.ecr.eu-west-1.amazonaws.com"
        );
        assert_eq!(strip_scheme("registry.example.com/"), "registry.example.com");
    }

    #[test]
    fn test_qualify_repository_keeps_docker_hub_style_paths() {
        let auth = EcrAuthorization {
            credentials: BasicCredentials {
                username: "AWS".to_string(),
                password: "pw".to_string(),
            },
            registry: "123.dkr.ecr.eu-west-1.amazonaws.com".to_string(),
        };
        assert_eq!(
            auth.qualify_repository("app"),
            "123.dkr.ecr.eu-west-1.amazonaws.com/app"
        );
        assert_eq!(
            auth.qualify_repository("123.dkr.ecr.eu-west-1.amazonaws.com/app"),
            "123.dkr.ecr.eu-west-1.amazonaws.com/app"
        );
    }
}
