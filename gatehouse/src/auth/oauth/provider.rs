//! OAuth provider trait and types

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identity returned by a provider's user endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthUserInfo {
    /// Provider name (e.g., "github")
    pub provider: String,

    /// Account handle the authorized identity is matched on
    pub login: String,

    /// Raw provider-specific data
    pub raw: serde_json::Value,
}

/// OAuth provider trait
///
/// Implementations integrate with one identity provider. Both network calls
/// must treat a non-success response as an error.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Provider name (e.g., "github")
    fn name(&self) -> &str;

    /// Authorization URL the login page links to
    ///
    /// # Arguments
    ///
    /// * `state` - CSRF protection state value
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange an authorization code for an access token
    async fn exchange_code(&self, code: &str) -> Result<String>;

    /// Fetch the identity behind an access token
    async fn get_user_info(&self, access_token: &str) -> Result<OAuthUserInfo>;
}

/// Run the code exchange and identity fetch, each under `timeout`
///
/// An elapsed deadline surfaces as [`Error::Timeout`]; the request is never
/// left waiting on the provider.
pub async fn resolve_identity(
    provider: &dyn OAuthProvider,
    code: &str,
    timeout: Duration,
) -> Result<OAuthUserInfo> {
    let access_token = tokio::time::timeout(timeout, provider.exchange_code(code))
        .await
        .map_err(|_| {
            Error::Timeout(format!("{} token exchange exceeded {:?}", provider.name(), timeout))
        })??;

    tokio::time::timeout(timeout, provider.get_user_info(&access_token))
        .await
        .map_err(|_| {
            Error::Timeout(format!("{} user lookup exceeded {:?}", provider.name(), timeout))
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowProvider;

    #[async_trait]
    impl OAuthProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        fn authorization_url(&self, state: &str) -> String {
            format!("https://idp.test/authorize?state={}", state)
        }

        async fn exchange_code(&self, _code: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("token".to_string())
        }

        async fn get_user_info(&self, _access_token: &str) -> Result<OAuthUserInfo> {
            unreachable!("exchange never completes")
        }
    }

    struct RejectingProvider;

    #[async_trait]
    impl OAuthProvider for RejectingProvider {
        fn name(&self) -> &str {
            "rejecting"
        }

        fn authorization_url(&self, _state: &str) -> String {
            String::new()
        }

        async fn exchange_code(&self, _code: &str) -> Result<String> {
            Err(Error::External("bad_verification_code".to_string()))
        }

        async fn get_user_info(&self, _access_token: &str) -> Result<OAuthUserInfo> {
            unreachable!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exchange_timeout() {
        let result = resolve_identity(&SlowProvider, "code", Duration::from_secs(10)).await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test]
    async fn test_exchange_failure_propagates() {
        let result =
            resolve_identity(&RejectingProvider, "code", Duration::from_secs(10)).await;
        assert!(matches!(result, Err(Error::External(_))));
    }
}
