//! GitHub OAuth provider implementation

use async_trait::async_trait;
use oauth2::{
    basic::BasicErrorResponse, AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret,
    CsrfToken, EmptyExtraTokenFields, RedirectUrl, StandardRevocableToken,
    StandardTokenIntrospectionResponse, StandardTokenResponse, TokenResponse, TokenUrl,
};
use reqwest::Client as HttpClient;

use super::provider::{OAuthProvider, OAuthUserInfo};
use crate::config::GithubConfig;
use crate::error::{Error, Result};

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_URL: &str = "https://api.github.com/user";

/// Type alias for our configured OAuth client
type ConfiguredClient = Client<
    BasicErrorResponse,
    StandardTokenResponse<EmptyExtraTokenFields, oauth2::basic::BasicTokenType>,
    StandardTokenIntrospectionResponse<EmptyExtraTokenFields, oauth2::basic::BasicTokenType>,
    StandardRevocableToken,
    BasicErrorResponse,
    oauth2::EndpointSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointSet,
>;

/// GitHub OAuth provider
///
/// No scopes are requested: the public profile is enough to read `login`.
#[derive(Clone)]
pub struct GitHubProvider {
    client: ConfiguredClient,
    http_client: HttpClient,
}

impl GitHubProvider {
    /// Create a new GitHub OAuth provider from configuration
    pub fn new(config: &GithubConfig) -> Result<Self> {
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            return Err(Error::InvalidConfig(
                "auth.github.client_id and auth.github.client_secret are required in github mode"
                    .to_string(),
            ));
        }

        let client = Client::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(
                AuthUrl::new(AUTHORIZE_URL.to_string())
                    .map_err(|e| Error::Internal(format!("Invalid GitHub auth URL: {}", e)))?,
            )
            .set_token_uri(
                TokenUrl::new(TOKEN_URL.to_string())
                    .map_err(|e| Error::Internal(format!("Invalid GitHub token URL: {}", e)))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_uri.clone())
                    .map_err(|e| Error::InvalidConfig(format!("Invalid redirect URI: {}", e)))?,
            );

        // GitHub rejects API calls without a user agent
        let http_client = HttpClient::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("gatehouse/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            http_client,
        })
    }
}

#[async_trait]
impl OAuthProvider for GitHubProvider {
    fn name(&self) -> &str {
        "github"
    }

    fn authorization_url(&self, state: &str) -> String {
        let (url, _) = self
            .client
            .authorize_url(|| CsrfToken::new(state.to_string()))
            .url();
        url.to_string()
    }

    async fn exchange_code(&self, code: &str) -> Result<String> {
        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| Error::External(format!("GitHub token exchange failed: {}", e)))?;

        Ok(token_result.access_token().secret().clone())
    }

    async fn get_user_info(&self, access_token: &str) -> Result<OAuthUserInfo> {
        let response = self
            .http_client
            .get(USER_URL)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| Error::External(format!("Failed to fetch GitHub user info: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "GitHub user info request failed: {} - {}",
                status, body
            )));
        }

        let user_info: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::External(format!("Failed to parse GitHub user info: {}", e)))?;

        let login = user_info["login"]
            .as_str()
            .filter(|login| !login.is_empty())
            .ok_or_else(|| Error::External("Missing login in GitHub response".to_string()))?
            .to_string();

        Ok(OAuthUserInfo {
            provider: "github".to_string(),
            login,
            raw: user_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GithubConfig {
        GithubConfig {
            client_id: "test-client-id".to_string(),
            client_secret: "test-secret".to_string(),
            redirect_uri: "https://portal.example.com/oauth-callback".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_authorization_url_generation() {
        let provider = GitHubProvider::new(&config()).unwrap();
        let url = provider.authorization_url("test-state");

        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=test-client-id"));
        assert!(url.contains("state=test-state"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fportal.example.com%2Foauth-callback"));
    }

    #[test]
    fn test_provider_name() {
        let provider = GitHubProvider::new(&config()).unwrap();
        assert_eq!(provider.name(), "github");
    }

    #[test]
    fn test_missing_client_settings() {
        let result = GitHubProvider::new(&GithubConfig::default());
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_redirect_uri() {
        let mut config = config();
        config.redirect_uri = "not a url".to_string();
        assert!(GitHubProvider::new(&config).is_err());
    }
}
