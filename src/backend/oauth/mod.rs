use crate::{
    backend::utils::{
        config::{FolioConfigOAuth, FolioConfigOAuthProvider},
        error::{BackendError, BackendResult},
    },
    common::user::OAuthUserInfo,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use github::GithubProvider;
use google::GoogleProvider;
use log::warn;
use reqwest::{header::ACCEPT, Client};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};
use url::Url;
use vk::VkProvider;

pub mod github;
pub mod google;
pub mod pkce;
pub mod vk;

/// Where to send the user to log in at the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthRequest {
    pub url: String,
    /// PKCE verifier which must be kept until the callback
    pub code_verifier: Option<String>,
}

/// Query parameters of the redirect back from the provider.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub device_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Some providers return the email with the token instead of the user info.
    pub email: Option<String>,
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    email: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Name used in the login urls, eg `github` in `/auth/github`.
    fn name(&self) -> &str;

    fn begin_auth(&self, state: &str) -> BackendResult<AuthRequest>;

    async fn exchange_code(
        &self,
        params: &CallbackParams,
        code_verifier: Option<&str>,
    ) -> BackendResult<OAuthToken>;

    async fn fetch_user(&self, token: &OAuthToken) -> BackendResult<OAuthUserInfo>;
}

/// Enabled OAuth providers by name.
#[derive(Default)]
pub struct OAuthRegistry {
    providers: BTreeMap<String, Box<dyn OAuthProvider>>,
}

impl OAuthRegistry {
    pub fn from_config(config: &FolioConfigOAuth) -> BackendResult<Self> {
        let mut registry = OAuthRegistry::default();
        let http = http_client()?;
        if config.google.enabled {
            registry.insert(Box::new(GoogleProvider::new(
                OAuthClient::new(&config.google, config.callback_url("google"), http.clone()),
            )));
        }
        if config.github.enabled {
            registry.insert(Box::new(GithubProvider::new(
                OAuthClient::new(&config.github, config.callback_url("github"), http.clone()),
            )));
        }
        if config.vk.enabled {
            let callback_url = config.callback_url("vk");
            if callback_url.contains(":8080") {
                warn!("VK may reject callback urls with explicit port: {callback_url}");
            }
            registry.insert(Box::new(VkProvider::new(OAuthClient::new(
                &config.vk,
                callback_url,
                http,
            ))));
        }
        if registry.providers.is_empty() {
            warn!("No OAuth providers enabled, login is not possible");
        }
        Ok(registry)
    }

    pub fn insert(&mut self, provider: Box<dyn OAuthProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> BackendResult<&dyn OAuthProvider> {
        self.providers
            .get(name)
            .map(|p| p.as_ref())
            .ok_or_else(|| BackendError::not_found("OAuth provider"))
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}

/// Random value which ties the provider callback to the login request.
pub fn generate_state() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

fn http_client() -> BackendResult<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(10))
        .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Endpoints and credentials for the authorization code flow, shared by all providers.
pub struct OAuthClient {
    pub client_id: String,
    client_secret: String,
    pub redirect_url: String,
    pub http: Client,
}

impl OAuthClient {
    pub fn new(config: &FolioConfigOAuthProvider, redirect_url: String, http: Client) -> Self {
        OAuthClient {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_url,
            http,
        }
    }

    pub fn authorize_url(
        &self,
        auth_url: &str,
        state: &str,
        scope: &str,
        extra: &[(&str, &str)],
    ) -> BackendResult<String> {
        let mut params = vec![
            ("response_type", "code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_url.as_str()),
            ("scope", scope),
            ("state", state),
        ];
        params.extend_from_slice(extra);
        Ok(Url::parse_with_params(auth_url, params)?.to_string())
    }

    /// Exchanges the authorization code from the callback for an access token.
    pub async fn exchange(
        &self,
        token_url: &str,
        params: &CallbackParams,
        extra: &[(&str, &str)],
    ) -> BackendResult<OAuthToken> {
        if let Some(error) = &params.error {
            return Err(BackendError::Unauthorized(format!(
                "Login was rejected by provider: {error}"
            )));
        }
        let code = params
            .code
            .as_deref()
            .ok_or_else(|| BackendError::bad_request("Missing authorization code"))?;
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_url.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        form.extend_from_slice(extra);
        let res = self
            .http
            .post(token_url)
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await?;
        let status = res.status();
        let token: TokenResponse = res.json().await?;
        match token.access_token {
            Some(access_token) if status.is_success() && !access_token.is_empty() => {
                Ok(OAuthToken {
                    access_token,
                    refresh_token: token.refresh_token.filter(|t| !t.is_empty()),
                    expires_at: token
                        .expires_in
                        .filter(|e| *e > 0)
                        .map(|e| Utc::now() + TimeDelta::seconds(e)),
                    email: token.email.filter(|e| !e.is_empty()),
                })
            }
            _ => {
                warn!(
                    "Token exchange at {token_url} failed with {status}: {} {}",
                    token.error.unwrap_or_default(),
                    token.error_description.unwrap_or_default()
                );
                Err(BackendError::Unauthorized(
                    "Failed to exchange authorization code".to_string(),
                ))
            }
        }
    }

    /// Fetches json from a provider api with the access token.
    pub async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        token: &OAuthToken,
    ) -> BackendResult<T> {
        let res = self
            .http
            .get(url)
            .bearer_auth(&token.access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        if !res.status().is_success() {
            warn!("Request to {url} failed with {}", res.status());
            return Err(BackendError::Unauthorized(
                "Failed to fetch user information".to_string(),
            ));
        }
        Ok(res.json().await?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn client() -> BackendResult<OAuthClient> {
        let config = FolioConfigOAuthProvider {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            enabled: true,
        };
        Ok(OAuthClient::new(
            &config,
            "http://localhost:8080/auth/test/callback".to_string(),
            http_client()?,
        ))
    }

    #[test]
    fn test_authorize_url() -> BackendResult<()> {
        let url = client()?.authorize_url(
            "https://example.com/authorize",
            "abc",
            "email profile",
            &[("code_challenge_method", "S256")],
        )?;
        let url = Url::parse(&url)?;
        let query: BTreeMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(Some(&"abc".to_string()), query.get("state"));
        assert_eq!(Some(&"id".to_string()), query.get("client_id"));
        assert_eq!(Some(&"email profile".to_string()), query.get("scope"));
        assert_eq!(
            Some(&"http://localhost:8080/auth/test/callback".to_string()),
            query.get("redirect_uri")
        );
        assert_eq!(Some(&"S256".to_string()), query.get("code_challenge_method"));
        assert!(!query.contains_key("client_secret"));
        Ok(())
    }

    #[tokio::test]
    async fn test_exchange_rejected_by_provider() -> BackendResult<()> {
        let params = CallbackParams {
            error: Some("access_denied".to_string()),
            ..Default::default()
        };
        let res = client()?
            .exchange("http://localhost:1/token", &params, &[])
            .await;
        assert!(matches!(res, Err(BackendError::Unauthorized(_))));
        Ok(())
    }

    #[test]
    fn test_registry_from_config() -> BackendResult<()> {
        let mut config = FolioConfigOAuth::default();
        assert!(OAuthRegistry::from_config(&config)?.names().is_empty());

        config.github.enabled = true;
        config.vk.enabled = true;
        let registry = OAuthRegistry::from_config(&config)?;
        assert_eq!(vec!["github", "vk"], registry.names());
        assert!(registry.get("google").is_err());
        assert_eq!("vk", registry.get("vk")?.name());
        Ok(())
    }

    #[test]
    fn test_generate_state() {
        assert_eq!(32, generate_state().len());
    }
}
