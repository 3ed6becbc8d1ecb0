use super::{AuthRequest, CallbackParams, OAuthClient, OAuthProvider, OAuthToken};
use crate::{backend::utils::error::BackendResult, common::user::OAuthUserInfo};
use async_trait::async_trait;
use serde::Deserialize;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USER_INFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const SCOPE: &str = "openid email profile";

#[derive(Deserialize, Debug)]
struct GoogleUser {
    id: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

pub struct GoogleProvider {
    client: OAuthClient,
}

impl GoogleProvider {
    pub fn new(client: OAuthClient) -> Self {
        GoogleProvider { client }
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn begin_auth(&self, state: &str) -> BackendResult<AuthRequest> {
        Ok(AuthRequest {
            url: self
                .client
                .authorize_url(AUTH_URL, state, SCOPE, &[("access_type", "offline")])?,
            code_verifier: None,
        })
    }

    async fn exchange_code(
        &self,
        params: &CallbackParams,
        _code_verifier: Option<&str>,
    ) -> BackendResult<OAuthToken> {
        self.client.exchange(TOKEN_URL, params, &[]).await
    }

    async fn fetch_user(&self, token: &OAuthToken) -> BackendResult<OAuthUserInfo> {
        let user: GoogleUser = self.client.get_json(USER_INFO_URL, token).await?;
        let email = user.email.filter(|e| !e.is_empty());
        Ok(OAuthUserInfo {
            provider: self.name().to_string(),
            provider_user_id: user.id,
            name: user
                .name
                .filter(|n| !n.is_empty())
                .or_else(|| email.clone())
                .unwrap_or_default(),
            email,
            avatar_url: user.picture.filter(|p| !p.is_empty()),
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token.expires_at,
        })
    }
}
