use super::{AuthRequest, CallbackParams, OAuthClient, OAuthProvider, OAuthToken};
use crate::{backend::utils::error::BackendResult, common::user::OAuthUserInfo};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

const AUTH_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_URL: &str = "https://api.github.com/user";
const EMAILS_URL: &str = "https://api.github.com/user/emails";
const SCOPE: &str = "user:email";

#[derive(Deserialize, Debug)]
struct GithubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

/// Users can hide their email in the profile, then it needs to be fetched separately.
fn primary_email(emails: Vec<GithubEmail>) -> Option<String> {
    let mut verified = emails.into_iter().filter(|e| e.verified);
    let first = verified.next()?;
    if first.primary {
        return Some(first.email);
    }
    Some(verified.find(|e| e.primary).unwrap_or(first).email)
}

pub struct GithubProvider {
    client: OAuthClient,
}

impl GithubProvider {
    pub fn new(client: OAuthClient) -> Self {
        GithubProvider { client }
    }
}

#[async_trait]
impl OAuthProvider for GithubProvider {
    fn name(&self) -> &str {
        "github"
    }

    fn begin_auth(&self, state: &str) -> BackendResult<AuthRequest> {
        Ok(AuthRequest {
            url: self.client.authorize_url(AUTH_URL, state, SCOPE, &[])?,
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
        let user: GithubUser = self.client.get_json(USER_URL, token).await?;
        let mut email = user.email.filter(|e| !e.is_empty());
        if email.is_none() {
            debug!("Github user {} has no public email", user.login);
            let emails: Vec<GithubEmail> = self.client.get_json(EMAILS_URL, token).await?;
            email = primary_email(emails);
        }
        Ok(OAuthUserInfo {
            provider: self.name().to_string(),
            provider_user_id: user.id.to_string(),
            name: user.name.filter(|n| !n.is_empty()).unwrap_or(user.login),
            email,
            avatar_url: user.avatar_url.filter(|a| !a.is_empty()),
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token.expires_at,
        })
    }
}
