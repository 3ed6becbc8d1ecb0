use super::{
    pkce::{code_challenge, generate_code_verifier},
    AuthRequest,
    CallbackParams,
    OAuthClient,
    OAuthProvider,
    OAuthToken,
};
use crate::{
    backend::utils::error::{BackendError, BackendResult},
    common::user::OAuthUserInfo,
};
use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;

const AUTH_URL: &str = "https://id.vk.ru/authorize";
const TOKEN_URL: &str = "https://id.vk.com/oauth2/auth";
const USER_INFO_URL: &str = "https://id.vk.ru/oauth2/user_info";
const SCOPE: &str = "email vkid.personal_info";

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum VkUserId {
    Text(String),
    Number(i64),
}

impl VkUserId {
    fn into_string(self) -> String {
        match self {
            VkUserId::Text(id) => id,
            VkUserId::Number(id) => id.to_string(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct VkUserInfo {
    user: VkUser,
}

#[derive(Deserialize, Debug)]
struct VkUser {
    user_id: VkUserId,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    avatar: Option<String>,
    picture: Option<String>,
    email: Option<String>,
}

/// VK ID, using OAuth 2.1 with PKCE. The callback carries a `device_id` which has to be passed
/// on to the token exchange.
pub struct VkProvider {
    client: OAuthClient,
}

impl VkProvider {
    pub fn new(client: OAuthClient) -> Self {
        VkProvider { client }
    }

    fn user_info(&self, info: VkUserInfo, token: &OAuthToken) -> OAuthUserInfo {
        let user = info.user;
        let email = user
            .email
            .filter(|e| !e.is_empty())
            .or_else(|| token.email.clone());
        if email.is_none() {
            warn!("VK ID returned no email");
        }
        OAuthUserInfo {
            provider: self.name().to_string(),
            provider_user_id: user.user_id.into_string(),
            email,
            name: format!("{} {}", user.first_name, user.last_name)
                .trim()
                .to_string(),
            avatar_url: user
                .avatar
                .filter(|a| !a.is_empty())
                .or(user.picture.filter(|p| !p.is_empty())),
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token.expires_at,
        }
    }
}

#[async_trait]
impl OAuthProvider for VkProvider {
    fn name(&self) -> &str {
        "vk"
    }

    fn begin_auth(&self, state: &str) -> BackendResult<AuthRequest> {
        let verifier = generate_code_verifier();
        let challenge = code_challenge(&verifier);
        let url = self.client.authorize_url(
            AUTH_URL,
            state,
            SCOPE,
            &[
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )?;
        Ok(AuthRequest {
            url,
            code_verifier: Some(verifier),
        })
    }

    async fn exchange_code(
        &self,
        params: &CallbackParams,
        code_verifier: Option<&str>,
    ) -> BackendResult<OAuthToken> {
        let code_verifier = code_verifier
            .ok_or_else(|| BackendError::bad_request("Missing PKCE code verifier"))?;
        let device_id = params.device_id.as_deref().unwrap_or_default();
        if device_id.is_empty() {
            warn!("VK ID callback without device_id");
        }
        let state = params.state.as_deref().unwrap_or_default();
        self.client
            .exchange(
                TOKEN_URL,
                params,
                &[
                    ("code_verifier", code_verifier),
                    ("device_id", device_id),
                    ("state", state),
                ],
            )
            .await
    }

    async fn fetch_user(&self, token: &OAuthToken) -> BackendResult<OAuthUserInfo> {
        let url = format!("{USER_INFO_URL}?client_id={}", self.client.client_id);
        let info: VkUserInfo = self.client.get_json(&url, token).await?;
        debug!("Fetched VK ID user {:?}", info.user.user_id);
        Ok(self.user_info(info, token))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::utils::config::FolioConfigOAuthProvider;
    use pretty_assertions::assert_eq;
    use reqwest::Client;
    use std::collections::BTreeMap;
    use url::Url;

    fn provider() -> VkProvider {
        let config = FolioConfigOAuthProvider {
            client_id: "51234".to_string(),
            client_secret: "secret".to_string(),
            enabled: true,
        };
        VkProvider::new(OAuthClient::new(
            &config,
            "https://blog.example.com/auth/vk/callback".to_string(),
            Client::new(),
        ))
    }

    #[test]
    fn test_begin_auth_uses_pkce() -> BackendResult<()> {
        let request = provider().begin_auth("state123")?;
        let Some(verifier) = request.code_verifier else {
            panic!("missing code verifier");
        };
        let url = Url::parse(&request.url)?;
        assert_eq!(Some("id.vk.ru"), url.host_str());
        let query: BTreeMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(Some(&code_challenge(&verifier)), query.get("code_challenge"));
        assert_eq!(Some(&"S256".to_string()), query.get("code_challenge_method"));
        assert_eq!(Some(&SCOPE.to_string()), query.get("scope"));
        assert_eq!(Some(&"state123".to_string()), query.get("state"));
        Ok(())
    }

    #[test]
    fn test_user_info_mapping() -> BackendResult<()> {
        let info: VkUserInfo = serde_json::from_str(
            r#"{"user":{"user_id":"1234567","first_name":"Ivan","last_name":"Petrov",
            "avatar":"https://vk.com/a.jpg","email":""}}"#,
        )?;
        let token = OAuthToken {
            access_token: "token".to_string(),
            email: Some("ivan@example.com".to_string()),
            ..Default::default()
        };
        let user = provider().user_info(info, &token);
        assert_eq!("1234567", user.provider_user_id);
        assert_eq!("Ivan Petrov", user.name);
        assert_eq!(Some("ivan@example.com".to_string()), user.email);
        assert_eq!(Some("https://vk.com/a.jpg".to_string()), user.avatar_url);

        let info: VkUserInfo =
            serde_json::from_str(r#"{"user":{"user_id":42,"first_name":"Anna"}}"#)?;
        let user = provider().user_info(info, &OAuthToken::default());
        assert_eq!("42", user.provider_user_id);
        assert_eq!("Anna", user.name);
        assert_eq!(None, user.email);
        Ok(())
    }
}
