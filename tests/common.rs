#![expect(clippy::unwrap_used)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use folio::{
    backend::{
        database::{memory::MemoryStore, FolioContext},
        oauth::{AuthRequest, CallbackParams, OAuthProvider, OAuthRegistry, OAuthToken},
        start_with_context,
        utils::{
            config::FolioConfig,
            error::{BackendError, BackendResult},
        },
    },
    common::{user::OAuthUserInfo, SuccessResponse},
};
use log::LevelFilter;
use reqwest::{header::LOCATION, redirect::Policy, Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
    Once,
};
use tokio::{sync::oneshot, task::JoinHandle};
use url::Url;

pub const ADMIN_EMAIL: &str = "admin@example.com";

/// Login provider which accepts any code and treats it as the email of the user.
struct FakeProvider {
    base_url: String,
}

#[async_trait]
impl OAuthProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn begin_auth(&self, state: &str) -> BackendResult<AuthRequest> {
        Ok(AuthRequest {
            url: format!("{}/auth/fake/callback?state={state}", self.base_url),
            code_verifier: None,
        })
    }

    async fn exchange_code(
        &self,
        params: &CallbackParams,
        _code_verifier: Option<&str>,
    ) -> BackendResult<OAuthToken> {
        let code = params
            .code
            .clone()
            .ok_or_else(|| BackendError::bad_request("Missing code"))?;
        Ok(OAuthToken {
            access_token: code,
            ..Default::default()
        })
    }

    async fn fetch_user(&self, token: &OAuthToken) -> BackendResult<OAuthUserInfo> {
        let email = token.access_token.clone();
        Ok(OAuthUserInfo {
            provider: "fake".to_string(),
            provider_user_id: email.clone(),
            name: email.split('@').next().unwrap_or_default().to_string(),
            email: Some(email),
            access_token: token.access_token.clone(),
            ..Default::default()
        })
    }
}

pub struct TestServer {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Starts a server with the default test config, modified by `configure`.
    pub async fn start_with(configure: impl FnOnce(&mut FolioConfig)) -> Self {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            env_logger::builder()
                .filter_level(LevelFilter::Warn)
                //.filter_module("folio", LevelFilter::Info)
                .init();
        });

        // Run things on different ports to allow parallel tests
        static COUNTER: AtomicI32 = AtomicI32::new(0);
        let port = 8200 + COUNTER.fetch_add(1, Ordering::Relaxed);
        let base_url = format!("http://localhost:{port}");

        let mut config = FolioConfig::default();
        config.database.in_memory = true;
        config.oauth.base_url = base_url.clone();
        config.auth.admin_emails = ADMIN_EMAIL.to_string();
        config.rate_limit.enabled = false;
        config.media.upload_path = std::env::temp_dir()
            .join(format!("folio-test-{port}"))
            .to_string_lossy()
            .into_owned();
        configure(&mut config);

        let mut oauth = OAuthRegistry::default();
        oauth.insert(Box::new(FakeProvider {
            base_url: base_url.clone(),
        }));
        let context = FolioContext::new(config, Arc::new(MemoryStore::new()), oauth);

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::task::spawn(async move {
            let addr = format!("127.0.0.1:{port}").parse().unwrap();
            start_with_context(context, Some(addr), Some(tx))
                .await
                .unwrap();
        });
        // wait for the backend to start
        rx.await.unwrap();
        Self { base_url, handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }

    pub fn client() -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()
            .unwrap()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Goes through the login redirects with the given email, the session cookie ends up in the
    /// cookie store of `client`.
    pub async fn login(&self, client: &Client, email: &str) -> Result<()> {
        let res = client.get(self.url("/auth/fake")).send().await?;
        assert_eq!(StatusCode::TEMPORARY_REDIRECT, res.status());
        let location = res
            .headers()
            .get(LOCATION)
            .ok_or(anyhow!("missing location"))?
            .to_str()?;
        let mut callback = Url::parse(location)?;
        callback.query_pairs_mut().append_pair("code", email);

        let res = client.get(callback).send().await?;
        assert_eq!(StatusCode::SEE_OTHER, res.status());
        assert_eq!(
            Some(self.url("/blog").as_str()),
            res.headers().get(LOCATION).and_then(|l| l.to_str().ok())
        );
        Ok(())
    }
}

/// Checks the status and returns the `data` of the response envelope.
pub async fn data<T: DeserializeOwned>(res: reqwest::Response, status: StatusCode) -> Result<T> {
    let actual = res.status();
    let text = res.text().await?;
    if actual != status {
        return Err(anyhow!("expected {status}, got {actual}: {text}"));
    }
    let envelope: SuccessResponse<T> = serde_json::from_str(&text)?;
    assert!(envelope.success);
    Ok(envelope.data)
}
