use super::{success, ApiResult, UserExt};
use crate::{
    backend::{
        database::FolioContext,
        oauth::{generate_state, CallbackParams},
        services,
        utils::{
            config::FolioConfigAuth,
            error::{BackendError, BackendResult},
        },
    },
    common::{user::User, Empty, SuccessResponse},
};
use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    routing::{get, post},
    Json,
    Router,
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    SignedCookieJar,
};
use axum_macros::debug_handler;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use time::Duration;

const STATE_COOKIE: &str = "oauth_state";
const STATE_COOKIE_PATH: &str = "/auth";

/// Stored in a signed cookie between the redirect to the provider and the callback.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct PendingLogin {
    provider: String,
    state: String,
    code_verifier: Option<String>,
}

impl PendingLogin {
    /// Json in base64, so that the cookie value has no quotes or commas.
    fn encode(&self) -> BackendResult<String> {
        Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(self)?))
    }

    fn decode(value: &str) -> Option<Self> {
        let json = URL_SAFE_NO_PAD.decode(value).ok()?;
        serde_json::from_slice(&json).ok()
    }
}

pub fn auth_routes() -> Router<FolioContext> {
    Router::new()
        .route("/me", get(me))
        .route("/logout", post(logout))
        .route("/:provider", get(begin_login))
        .route("/:provider/callback", get(login_callback))
}

fn same_site(value: &str) -> SameSite {
    match value.to_ascii_lowercase().as_str() {
        "strict" => SameSite::Strict,
        "none" => SameSite::None,
        _ => SameSite::Lax,
    }
}

pub(crate) fn session_cookie(config: &FolioConfigAuth, token: String) -> Cookie<'static> {
    let mut cookie = Cookie::build((config.cookie_name.clone(), token))
        .path("/")
        .http_only(config.cookie_http_only)
        .secure(config.cookie_secure)
        .same_site(same_site(&config.cookie_same_site))
        .max_age(Duration::hours(config.session_max_age_hours));
    if !config.cookie_domain.is_empty() && config.cookie_domain != "localhost" {
        cookie = cookie.domain(config.cookie_domain.clone());
    }
    cookie.build()
}

/// Redirects to the login page of the provider.
#[debug_handler]
async fn begin_login(
    State(context): State<FolioContext>,
    Path(provider): Path<String>,
    jar: SignedCookieJar,
) -> BackendResult<(SignedCookieJar, Redirect)> {
    let provider = context.oauth.get(&provider)?;
    let state = generate_state();
    let request = provider.begin_auth(&state)?;
    let pending = PendingLogin {
        provider: provider.name().to_string(),
        state,
        code_verifier: request.code_verifier,
    };
    let cookie = Cookie::build((STATE_COOKIE, pending.encode()?))
        .path(STATE_COOKIE_PATH)
        .http_only(true)
        .secure(context.config.auth.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::minutes(10));
    Ok((jar.add(cookie), Redirect::temporary(&request.url)))
}

#[debug_handler]
async fn login_callback(
    State(context): State<FolioContext>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    jar: SignedCookieJar,
) -> BackendResult<(SignedCookieJar, Redirect)> {
    if let Some(error) = &params.error {
        warn!("Login with {provider} failed: {error}");
        return Err(BackendError::Unauthorized(format!("Login failed: {error}")));
    }
    let pending: PendingLogin = jar
        .get(STATE_COOKIE)
        .and_then(|c| PendingLogin::decode(c.value()))
        .ok_or_else(|| BackendError::bad_request("Login was not started or has expired"))?;
    if pending.provider != provider || params.state.as_deref() != Some(pending.state.as_str()) {
        return Err(BackendError::bad_request("Invalid login state"));
    }

    let provider = context.oauth.get(&provider)?;
    let token = provider
        .exchange_code(&params, pending.code_verifier.as_deref())
        .await?;
    let info = provider.fetch_user(&token).await?;
    let (user, session) = services::auth::login(&context, &info)?;
    info!("Started session for user {}", user.id.0);

    let jar = jar
        .remove(Cookie::build(STATE_COOKIE).path(STATE_COOKIE_PATH))
        .add(session_cookie(&context.config.auth, session.token));
    let target = format!("{}/blog", context.config.oauth.frontend_url());
    Ok((jar, Redirect::to(&target)))
}

#[debug_handler]
async fn me(user: UserExt) -> ApiResult<User> {
    success(user.inner())
}

#[debug_handler]
async fn logout(
    State(context): State<FolioContext>,
    _user: UserExt,
    jar: SignedCookieJar,
) -> BackendResult<(SignedCookieJar, Json<SuccessResponse<Empty>>)> {
    let name = context.config.auth.cookie_name.clone();
    if let Some(cookie) = jar.get(&name) {
        services::auth::logout(&context, cookie.value())?;
    }
    let jar = jar.remove(Cookie::build((name, "")).path("/"));
    Ok((jar, success(Empty {})?))
}
