use crate::{
    backend::{database::FolioContext, services::auth::validate_session, utils::error::BackendError},
    common::user::User,
};
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::SignedCookieJar;
use axum_macros::debug_middleware;
use log::{info, warn};
use std::{net::SocketAddr, time::Instant};

/// Reads the signed session cookie. If it belongs to a valid session, the `User` is added to
/// the request extensions.
#[debug_middleware]
pub(super) async fn auth_middleware(
    State(context): State<FolioContext>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let jar = SignedCookieJar::from_headers(request.headers(), context.cookie_key.clone());
    if let Some(cookie) = jar.get(&context.config.auth.cookie_name) {
        match validate_session(&context, cookie.value()) {
            Ok(Some(user)) => {
                request.extensions_mut().insert(user);
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to validate session: {e}"),
        }
    }
    next.run(request).await
}

/// Rejects requests without a logged in admin.
#[debug_middleware]
pub(super) async fn admin_middleware(request: Request<Body>, next: Next) -> Response {
    let is_admin = request.extensions().get::<User>().map(User::is_admin);
    match is_admin {
        None => BackendError::unauthorized().into_response(),
        Some(false) => BackendError::permission_denied("Admin role required").into_response(),
        Some(true) => next.run(request).await,
    }
}

/// Fixed window rate limit per client ip.
#[debug_middleware]
pub(super) async fn rate_limit_middleware(
    State(context): State<FolioContext>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    if let Err(e) = context.rate_limiter.check(&ip) {
        info!("Rate limit exceeded for {ip}");
        return e.into_response();
    }
    next.run(request).await
}

#[debug_middleware]
pub(super) async fn log_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();
    let response = next.run(request).await;
    info!(
        "{method} {path} {} {:?}",
        response.status().as_u16(),
        start.elapsed()
    );
    response
}
