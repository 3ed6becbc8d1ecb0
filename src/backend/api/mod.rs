use crate::{
    backend::{
        database::FolioContext,
        services::media::{IMAGE_MAX_SIZE, MEDIA_MAX_SIZE},
        utils::error::{BackendError, BackendResult},
    },
    common::{user::User, HealthStatus, SuccessResponse},
};
use axum::{
    body::Bytes,
    extract::{rejection::ExtensionRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Extension,
    Json,
    Router,
};
use axum_macros::{debug_handler, FromRequestParts};
use log::warn;
use std::ops::Deref;

pub(super) mod auth;
mod comment;
mod like;
mod media;
mod post;
mod profile;

/// Extra room for multipart boundaries and headers on top of the file size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub(crate) type ApiResult<T> = BackendResult<Json<SuccessResponse<T>>>;

pub(crate) fn success<T>(data: T) -> ApiResult<T> {
    Ok(Json(SuccessResponse::new(data)))
}

pub(crate) fn created<T>(data: T) -> BackendResult<(StatusCode, Json<SuccessResponse<T>>)> {
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(data))))
}

pub fn api_routes() -> Router<FolioContext> {
    Router::new()
        .route("/profile", get(profile::get_profile))
        .route("/posts", get(post::list_posts))
        .route("/posts/:post", get(post::get_post))
        .route(
            "/posts/:post/comments",
            get(comment::list_comments).post(comment::create_comment),
        )
        .route("/posts/:post/like", post(like::like_post))
        .route("/posts/:post/likes", get(like::post_likes))
        .route(
            "/comments/:comment",
            put(comment::update_comment).delete(comment::delete_comment),
        )
        .route("/comments/:comment/like", post(like::like_comment))
        .route("/comments/:comment/likes", get(like::comment_likes))
        .route("/media/:media", get(media::get_media))
}

/// Routes which require the admin role, checked by middleware.
pub fn admin_routes() -> Router<FolioContext> {
    Router::new()
        .route("/profile", put(profile::update_profile))
        .route("/posts", post(post::create_post))
        .route(
            "/posts/:post",
            put(post::update_post).delete(post::delete_post),
        )
        .route(
            "/media",
            get(media::list_media)
                .post(media::upload_media)
                .layer(DefaultBodyLimit::max(
                    MEDIA_MAX_SIZE + MULTIPART_OVERHEAD,
                )),
        )
        .route("/media/:media", delete(media::delete_media))
        .route(
            "/upload",
            post(media::upload_image).layer(DefaultBodyLimit::max(
                IMAGE_MAX_SIZE + MULTIPART_OVERHEAD,
            )),
        )
}

pub fn health_routes() -> Router<FolioContext> {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
}

#[debug_handler]
async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
    })
}

#[debug_handler]
async fn ready(State(context): State<FolioContext>) -> BackendResult<Json<HealthStatus>> {
    if let Err(e) = context.store.ping() {
        warn!("Readiness check failed: {e}");
        return Err(BackendError::ServiceUnavailable(
            "Database is not available".to_string(),
        ));
    }
    Ok(Json(HealthStatus {
        status: "ready".to_string(),
    }))
}

/// Reads the multipart field `file`, returning its file name and content.
async fn read_file_field(mut multipart: Multipart) -> BackendResult<(String, Bytes)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| BackendError::bad_request(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| BackendError::bad_request(e.body_text()))?;
        return Ok((filename, data));
    }
    Err(BackendError::validation("file", "is required"))
}

/// The logged in user, set by the session middleware.
#[derive(FromRequestParts)]
#[from_request(rejection(NotLoggedInError))]
pub struct UserExt {
    #[from_request(via(Extension))]
    user: User,
}

impl UserExt {
    pub fn inner(self) -> User {
        self.user
    }
}

impl Deref for UserExt {
    type Target = User;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl From<ExtensionRejection> for NotLoggedInError {
    fn from(_: ExtensionRejection) -> Self {
        NotLoggedInError
    }
}

pub struct NotLoggedInError;

impl IntoResponse for NotLoggedInError {
    fn into_response(self) -> axum::response::Response {
        BackendError::unauthorized().into_response()
    }
}
