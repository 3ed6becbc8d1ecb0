use super::{created, success, ApiResult, UserExt};
use crate::{
    backend::{database::FolioContext, services, utils::error::BackendResult},
    common::{
        newtypes::PostId,
        post::{CreatePostParams, ListPostsParams, PostList, PostView, UpdatePostParams},
        Empty,
        SuccessResponse,
    },
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_macros::debug_handler;

#[debug_handler]
pub(super) async fn list_posts(
    State(context): State<FolioContext>,
    user: Option<UserExt>,
    Query(params): Query<ListPostsParams>,
) -> ApiResult<PostList> {
    let user = user.map(UserExt::inner);
    success(services::post::list_posts(&context, &params, user.as_ref())?)
}

#[debug_handler]
pub(super) async fn get_post(
    State(context): State<FolioContext>,
    user: Option<UserExt>,
    Path(slug): Path<String>,
) -> ApiResult<PostView> {
    let user = user.map(UserExt::inner);
    success(services::post::get_post(&context, &slug, user.as_ref())?)
}

#[debug_handler]
pub(super) async fn create_post(
    State(context): State<FolioContext>,
    user: UserExt,
    Json(params): Json<CreatePostParams>,
) -> BackendResult<(StatusCode, Json<SuccessResponse<PostView>>)> {
    created(services::post::create_post(&context, params, &user)?)
}

#[debug_handler]
pub(super) async fn update_post(
    State(context): State<FolioContext>,
    user: UserExt,
    Path(id): Path<PostId>,
    Json(params): Json<UpdatePostParams>,
) -> ApiResult<PostView> {
    success(services::post::update_post(&context, id, params, &user)?)
}

#[debug_handler]
pub(super) async fn delete_post(
    State(context): State<FolioContext>,
    user: UserExt,
    Path(id): Path<PostId>,
) -> ApiResult<Empty> {
    services::post::delete_post(&context, id, &user)?;
    success(Empty {})
}
