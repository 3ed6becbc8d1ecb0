use super::{created, success, ApiResult, UserExt};
use crate::{
    backend::{database::FolioContext, services, utils::error::BackendResult},
    common::{
        comment::{Comment, CommentView, CreateCommentParams, UpdateCommentParams},
        newtypes::CommentId,
        Empty,
        SuccessResponse,
    },
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_macros::debug_handler;

/// All comments of a post as a tree of replies.
#[debug_handler]
pub(super) async fn list_comments(
    State(context): State<FolioContext>,
    user: Option<UserExt>,
    Path(slug): Path<String>,
) -> ApiResult<Vec<CommentView>> {
    let user = user.map(UserExt::inner);
    success(services::comment::list_comments(
        &context,
        &slug,
        user.as_ref(),
    )?)
}

#[debug_handler]
pub(super) async fn create_comment(
    State(context): State<FolioContext>,
    user: UserExt,
    Path(slug): Path<String>,
    Json(params): Json<CreateCommentParams>,
) -> BackendResult<(StatusCode, Json<SuccessResponse<CommentView>>)> {
    created(services::comment::create_comment(
        &context, &slug, params, &user,
    )?)
}

#[debug_handler]
pub(super) async fn update_comment(
    State(context): State<FolioContext>,
    user: UserExt,
    Path(id): Path<CommentId>,
    Json(params): Json<UpdateCommentParams>,
) -> ApiResult<Comment> {
    success(services::comment::update_comment(
        &context, id, params, &user,
    )?)
}

#[debug_handler]
pub(super) async fn delete_comment(
    State(context): State<FolioContext>,
    user: UserExt,
    Path(id): Path<CommentId>,
) -> ApiResult<Empty> {
    services::comment::delete_comment(&context, id, &user)?;
    success(Empty {})
}
