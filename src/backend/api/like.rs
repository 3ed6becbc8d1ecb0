use super::{success, ApiResult, UserExt};
use crate::{
    backend::{database::FolioContext, services},
    common::{
        like::{LikeCount, LikeStatus},
        newtypes::{CommentId, PostId},
    },
};
use axum::extract::{Path, State};
use axum_macros::debug_handler;

#[debug_handler]
pub(super) async fn like_post(
    State(context): State<FolioContext>,
    user: UserExt,
    Path(id): Path<PostId>,
) -> ApiResult<LikeStatus> {
    success(services::like::toggle_post_like(&context, id, &user)?)
}

#[debug_handler]
pub(super) async fn post_likes(
    State(context): State<FolioContext>,
    Path(id): Path<PostId>,
) -> ApiResult<LikeCount> {
    success(services::like::post_likes_count(&context, id)?)
}

#[debug_handler]
pub(super) async fn like_comment(
    State(context): State<FolioContext>,
    user: UserExt,
    Path(id): Path<CommentId>,
) -> ApiResult<LikeStatus> {
    success(services::like::toggle_comment_like(&context, id, &user)?)
}

#[debug_handler]
pub(super) async fn comment_likes(
    State(context): State<FolioContext>,
    Path(id): Path<CommentId>,
) -> ApiResult<LikeCount> {
    success(services::like::comment_likes_count(&context, id)?)
}
