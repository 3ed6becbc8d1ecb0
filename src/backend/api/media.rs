use super::{created, read_file_field, success, ApiResult, UserExt};
use crate::{
    backend::{database::FolioContext, services, utils::error::BackendResult},
    common::{
        media::{MediaFileView, UploadedImage},
        newtypes::MediaId,
        Empty,
        SuccessResponse,
    },
};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use axum_macros::debug_handler;

#[debug_handler]
pub(super) async fn upload_media(
    State(context): State<FolioContext>,
    user: UserExt,
    multipart: Multipart,
) -> BackendResult<(StatusCode, Json<SuccessResponse<MediaFileView>>)> {
    let (filename, data) = read_file_field(multipart).await?;
    created(services::media::upload_media(&context, &filename, &data, &user).await?)
}

#[debug_handler]
pub(super) async fn get_media(
    State(context): State<FolioContext>,
    Path(id): Path<MediaId>,
) -> ApiResult<MediaFileView> {
    success(services::media::get_media(&context, id)?)
}

/// Files uploaded by the current user.
#[debug_handler]
pub(super) async fn list_media(
    State(context): State<FolioContext>,
    user: UserExt,
) -> ApiResult<Vec<MediaFileView>> {
    success(services::media::list_media(&context, &user)?)
}

#[debug_handler]
pub(super) async fn delete_media(
    State(context): State<FolioContext>,
    user: UserExt,
    Path(id): Path<MediaId>,
) -> ApiResult<Empty> {
    services::media::delete_media(&context, id, &user).await?;
    success(Empty {})
}

#[debug_handler]
pub(super) async fn upload_image(
    State(context): State<FolioContext>,
    _user: UserExt,
    multipart: Multipart,
) -> ApiResult<UploadedImage> {
    let (filename, data) = read_file_field(multipart).await?;
    success(services::media::upload_image(&context, &filename, &data).await?)
}
