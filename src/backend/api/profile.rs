use super::{success, ApiResult, UserExt};
use crate::{
    backend::{database::FolioContext, services},
    common::profile::{Profile, UpdateProfileParams},
};
use axum::{extract::State, Json};
use axum_macros::debug_handler;

#[debug_handler]
pub(super) async fn get_profile(State(context): State<FolioContext>) -> ApiResult<Profile> {
    success(services::profile::get_profile(&context)?)
}

#[debug_handler]
pub(super) async fn update_profile(
    State(context): State<FolioContext>,
    user: UserExt,
    Json(params): Json<UpdateProfileParams>,
) -> ApiResult<Profile> {
    success(services::profile::update_profile(&context, params, &user).await?)
}
