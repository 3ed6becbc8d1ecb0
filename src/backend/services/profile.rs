use super::{check_is_admin, media::remove_uploaded_file};
use crate::{
    backend::{
        database::{profile::ProfileUpdateForm, FolioContext},
        utils::{
            error::{BackendError, BackendResult},
            validate::{validate_optional_url, Validator},
        },
    },
    common::{
        profile::{Profile, UpdateProfileParams},
        user::User,
    },
};
use log::info;

/// Returns the profile, served from cache for a few minutes after it was read.
pub fn get_profile(context: &FolioContext) -> BackendResult<Profile> {
    if let Some(profile) = context.profile_cache.get(&()) {
        return Ok(profile);
    }
    let profile = context
        .repo()
        .read_profile()?
        .ok_or_else(|| BackendError::not_found("Profile"))?;
    context.profile_cache.insert((), profile.clone());
    Ok(profile)
}

/// Updates the given fields of the profile. A replaced photo which was uploaded to this server
/// is removed from disk.
pub async fn update_profile(
    context: &FolioContext,
    params: UpdateProfileParams,
    user: &User,
) -> BackendResult<Profile> {
    check_is_admin(user)?;
    let mut validator = Validator::default();
    if let Some(name) = &params.name {
        validator.check(!name.trim().is_empty(), "name", "must not be empty");
    }
    validate_optional_url(&mut validator, "photo_url", &params.photo_url);
    validator.finish()?;

    let mut profile = context
        .repo()
        .read_profile()?
        .ok_or_else(|| BackendError::not_found("Profile"))?;
    let old_photo = profile.photo_url.clone();

    let trimmed = |value: String| value.trim().to_string();
    if let Some(name) = params.name {
        profile.name = trimmed(name);
    }
    if let Some(description) = params.description {
        profile.description = trimmed(description);
    }
    if let Some(activity) = params.activity {
        profile.activity = trimmed(activity);
    }
    if let Some(photo_url) = params.photo_url {
        profile.photo_url = Some(trimmed(photo_url)).filter(|p| !p.is_empty());
    }
    let contacts = &mut profile.contacts;
    for (value, field) in [
        (params.email, &mut contacts.email),
        (params.github, &mut contacts.github),
        (params.linkedin, &mut contacts.linkedin),
        (params.vk, &mut contacts.vk),
    ] {
        if let Some(value) = value {
            *field = trimmed(value);
        }
    }

    let profile = context
        .repo()
        .update_profile(&ProfileUpdateForm::new(&profile)?)?;
    context.profile_cache.invalidate(&());
    info!("Profile updated by user {}", user.id.0);

    if let Some(old_photo) = old_photo.filter(|old| Some(old) != profile.photo_url.as_ref()) {
        if let Some(file) = old_photo.strip_prefix("/uploads/") {
            remove_uploaded_file(&context.config.media.upload_path, file).await;
        }
    }
    Ok(profile)
}
