use crate::{
    backend::{
        database::{media::MediaInsertForm, FolioContext},
        utils::error::{BackendError, BackendResult},
    },
    common::{
        media::{MediaFile, MediaFileView, UploadedImage},
        newtypes::MediaId,
        user::User,
    },
};
use log::{info, warn};
use std::{io::ErrorKind, path::Path};
use tokio::fs;
use uuid::Uuid;

pub const MEDIA_MAX_SIZE: usize = 10 * 1024 * 1024;
pub const IMAGE_MAX_SIZE: usize = 5 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
}

const MEDIA_KINDS: &[ImageKind] = &[
    ImageKind::Jpeg,
    ImageKind::Png,
    ImageKind::Gif,
    ImageKind::Webp,
];
const IMAGE_KINDS: &[ImageKind] = &[ImageKind::Jpeg, ImageKind::Png, ImageKind::Webp];

impl ImageKind {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "gif" => Some(ImageKind::Gif),
            "webp" => Some(ImageKind::Webp),
            _ => None,
        }
    }

    fn from_magic(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageKind::Png)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(ImageKind::Gif)
        } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            Some(ImageKind::Webp)
        } else {
            None
        }
    }
}

/// A file checked by [validate_image], with its lowercase extension and mime type.
struct ValidImage {
    ext: String,
    mime_type: String,
}

fn validate_image(
    filename: &str,
    data: &[u8],
    max_size: usize,
    allowed: &[ImageKind],
) -> BackendResult<ValidImage> {
    if data.is_empty() {
        return Err(BackendError::validation("file", "must not be empty"));
    }
    if data.len() > max_size {
        return Err(BackendError::validation(
            "file",
            format!("must be at most {} MiB", max_size / 1024 / 1024),
        ));
    }
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let kind = ImageKind::from_extension(&ext)
        .filter(|k| allowed.contains(k))
        .ok_or_else(|| BackendError::validation("file", format!("file type .{ext} is not allowed")))?;
    if ImageKind::from_magic(data) != Some(kind) {
        return Err(BackendError::validation(
            "file",
            "content does not match the file extension",
        ));
    }
    let mime_type = mime_guess::from_ext(&ext).first_or_octet_stream().to_string();
    Ok(ValidImage { ext, mime_type })
}

/// Writes the file under a random name into the upload directory and returns that name.
async fn store_file(upload_path: &str, ext: &str, data: &[u8]) -> BackendResult<String> {
    fs::create_dir_all(upload_path).await?;
    let name = format!("{}.{ext}", Uuid::new_v4());
    fs::write(Path::new(upload_path).join(&name), data).await?;
    Ok(name)
}

/// Removes a file from the upload directory. Failures are logged and otherwise ignored.
pub(super) async fn remove_uploaded_file(upload_path: &str, name: &str) {
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        warn!("Refusing to remove file {name} outside of upload directory");
        return;
    }
    match fs::remove_file(Path::new(upload_path).join(name)).await {
        Ok(()) => info!("Removed uploaded file {name}"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove uploaded file {name}: {e}"),
    }
}

fn stored_name(media: &MediaFile) -> &str {
    Path::new(&media.storage_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
}

fn media_view(context: &FolioContext, media: MediaFile) -> MediaFileView {
    let url = format!("{}/media/{}", context.config.media_base_url(), stored_name(&media));
    MediaFileView { media, url }
}

/// Stores an image in the media library.
pub async fn upload_media(
    context: &FolioContext,
    filename: &str,
    data: &[u8],
    user: &User,
) -> BackendResult<MediaFileView> {
    let image = validate_image(filename, data, MEDIA_MAX_SIZE, MEDIA_KINDS)?;
    let upload_path = &context.config.media.upload_path;
    let name = store_file(upload_path, &image.ext, data).await?;
    let form = MediaInsertForm {
        filename: filename.to_string(),
        mime_type: image.mime_type,
        size: i64::try_from(data.len())?,
        uploader_id: user.id,
        storage_path: Path::new(upload_path).join(&name).to_string_lossy().into_owned(),
    };
    let created = context.repo().create_media(&form);
    let media = match created {
        Ok(media) => media,
        Err(e) => {
            remove_uploaded_file(upload_path, &name).await;
            return Err(e);
        }
    };
    info!("User {} uploaded media {} as {name}", user.id.0, media.id.0);
    Ok(media_view(context, media))
}

pub fn get_media(context: &FolioContext, id: MediaId) -> BackendResult<MediaFileView> {
    let media = context
        .repo()
        .read_media(id)?
        .ok_or_else(|| BackendError::not_found("Media file"))?;
    Ok(media_view(context, media))
}

pub fn list_media(context: &FolioContext, user: &User) -> BackendResult<Vec<MediaFileView>> {
    Ok(context
        .repo()
        .list_media_by_uploader(user.id)?
        .into_iter()
        .map(|m| media_view(context, m))
        .collect())
}

/// Deletes a media file and its data on disk. Only the uploader may do this.
pub async fn delete_media(context: &FolioContext, id: MediaId, user: &User) -> BackendResult<()> {
    let media = context
        .repo()
        .read_media(id)?
        .ok_or_else(|| BackendError::not_found("Media file"))?;
    if media.uploader_id != user.id {
        return Err(BackendError::permission_denied(
            "Only the uploader can delete this file",
        ));
    }
    context.repo().delete_media(id)?;
    info!("User {} deleted media {}", user.id.0, id.0);
    // the row is gone already, a leftover file is only worth a warning
    match fs::remove_file(&media.storage_path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => {
            warn!("Failed to remove media file {}: {e}", media.storage_path)
        }
        _ => {}
    }
    Ok(())
}

/// Stores an image for use in posts or the profile, without a media library entry.
pub async fn upload_image(
    context: &FolioContext,
    filename: &str,
    data: &[u8],
) -> BackendResult<UploadedImage> {
    let image = validate_image(filename, data, IMAGE_MAX_SIZE, IMAGE_KINDS)?;
    let name = store_file(&context.config.media.upload_path, &image.ext, data).await?;
    Ok(UploadedImage {
        url: format!("/uploads/{name}"),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        backend::{
            database::memory::MemoryStore,
            services::test::create_user,
            utils::config::FolioConfig,
        },
        common::user::Role,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const GIF: &[u8] = b"GIF89a\x01\0\x01\0";

    fn media_context() -> FolioContext {
        let mut config = FolioConfig::default();
        config.media.upload_path = std::env::temp_dir()
            .join(format!("folio-test-{}", Uuid::new_v4()))
            .to_string_lossy()
            .into_owned();
        config.media.base_url = "https://cdn.example.com".to_string();
        FolioContext::new(config, Arc::new(MemoryStore::new()), Default::default())
    }

    #[test]
    fn test_validate_image() {
        assert!(validate_image("a.PNG", PNG, MEDIA_MAX_SIZE, MEDIA_KINDS).is_ok());
        assert!(validate_image("a.gif", GIF, MEDIA_MAX_SIZE, MEDIA_KINDS).is_ok());
        let webp = b"RIFF\0\0\0\0WEBPVP8 ";
        let image = validate_image("a.webp", webp, MEDIA_MAX_SIZE, MEDIA_KINDS);
        assert_eq!(Some("image/webp".to_string()), image.ok().map(|i| i.mime_type));

        // gif is only allowed in the media library
        assert!(validate_image("a.gif", GIF, IMAGE_MAX_SIZE, IMAGE_KINDS).is_err());
        assert!(validate_image("a.png", GIF, MEDIA_MAX_SIZE, MEDIA_KINDS).is_err());
        assert!(validate_image("a.exe", PNG, MEDIA_MAX_SIZE, MEDIA_KINDS).is_err());
        assert!(validate_image("png", PNG, MEDIA_MAX_SIZE, MEDIA_KINDS).is_err());
        assert!(validate_image("a.png", &[], MEDIA_MAX_SIZE, MEDIA_KINDS).is_err());
        let mut large = PNG.to_vec();
        large.resize(IMAGE_MAX_SIZE + 1, 0);
        assert!(validate_image("a.png", &large, IMAGE_MAX_SIZE, IMAGE_KINDS).is_err());
        assert!(validate_image("a.png", &large, MEDIA_MAX_SIZE, MEDIA_KINDS).is_ok());
    }

    #[tokio::test]
    async fn test_media_library() -> BackendResult<()> {
        let context = media_context();
        let admin = create_user(&context, "admin", Role::Admin)?;
        let other = create_user(&context, "other", Role::Admin)?;

        let view = upload_media(&context, "photo.png", PNG, &admin).await?;
        assert_eq!("photo.png", view.media.filename);
        assert_eq!("image/png", view.media.mime_type);
        assert_eq!(PNG.len() as i64, view.media.size);
        assert!(view.url.starts_with("https://cdn.example.com/media/"));
        assert!(view.url.ends_with(".png"));
        assert_eq!(PNG, fs::read(&view.media.storage_path).await?);

        assert_eq!(view, get_media(&context, view.media.id)?);
        assert_eq!(1, list_media(&context, &admin)?.len());
        assert!(list_media(&context, &other)?.is_empty());

        let res = delete_media(&context, view.media.id, &other).await;
        assert!(matches!(res, Err(BackendError::PermissionDenied(_))));
        delete_media(&context, view.media.id, &admin).await?;
        assert!(fs::metadata(&view.media.storage_path).await.is_err());
        assert!(get_media(&context, view.media.id).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_media_with_missing_file() -> BackendResult<()> {
        let context = media_context();
        let admin = create_user(&context, "admin", Role::Admin)?;
        let view = upload_media(&context, "anim.gif", GIF, &admin).await?;
        fs::remove_file(&view.media.storage_path).await?;
        delete_media(&context, view.media.id, &admin).await?;
        assert!(list_media(&context, &admin)?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_media_with_unremovable_file() -> BackendResult<()> {
        let context = media_context();
        let admin = create_user(&context, "admin", Role::Admin)?;
        let view = upload_media(&context, "photo.png", PNG, &admin).await?;
        // a directory in place of the file makes the removal fail
        fs::remove_file(&view.media.storage_path).await?;
        fs::create_dir_all(Path::new(&view.media.storage_path).join("keep")).await?;

        delete_media(&context, view.media.id, &admin).await?;
        assert!(list_media(&context, &admin)?.is_empty());
        assert!(get_media(&context, view.media.id).is_err());
        fs::remove_dir_all(&view.media.storage_path).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_image() -> BackendResult<()> {
        let context = media_context();
        let image = upload_image(&context, "cover.png", PNG).await?;
        let name = image.url.trim_start_matches("/uploads/");
        let path = Path::new(&context.config.media.upload_path).join(name);
        assert_eq!(PNG, fs::read(&path).await?);

        remove_uploaded_file(&context.config.media.upload_path, name).await;
        assert!(fs::metadata(&path).await.is_err());
        assert!(upload_image(&context, "anim.gif", GIF).await.is_err());
        Ok(())
    }
}
