use super::newtypes::{MediaId, UserId};
use crate::backend::database::schema::media_files;
use chrono::{DateTime, Utc};
use diesel::{Identifiable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = media_files, check_for_backend(diesel::pg::Pg))]
pub struct MediaFile {
    pub id: MediaId,
    /// Name of the file as uploaded
    pub filename: String,
    pub mime_type: String,
    pub size: i64,
    pub uploader_id: UserId,
    #[serde(skip)]
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MediaFileView {
    #[serde(flatten)]
    pub media: MediaFile,
    pub url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UploadedImage {
    pub url: String,
}
