use super::{
    memory::{Access, MemoryRepo},
    pg::{Connect, PgRepo},
    schema::media_files,
};
use crate::{
    backend::utils::error::BackendResult,
    common::{
        media::MediaFile,
        newtypes::{MediaId, UserId},
    },
};
use chrono::Utc;
use diesel::{
    delete,
    insert_into,
    ExpressionMethods,
    Insertable,
    OptionalExtension,
    QueryDsl,
    RunQueryDsl,
};

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = media_files, check_for_backend(diesel::pg::Pg))]
pub struct MediaInsertForm {
    pub filename: String,
    pub mime_type: String,
    pub size: i64,
    pub uploader_id: UserId,
    pub storage_path: String,
}

pub trait MediaRepo {
    fn create_media(&self, form: &MediaInsertForm) -> BackendResult<MediaFile>;

    fn read_media(&self, id: MediaId) -> BackendResult<Option<MediaFile>>;

    fn delete_media(&self, id: MediaId) -> BackendResult<bool>;

    /// Newest first.
    fn list_media_by_uploader(&self, uploader_id: UserId) -> BackendResult<Vec<MediaFile>>;
}

impl<C: Connect> MediaRepo for PgRepo<C> {
    fn create_media(&self, form: &MediaInsertForm) -> BackendResult<MediaFile> {
        self.0.with_conn(|conn| {
            Ok(insert_into(media_files::table)
                .values(form)
                .get_result(conn)?)
        })
    }

    fn read_media(&self, id: MediaId) -> BackendResult<Option<MediaFile>> {
        self.0
            .with_conn(|conn| Ok(media_files::table.find(id).first(conn).optional()?))
    }

    fn delete_media(&self, id: MediaId) -> BackendResult<bool> {
        self.0.with_conn(|conn| {
            let rows = delete(media_files::table.find(id)).execute(conn)?;
            Ok(rows > 0)
        })
    }

    fn list_media_by_uploader(&self, uploader_id: UserId) -> BackendResult<Vec<MediaFile>> {
        self.0.with_conn(|conn| {
            Ok(media_files::table
                .filter(media_files::uploader_id.eq(uploader_id))
                .order((media_files::created_at.desc(), media_files::id.desc()))
                .load(conn)?)
        })
    }
}

impl<A: Access> MediaRepo for MemoryRepo<A> {
    fn create_media(&self, form: &MediaInsertForm) -> BackendResult<MediaFile> {
        self.0.with_state(|s| {
            let media = MediaFile {
                id: MediaId(s.next_id()),
                filename: form.filename.clone(),
                mime_type: form.mime_type.clone(),
                size: form.size,
                uploader_id: form.uploader_id,
                storage_path: form.storage_path.clone(),
                created_at: Utc::now(),
            };
            s.media.push(media.clone());
            Ok(media)
        })
    }

    fn read_media(&self, id: MediaId) -> BackendResult<Option<MediaFile>> {
        self.0
            .with_state(|s| Ok(s.media.iter().find(|m| m.id == id).cloned()))
    }

    fn delete_media(&self, id: MediaId) -> BackendResult<bool> {
        self.0.with_state(|s| {
            let before = s.media.len();
            s.media.retain(|m| m.id != id);
            Ok(s.media.len() < before)
        })
    }

    fn list_media_by_uploader(&self, uploader_id: UserId) -> BackendResult<Vec<MediaFile>> {
        self.0.with_state(|s| {
            Ok(s.media
                .iter()
                .rev()
                .filter(|m| m.uploader_id == uploader_id)
                .cloned()
                .collect())
        })
    }
}
