use super::{
    memory::{Access, MemoryRepo},
    pg::{Connect, PgRepo},
    schema::profile_info,
};
use crate::{
    backend::utils::error::{BackendError, BackendResult},
    common::{
        newtypes::ProfileId,
        profile::{Contacts, Profile},
    },
};
use chrono::{DateTime, Utc};
use diesel::{
    update,
    AsChangeset,
    ExpressionMethods,
    OptionalExtension,
    QueryDsl,
    Queryable,
    RunQueryDsl,
    Selectable,
};

/// Row of `profile_info`, contacts are stored as json.
#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = profile_info, check_for_backend(diesel::pg::Pg))]
struct DbProfile {
    id: ProfileId,
    name: String,
    description: String,
    photo_url: Option<String>,
    activity: String,
    contacts: serde_json::Value,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DbProfile> for Profile {
    type Error = BackendError;

    fn try_from(row: DbProfile) -> BackendResult<Self> {
        Ok(Profile {
            id: row.id,
            name: row.name,
            description: row.description,
            photo_url: row.photo_url,
            activity: row.activity,
            contacts: serde_json::from_value(row.contacts)?,
            updated_at: row.updated_at,
        })
    }
}

#[derive(AsChangeset, Debug, Clone)]
#[diesel(table_name = profile_info, check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct ProfileUpdateForm {
    pub name: String,
    pub description: String,
    pub photo_url: Option<String>,
    pub activity: String,
    pub contacts: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl ProfileUpdateForm {
    pub fn new(profile: &Profile) -> BackendResult<Self> {
        Ok(ProfileUpdateForm {
            name: profile.name.clone(),
            description: profile.description.clone(),
            photo_url: profile.photo_url.clone(),
            activity: profile.activity.clone(),
            contacts: serde_json::to_value(&profile.contacts)?,
            updated_at: Utc::now(),
        })
    }
}

pub trait ProfileRepo {
    /// The first profile row by id, there is normally exactly one.
    fn read_profile(&self) -> BackendResult<Option<Profile>>;

    fn update_profile(&self, form: &ProfileUpdateForm) -> BackendResult<Profile>;
}

impl<C: Connect> ProfileRepo for PgRepo<C> {
    fn read_profile(&self) -> BackendResult<Option<Profile>> {
        self.0.with_conn(|conn| {
            profile_info::table
                .order(profile_info::id.asc())
                .first::<DbProfile>(conn)
                .optional()?
                .map(Profile::try_from)
                .transpose()
        })
    }

    fn update_profile(&self, form: &ProfileUpdateForm) -> BackendResult<Profile> {
        self.0.with_conn(|conn| {
            let id: ProfileId = profile_info::table
                .select(profile_info::id)
                .order(profile_info::id.asc())
                .first(conn)
                .optional()?
                .ok_or_else(|| BackendError::not_found("Profile"))?;
            update(profile_info::table.find(id))
                .set(form)
                .get_result::<DbProfile>(conn)?
                .try_into()
        })
    }
}

impl<A: Access> ProfileRepo for MemoryRepo<A> {
    fn read_profile(&self) -> BackendResult<Option<Profile>> {
        self.0.with_state(|s| Ok(s.profile.clone()))
    }

    fn update_profile(&self, form: &ProfileUpdateForm) -> BackendResult<Profile> {
        self.0.with_state(|s| {
            let profile = s
                .profile
                .as_mut()
                .ok_or_else(|| BackendError::not_found("Profile"))?;
            let contacts: Contacts = serde_json::from_value(form.contacts.clone())?;
            profile.name = form.name.clone();
            profile.description = form.description.clone();
            profile.photo_url = form.photo_url.clone();
            profile.activity = form.activity.clone();
            profile.contacts = contacts;
            profile.updated_at = form.updated_at;
            Ok(profile.clone())
        })
    }
}
