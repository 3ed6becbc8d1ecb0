use super::newtypes::ProfileId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Contacts {
    pub email: String,
    pub github: String,
    pub linkedin: String,
    pub vk: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    pub description: String,
    pub photo_url: Option<String>,
    pub activity: String,
    pub contacts: Contacts,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct UpdateProfileParams {
    pub name: Option<String>,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    pub activity: Option<String>,
    pub email: Option<String>,
    pub github: Option<String>,
    pub linkedin: Option<String>,
    pub vk: Option<String>,
}
