pub mod comment;
pub mod like;
pub mod media;
pub mod newtypes;
pub mod post;
pub mod profile;
pub mod user;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Envelope for every successful api response.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Envelope for api errors, `success` is always false.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Empty {}
