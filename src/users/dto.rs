use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{ProfileUpdate, User};
use crate::config::ImageConfig;
use crate::images::image_url;

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub language: Option<String>,
    pub nationality: Option<String>,
    pub image_public_id: Option<String>,
    pub image_url: Option<String>,
    pub access_groups: Vec<String>,
    pub rating: i32,
    pub feedback: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl UserProfile {
    pub fn new(user: User, images: &ImageConfig) -> Self {
        let image_url = user
            .image_public_id
            .as_deref()
            .map(|id| image_url(images, id));
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            language: user.language,
            nationality: user.nationality,
            image_public_id: user.image_public_id,
            image_url,
            access_groups: user.access_groups,
            rating: user.rating,
            feedback: user.feedback,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateUserRequest {
    pub data_to_send: Option<ProfileUpdate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateUsRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub feedback: String,
    pub rating: Option<i32>,
}
