use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Email of the guest account every unauthenticated caller is resolved to.
pub const ANONYMOUS_EMAIL: &str = "anonymousUser";

pub mod groups {
    pub const LOGGED_OUT_USERS: &str = "loggedOutUsers";
    pub const LOGGED_IN_USERS: &str = "loggedInUsers";
    pub const MEMBERS: &str = "members";
    pub const UNCONFIRMED_MEMBERS: &str = "unconfirmedMembers";

    pub fn unconfirmed() -> Vec<String> {
        vec![LOGGED_IN_USERS.into(), UNCONFIRMED_MEMBERS.into()]
    }

    pub fn confirmed() -> Vec<String> {
        vec![LOGGED_IN_USERS.into(), MEMBERS.into()]
    }
}

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String, // Argon2 hash, never leaves the server
    pub first_name: String,
    pub last_name: String,
    pub language: Option<String>,
    pub nationality: Option<String>,
    pub image_public_id: Option<String>,
    pub access_groups: Vec<String>,
    pub confirmation_code: Option<String>,
    pub rating: i32,
    pub feedback: String,
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn is_anonymous(&self) -> bool {
        self.email == ANONYMOUS_EMAIL
    }
}

/// Fields needed to persist a freshly registered user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub language: Option<String>,
    pub nationality: Option<String>,
    pub image_public_id: Option<String>,
    pub access_groups: Vec<String>,
    pub confirmation_code: String,
}

/// Partial profile update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub language: Option<String>,
    pub nationality: Option<String>,
    pub image_public_id: Option<String>,
}

/// Snapshot of a user kept inside a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub language: Option<String>,
    pub nationality: Option<String>,
    pub image_public_id: Option<String>,
    pub access_groups: Vec<String>,
    pub rating: i32,
    pub feedback: String,
}

impl SessionUser {
    pub fn is_anonymous(&self) -> bool {
        self.email == ANONYMOUS_EMAIL
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.access_groups.iter().any(|g| g == group)
    }
}

impl From<&User> for SessionUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            language: u.language.clone(),
            nationality: u.nationality.clone(),
            image_public_id: u.image_public_id.clone(),
            access_groups: u.access_groups.clone(),
            rating: u.rating,
            feedback: u.feedback.clone(),
        }
    }
}
