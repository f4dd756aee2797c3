use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    pub image_public_id: Option<String>,
    pub likes: Vec<Uuid>, // ids of users who liked the post
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeAction {
    Like,
    Unlike,
}

impl LikeAction {
    /// Liking is a toggle: a second like from the same user removes it.
    pub fn toggle(likes: &[Uuid], user_id: Uuid) -> Self {
        if likes.contains(&user_id) {
            LikeAction::Unlike
        } else {
            LikeAction::Like
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            LikeAction::Like => "Post has been liked",
            LikeAction::Unlike => "Post has been disliked",
        }
    }
}
