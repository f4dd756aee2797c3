use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{groups, NewUser, ProfileUpdate, User};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, language, nationality, \
     image_public_id, access_groups, confirmation_code, rating, feedback, created_at";

/// Persisted user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn list(&self) -> anyhow::Result<Vec<User>>;
    /// Returns `None` when the email is already taken.
    async fn create(&self, new_user: NewUser) -> anyhow::Result<Option<User>>;
    /// Promotes the user holding `code` to the confirmed groups and burns the code.
    async fn confirm(&self, code: &str) -> anyhow::Result<Option<User>>;
    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> anyhow::Result<Option<User>>;
    async fn update_feedback(
        &self,
        id: Uuid,
        update: ProfileUpdate,
        feedback: &str,
        rating: Option<i32>,
    ) -> anyhow::Result<Option<User>>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok(users)
    }

    async fn create(&self, n: NewUser) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, language,
                               nationality, image_public_id, access_groups, confirmation_code)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&n.email)
        .bind(&n.password_hash)
        .bind(&n.first_name)
        .bind(&n.last_name)
        .bind(&n.language)
        .bind(&n.nationality)
        .bind(&n.image_public_id)
        .bind(&n.access_groups)
        .bind(&n.confirmation_code)
        .fetch_optional(&self.db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    async fn confirm(&self, code: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET access_groups = $2, confirmation_code = NULL
             WHERE confirmation_code = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(code)
        .bind(groups::confirmed())
        .fetch_optional(&self.db)
        .await
        .context("confirm user")?;
        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, u: ProfileUpdate) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET first_name = COALESCE($2, first_name),
                   last_name = COALESCE($3, last_name),
                   language = COALESCE($4, language),
                   nationality = COALESCE($5, nationality),
                   image_public_id = COALESCE($6, image_public_id)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(u.first_name)
        .bind(u.last_name)
        .bind(u.language)
        .bind(u.nationality)
        .bind(u.image_public_id)
        .fetch_optional(&self.db)
        .await
        .context("update user profile")?;
        Ok(user)
    }

    async fn update_feedback(
        &self,
        id: Uuid,
        u: ProfileUpdate,
        feedback: &str,
        rating: Option<i32>,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET first_name = COALESCE($2, first_name),
                   last_name = COALESCE($3, last_name),
                   feedback = $4,
                   rating = COALESCE($5, rating)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(u.first_name)
        .bind(u.last_name)
        .bind(feedback)
        .bind(rating)
        .fetch_optional(&self.db)
        .await
        .context("update user feedback")?;
        Ok(user)
    }
}
