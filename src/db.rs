use anyhow::Context;
use sqlx::PgPool;

use crate::auth::repo::UserStore;
use crate::auth::repo_types::ANONYMOUS_EMAIL;

pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")?;
    Ok(())
}

/// Every unauthenticated request depends on the guest record; refuse to start without it.
pub async fn ensure_anonymous_user(users: &dyn UserStore) -> anyhow::Result<()> {
    users
        .find_by_email(ANONYMOUS_EMAIL)
        .await?
        .map(|_| ())
        .with_context(|| format!("user {ANONYMOUS_EMAIL:?} is missing"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::memory::MemoryUserStore;

    #[tokio::test]
    async fn anonymous_user_check() {
        assert!(ensure_anonymous_user(&MemoryUserStore::seeded()).await.is_ok());
        let err = ensure_anonymous_user(&MemoryUserStore::empty()).await.unwrap_err();
        assert!(err.to_string().contains("anonymousUser"));
    }
}
