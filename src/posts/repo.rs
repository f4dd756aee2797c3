use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use crate::posts::repo_types::{Comment, LikeAction, Post};

pub async fn insert_post(
    db: &PgPool,
    user_id: Uuid,
    description: &str,
    image_public_id: Option<&str>,
) -> anyhow::Result<Post> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (user_id, description, image_public_id)
        VALUES ($1, $2, $3)
        RETURNING id, user_id, description, image_public_id, likes, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(description)
    .bind(image_public_id)
    .fetch_one(db)
    .await
    .context("insert post")?;
    Ok(post)
}

pub async fn find_post(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Post>> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, user_id, description, image_public_id, likes, created_at, updated_at
          FROM posts
         WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
    .context("find post")?;
    Ok(post)
}

/// Newest first.
pub async fn list_posts(db: &PgPool) -> anyhow::Result<Vec<Post>> {
    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, user_id, description, image_public_id, likes, created_at, updated_at
          FROM posts
         ORDER BY created_at DESC
        "#,
    )
    .fetch_all(db)
    .await
    .context("list posts")?;
    Ok(posts)
}

pub async fn list_posts_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Post>> {
    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, user_id, description, image_public_id, likes, created_at, updated_at
          FROM posts
         WHERE user_id = $1
         ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list posts by user")?;
    Ok(posts)
}

pub async fn update_post(
    db: &PgPool,
    id: Uuid,
    description: Option<&str>,
    image_public_id: Option<&str>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE posts
           SET description = COALESCE($2, description),
               image_public_id = COALESCE($3, image_public_id),
               updated_at = now()
         WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(description)
    .bind(image_public_id)
    .execute(db)
    .await
    .context("update post")?;
    Ok(())
}

/// Comments go with the post (`ON DELETE CASCADE`).
pub async fn delete_post(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(db)
        .await
        .context("delete post")?;
    Ok(())
}

pub async fn apply_like(db: &PgPool, id: Uuid, user_id: Uuid, action: LikeAction) -> anyhow::Result<()> {
    let sql = match action {
        LikeAction::Like => {
            "UPDATE posts SET likes = array_append(likes, $2) WHERE id = $1 AND NOT ($2 = ANY(likes))"
        }
        LikeAction::Unlike => "UPDATE posts SET likes = array_remove(likes, $2) WHERE id = $1",
    };
    sqlx::query(sql)
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await
        .context("toggle like")?;
    Ok(())
}

pub async fn insert_comment(
    db: &PgPool,
    post_id: Uuid,
    user_id: Uuid,
    text: &str,
) -> anyhow::Result<Comment> {
    let comment = sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (post_id, user_id, text)
        VALUES ($1, $2, $3)
        RETURNING id, post_id, user_id, text, created_at, updated_at
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(text)
    .fetch_one(db)
    .await
    .context("insert comment")?;
    Ok(comment)
}

pub async fn find_comment(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Comment>> {
    let comment = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, post_id, user_id, text, created_at, updated_at
          FROM comments
         WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
    .context("find comment")?;
    Ok(comment)
}

/// Comments of all given posts, oldest first.
pub async fn list_comments(db: &PgPool, post_ids: &[Uuid]) -> anyhow::Result<Vec<Comment>> {
    let comments = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, post_id, user_id, text, created_at, updated_at
          FROM comments
         WHERE post_id = ANY($1)
         ORDER BY created_at ASC
        "#,
    )
    .bind(post_ids)
    .fetch_all(db)
    .await
    .context("list comments")?;
    Ok(comments)
}

const UPDATE_COMMENT_SQL: &str =
    "UPDATE comments SET text = COALESCE($2, text), updated_at = now() WHERE id = $1";

/// `None` keeps the stored text.
pub async fn update_comment(db: &PgPool, id: Uuid, text: Option<&str>) -> anyhow::Result<()> {
    sqlx::query(UPDATE_COMMENT_SQL)
        .bind(id)
        .bind(text)
        .execute(db)
        .await
        .context("update comment")?;
    Ok(())
}

pub async fn delete_comment(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(id)
        .execute(db)
        .await
        .context("delete comment")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_update_keeps_text_when_absent() {
        assert!(UPDATE_COMMENT_SQL.contains("text = COALESCE($2, text)"));
    }
}
