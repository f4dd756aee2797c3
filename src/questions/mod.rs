//! Read-only question catalog.

use anyhow::Context;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

/// Category whose questions are included in every state-specific listing.
pub const NATIONAL_CATEGORY: &str = "deutschland";

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,
    pub number: i32,
    pub category: String,
    pub question: String,
    pub answers: serde_json::Value,
    pub solution: String,
    pub image_url: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/all-questions", get(all_questions))
        .route("/all-questions/:category", get(questions_for_category))
}

pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<Question>> {
    let rows = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, number, category, question, answers, solution, image_url
          FROM questions
         ORDER BY category ASC, number ASC
        "#,
    )
    .fetch_all(db)
    .await
    .context("list questions")?;
    Ok(rows)
}

/// National questions plus those of `category`, ordered by question number.
pub async fn list_for_category(db: &PgPool, category: &str) -> anyhow::Result<Vec<Question>> {
    let rows = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, number, category, question, answers, solution, image_url
          FROM questions
         WHERE category = ANY($1)
         ORDER BY number ASC
        "#,
    )
    .bind(categories_for(category))
    .fetch_all(db)
    .await
    .context("list questions by category")?;
    Ok(rows)
}

fn categories_for(category: &str) -> Vec<String> {
    let category = category.trim().to_lowercase();
    if category.is_empty() || category == NATIONAL_CATEGORY {
        vec![NATIONAL_CATEGORY.to_string()]
    } else {
        vec![NATIONAL_CATEGORY.to_string(), category]
    }
}

#[instrument(skip(state))]
pub async fn all_questions(State(state): State<AppState>) -> Result<Json<Vec<Question>>, AppError> {
    Ok(Json(list_all(&state.db).await?))
}

#[instrument(skip(state))]
pub async fn questions_for_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Vec<Question>>, AppError> {
    Ok(Json(list_for_category(&state.db, &category).await?))
}
