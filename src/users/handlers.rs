use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::CurrentUserResponse,
        extractors::SessionToken,
        handlers::with_session,
        repo_types::ProfileUpdate,
        services::Identity,
    },
    error::AppError,
    state::AppState,
    users::dto::{RateUsRequest, UpdateUserRequest, UserProfile},
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user))
        .route("/posts/comment-owner/:id", get(get_user))
        .route("/update/:id", put(update_user))
        .route("/rate-us", post(rate_us))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserProfile>>, AppError> {
    let users = state.auth.users().list().await?;
    let images = &state.config.images;
    Ok(Json(
        users
            .into_iter()
            .map(|u| UserProfile::new(u, images))
            .collect(),
    ))
}

/// Unknown ids answer `null`, not 404.
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<UserProfile>>, AppError> {
    let user = state.auth.users().find_by_id(id).await?;
    Ok(Json(user.map(|u| UserProfile::new(u, &state.config.images))))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<Option<UserProfile>>, AppError> {
    let Some(update) = payload.data_to_send else {
        return Err(AppError::NotFound(
            "you can not update your profile while logged out".into(),
        ));
    };
    let user = state.auth.users().update_profile(id, update).await?;
    if user.is_some() {
        info!(user_id = %id, "profile updated");
    }
    Ok(Json(user.map(|u| UserProfile::new(u, &state.config.images))))
}

/// Stores rating and feedback for the signed-in caller; anonymous callers only get their identity back.
#[instrument(skip(state, token, payload))]
pub async fn rate_us(
    State(state): State<AppState>,
    token: SessionToken,
    Json(payload): Json<RateUsRequest>,
) -> Result<Response, AppError> {
    let binding = state.auth.current_user(token.as_deref()).await?;
    let Identity::Authenticated(current) = &binding.identity else {
        warn!("anonymous rating ignored");
        let body = CurrentUserResponse {
            current_user: binding.identity.user().clone(),
        };
        return with_session(&state, &binding, body);
    };

    let update = ProfileUpdate {
        first_name: payload.first_name,
        last_name: payload.last_name,
        ..ProfileUpdate::default()
    };
    let updated = state
        .auth
        .users()
        .update_feedback(current.id, update, &payload.feedback, payload.rating)
        .await?;

    let binding = match updated {
        Some(user) => {
            info!(user_id = %user.id, "feedback stored");
            state.auth.replace_snapshot(&binding.token, &user).await?
        }
        None => binding,
    };
    let body = CurrentUserResponse {
        current_user: binding.identity.user().clone(),
    };
    with_session(&state, &binding, body)
}
