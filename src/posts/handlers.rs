use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    posts::{
        dto::{
            CallerRequest, CreateCommentRequest, CreatePostRequest, PostWithComments,
            UpdateCommentRequest, UpdatePostRequest,
        },
        repo,
        repo_types::{Comment, LikeAction, Post},
    },
    state::AppState,
};

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post))
        .route("/posts/news-feed/all", get(news_feed))
        .route("/posts/my-posts/:user_id", get(my_posts))
        .route("/posts/:id", get(get_post).put(update_post).delete(delete_post))
        .route("/posts/:id/like", put(toggle_like))
        .route("/posts/:id/comment", post(add_comment))
        .route("/posts/comments/:id", get(list_comments))
        .route("/posts/comments/comment/:id", delete(delete_comment))
        .route("/posts/:id/comments/comment/:comment_id", put(update_comment))
}

/// Ownership is a plain id comparison against the caller-supplied `userId`.
pub(crate) fn ensure_owner(
    owner: Uuid,
    caller: Option<Uuid>,
    denied: &'static str,
) -> Result<(), AppError> {
    if caller == Some(owner) {
        Ok(())
    } else {
        Err(AppError::Forbidden(denied))
    }
}

/// Caller id from an optional `{userId}` body. A missing body or field is a denial.
fn caller_id(payload: Option<Json<CallerRequest>>, denied: &'static str) -> Result<Uuid, AppError> {
    payload.and_then(|Json(p)| p.user_id).ok_or_else(|| {
        warn!("request without userId");
        AppError::Forbidden(denied)
    })
}

async fn load_post(state: &AppState, id: Uuid) -> Result<Post, AppError> {
    repo::find_post(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("post not found".into()))
}

async fn load_comment(state: &AppState, id: Uuid) -> Result<Comment, AppError> {
    repo::find_comment(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("comment not found".into()))
}

#[instrument(skip(state, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let post = repo::insert_post(
        &state.db,
        payload.user_id,
        &payload.description,
        payload.image_public_id.as_deref(),
    )
    .await?;
    info!(post_id = %post.id, user_id = %post.user_id, "post created");
    Ok(Json(post))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<PostWithComments>>, AppError> {
    let Some(post) = repo::find_post(&state.db, id).await? else {
        return Ok(Json(None));
    };
    let comments = repo::list_comments(&state.db, &[post.id]).await?;
    Ok(Json(PostWithComments::attach(vec![post], comments).pop()))
}

#[instrument(skip(state))]
pub async fn news_feed(State(state): State<AppState>) -> Result<Json<Vec<PostWithComments>>, AppError> {
    let posts = repo::list_posts(&state.db).await?;
    let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
    let comments = repo::list_comments(&state.db, &ids).await?;
    Ok(Json(PostWithComments::attach(posts, comments)))
}

#[instrument(skip(state))]
pub async fn my_posts(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<Post>>, AppError> {
    Ok(Json(repo::list_posts_by_user(&state.db, user_id).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<&'static str>, AppError> {
    let post = load_post(&state, id).await?;
    ensure_owner(post.user_id, payload.user_id, "you can't update the post")?;
    repo::update_post(
        &state.db,
        id,
        payload.description.as_deref(),
        payload.image_public_id.as_deref(),
    )
    .await?;
    Ok(Json("Post has been updated"))
}

#[instrument(skip(state, payload))]
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<CallerRequest>>,
) -> Result<Json<&'static str>, AppError> {
    let caller = caller_id(payload, "you can't delete the post")?;
    let post = load_post(&state, id).await?;
    ensure_owner(post.user_id, Some(caller), "you can't delete the post")?;
    repo::delete_post(&state.db, id).await?;
    info!(post_id = %id, "post deleted");
    Ok(Json("Post has been deleted"))
}

#[instrument(skip(state, payload))]
pub async fn toggle_like(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<CallerRequest>>,
) -> Result<Json<&'static str>, AppError> {
    let user_id = caller_id(payload, "you can't like the post")?;
    let post = load_post(&state, id).await?;
    let action = LikeAction::toggle(&post.likes, user_id);
    repo::apply_like(&state.db, id, user_id, action).await?;
    Ok(Json(action.message()))
}

#[instrument(skip(state, payload))]
pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<Json<&'static str>, AppError> {
    let post = load_post(&state, id).await?;
    repo::insert_comment(&state.db, post.id, payload.user_id, &payload.text).await?;
    Ok(Json("Comment has been added"))
}

#[instrument(skip(state))]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let post = load_post(&state, id).await?;
    Ok(Json(repo::list_comments(&state.db, &[post.id]).await?))
}

#[instrument(skip(state, payload))]
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<CallerRequest>>,
) -> Result<Json<&'static str>, AppError> {
    let caller = caller_id(payload, "you can't delete the comment")?;
    let comment = load_comment(&state, id).await?;
    ensure_owner(comment.user_id, Some(caller), "you can't delete the comment")?;
    repo::delete_comment(&state.db, id).await?;
    Ok(Json("Comment has been deleted"))
}

#[instrument(skip(state, payload))]
pub async fn update_comment(
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<Json<&'static str>, AppError> {
    let comment = load_comment(&state, comment_id).await?;
    if comment.post_id != post_id {
        return Err(AppError::NotFound("comment not found".into()));
    }
    ensure_owner(comment.user_id, payload.user_id, "you can't update the comment")?;
    repo::update_comment(&state.db, comment_id, payload.text.as_deref()).await?;
    Ok(Json("comment has been updated"))
}
