use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{
            ConfirmRequest, ConfirmResponse, ConfirmedUser, CurrentUserResponse, LoginRequest,
            RegisterRequest, RegisterResponse, RegisteredUser,
        },
        extractors::SessionToken,
        services::{ConfirmOutcome, RegisterInput, RegisterOutcome, SessionBinding},
        session::session_cookie,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/confirm-registration-code", post(confirm_registration_code))
        .route("/current-user", get(current_user))
        .route("/logout", get(logout))
}

/// Rejects the request unless the configured safe-origin code was echoed back.
pub(crate) fn ensure_safe_origin(state: &AppState, presented: Option<&str>) -> Result<(), AppError> {
    match state.config.safe_origin_code.as_deref() {
        Some(expected) if presented != Some(expected) => {
            warn!("safe origin code mismatch");
            Err(AppError::NoAccess)
        }
        _ => Ok(()),
    }
}

/// Serializes `body` and attaches the cookie for `binding`.
pub(crate) fn with_session<T: Serialize>(
    state: &AppState,
    binding: &SessionBinding,
    body: T,
) -> Result<Response, AppError> {
    let cookie = session_cookie(&state.config.session, &binding.token)
        .map_err(|e| anyhow::anyhow!("session cookie: {e}"))?;
    Ok(([(SET_COOKIE, cookie)], Json(body)).into_response())
}

fn current_user_response(state: &AppState, binding: SessionBinding) -> Result<Response, AppError> {
    let body = CurrentUserResponse {
        current_user: binding.identity.user().clone(),
    };
    with_session(state, &binding, body)
}

#[instrument(skip(state, token, payload))]
pub async fn login(
    State(state): State<AppState>,
    token: SessionToken,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AppError> {
    ensure_safe_origin(&state, payload.safe_origin_code.as_deref())?;
    let binding = state
        .auth
        .login(token.as_deref(), &payload.email, &payload.password)
        .await?;
    current_user_response(&state, binding)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
    ensure_safe_origin(&state, payload.safe_origin_code.as_deref())?;
    let outcome = state
        .auth
        .register(RegisterInput {
            email: payload.email,
            password: payload.password,
            first_name: payload.first_name,
            last_name: payload.last_name,
            language: payload.language,
            nationality: payload.nationality,
        })
        .await?;

    let response = match outcome {
        RegisterOutcome::Invalid(message) => RegisterResponse {
            message: message.into(),
            user: None,
        },
        RegisterOutcome::EmailTaken => RegisterResponse {
            message: "Email is registered!".into(),
            user: None,
        },
        RegisterOutcome::Created(user) => RegisterResponse {
            message: "user created".into(),
            user: Some(RegisteredUser {
                first_name: user.first_name,
                last_name: user.last_name,
                email: user.email,
            }),
        },
    };
    Ok(Json(response))
}

#[instrument(skip(state, token, payload))]
pub async fn confirm_registration_code(
    State(state): State<AppState>,
    token: SessionToken,
    Json(payload): Json<ConfirmRequest>,
) -> Result<Response, AppError> {
    match state
        .auth
        .confirm_registration(token.as_deref(), &payload.confirmation_code)
        .await?
    {
        ConfirmOutcome::Confirmed(binding) => {
            let body = ConfirmResponse {
                user_was_confirmed: true,
                user: ConfirmedUser::Snapshot(binding.identity.user().clone()),
                confirmation_code: None,
            };
            with_session(&state, &binding, body)
        }
        ConfirmOutcome::NotFound { code } => Ok(Json(ConfirmResponse {
            user_was_confirmed: false,
            user: ConfirmedUser::Missing("user not found"),
            confirmation_code: Some(code),
        })
        .into_response()),
    }
}

#[instrument(skip(state, token))]
pub async fn current_user(
    State(state): State<AppState>,
    token: SessionToken,
) -> Result<Response, AppError> {
    let binding = state.auth.current_user(token.as_deref()).await?;
    current_user_response(&state, binding)
}

#[instrument(skip(state, token))]
pub async fn logout(
    State(state): State<AppState>,
    token: SessionToken,
) -> Result<Response, AppError> {
    let binding = state.auth.logout(token.as_deref()).await?;
    current_user_response(&state, binding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::{groups, ANONYMOUS_EMAIL};
    use axum::{
        body::{to_bytes, Body},
        http::{header::COOKIE, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(state: AppState) -> Router {
        auth_routes().with_state(state)
    }

    fn post_json(uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(c) = cookie {
            builder = builder.header(COOKIE, c);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(c) = cookie {
            builder = builder.header(COOKIE, c);
        }
        builder.body(Body::empty()).unwrap()
    }

    /// Returns status, `sid=...` pair from Set-Cookie, and the JSON body.
    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Option<String>, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let cookie = res
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, cookie, json)
    }

    async fn register(app: &Router, email: &str, password: &str) -> Value {
        let (status, _, body) = send(
            app,
            post_json(
                "/register",
                None,
                json!({ "email": email, "password": password, "firstName": "Ada", "lastName": "L" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    #[tokio::test]
    async fn login_with_unknown_email_is_anonymous_200() {
        let app = app(AppState::fake());
        let (status, cookie, body) = send(
            &app,
            post_json("/login", None, json!({ "email": "ghost@x.com", "password": "pw" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(cookie.unwrap().starts_with("sid="));
        assert_eq!(body["currentUser"]["email"], ANONYMOUS_EMAIL);
    }

    #[tokio::test]
    async fn login_with_empty_body_is_anonymous_200() {
        let app = app(AppState::fake());
        let (status, _, body) = send(&app, post_json("/login", None, json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currentUser"]["email"], ANONYMOUS_EMAIL);
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_anonymous_200() {
        let app = app(AppState::fake());
        register(&app, "a@x.com", "pw1").await;
        let (status, _, body) = send(
            &app,
            post_json("/login", None, json!({ "email": "a@x.com", "password": "wrong" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currentUser"]["email"], ANONYMOUS_EMAIL);
    }

    #[tokio::test]
    async fn login_payload_never_carries_password() {
        let app = app(AppState::fake());
        register(&app, "a@x.com", "pw1").await;
        let (_, _, body) = send(
            &app,
            post_json("/login", None, json!({ "email": "a@x.com", "password": "pw1" })),
        )
        .await;
        let user = &body["currentUser"];
        assert_eq!(user["email"], "a@x.com");
        assert!(user.get("password").is_none());
        assert!(user.get("passwordHash").is_none());
        assert!(user.get("confirmationCode").is_none());
    }

    #[tokio::test]
    async fn duplicate_registration_reports_message() {
        let app = app(AppState::fake());
        let first = register(&app, "a@x.com", "pw1").await;
        assert_eq!(first["message"], "user created");
        assert_eq!(first["user"]["email"], "a@x.com");
        let second = register(&app, "a@x.com", "pw1").await;
        assert_eq!(second, json!({ "message": "Email is registered!" }));
    }

    #[tokio::test]
    async fn unknown_confirmation_code_echoes_code() {
        let app = app(AppState::fake());
        let (status, cookie, body) = send(
            &app,
            post_json("/confirm-registration-code", None, json!({ "confirmationCode": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(cookie.is_none());
        assert_eq!(body["userWasConfirmed"], false);
        assert_eq!(body["confirmationCode"], "nope");
    }

    #[tokio::test]
    async fn current_user_without_cookie_creates_anonymous_session() {
        let app = app(AppState::fake());
        let (status, cookie, body) = send(&app, get("/current-user", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(cookie.is_some());
        assert_eq!(body["currentUser"]["accessGroups"], json!([groups::LOGGED_OUT_USERS]));
    }

    #[tokio::test]
    async fn logout_re_anonymizes() {
        let app = app(AppState::fake());
        register(&app, "a@x.com", "pw1").await;
        let (_, cookie, body) = send(
            &app,
            post_json("/login", None, json!({ "email": "a@x.com", "password": "pw1" })),
        )
        .await;
        assert_eq!(body["currentUser"]["email"], "a@x.com");
        let cookie = cookie.unwrap();

        let (_, logout_cookie, body) = send(&app, get("/logout", Some(&cookie))).await;
        assert_eq!(body["currentUser"]["email"], ANONYMOUS_EMAIL);

        let (_, _, body) = send(&app, get("/current-user", logout_cookie.as_deref())).await;
        assert_eq!(body["currentUser"]["email"], ANONYMOUS_EMAIL);
        let (_, _, body) = send(&app, get("/current-user", Some(&cookie))).await;
        assert_eq!(body["currentUser"]["email"], ANONYMOUS_EMAIL);
    }

    #[tokio::test]
    async fn register_confirm_login_flow() {
        let state = AppState::fake();
        let app = app(state.clone());
        register(&app, "a@x.com", "pw1").await;
        let code = state
            .auth
            .users()
            .find_by_email("a@x.com")
            .await
            .unwrap()
            .and_then(|u| u.confirmation_code)
            .expect("code stored");

        let (_, cookie, body) = send(
            &app,
            post_json("/confirm-registration-code", None, json!({ "confirmationCode": code })),
        )
        .await;
        assert_eq!(body["userWasConfirmed"], true);
        assert!(cookie.is_some());

        let (_, cookie, _) = send(
            &app,
            post_json("/login", cookie.as_deref(), json!({ "email": "a@x.com", "password": "pw1" })),
        )
        .await;
        let (_, _, body) = send(&app, get("/current-user", cookie.as_deref())).await;
        let groups_json = body["currentUser"]["accessGroups"].as_array().unwrap().clone();
        assert!(groups_json.contains(&json!(groups::MEMBERS)));
    }

    #[tokio::test]
    async fn safe_origin_code_is_enforced_when_configured() {
        let mut config = AppState::fake_config();
        config.safe_origin_code = Some("s3cret".into());
        let app = app(AppState::fake_with(config));

        let res = app
            .clone()
            .oneshot(post_json("/login", None, json!({ "email": "a@x.com", "password": "pw" })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _, body) = send(
            &app,
            post_json(
                "/login",
                None,
                json!({ "email": "a@x.com", "password": "pw", "safeOriginCode": "s3cret" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currentUser"]["email"], ANONYMOUS_EMAIL);
    }
}
