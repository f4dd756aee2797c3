//! Session-based identity resolution.
//!
//! Every caller ends up bound to either a real user or the anonymous account;
//! no operation here leaves a request without a usable session. Bad credentials
//! are absorbed into the anonymous path instead of being reported.

use std::sync::Arc;

use lazy_static::lazy_static;
use rand::RngCore;
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{debug, error, info, warn};

use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::auth::repo::UserStore;
use crate::auth::repo_types::{groups, NewUser, SessionUser, User, ANONYMOUS_EMAIL};
use crate::auth::session::{generate_token, Session, SessionStore};
use crate::config::{AppConfig, MailConfig};
use crate::mail::{confirmation_email, confirmation_url, Mailer};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("anonymous user is missing")]
    AnonymousUserMissing,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Who the caller resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    Authenticated(SessionUser),
    Anonymous(SessionUser),
}

impl Identity {
    fn from_user(user: SessionUser) -> Self {
        if user.is_anonymous() {
            Identity::Anonymous(user)
        } else {
            Identity::Authenticated(user)
        }
    }

    pub fn user(&self) -> &SessionUser {
        match self {
            Identity::Authenticated(u) | Identity::Anonymous(u) => u,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous(_))
    }
}

/// A session that has just been written to the store.
#[derive(Debug, Clone)]
pub struct SessionBinding {
    pub token: String,
    pub identity: Identity,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub language: Option<String>,
    pub nationality: Option<String>,
}

#[derive(Debug)]
pub enum RegisterOutcome {
    Invalid(&'static str),
    EmailTaken,
    Created(User),
}

#[derive(Debug)]
pub enum ConfirmOutcome {
    Confirmed(SessionBinding),
    NotFound { code: String },
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 10 random bytes, hex encoded.
fn generate_confirmation_code() -> String {
    let mut bytes = [0u8; 10];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub struct AuthFlow {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    mailer: Arc<dyn Mailer>,
    ttl: Duration,
    frontend_base_url: String,
    mail: MailConfig,
    default_image_public_id: String,
}

impl AuthFlow {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        mailer: Arc<dyn Mailer>,
        config: &AppConfig,
    ) -> Self {
        Self {
            users,
            sessions,
            mailer,
            ttl: Duration::seconds(config.session.ttl_seconds),
            frontend_base_url: config.frontend_base_url.clone(),
            mail: config.mail.clone(),
            default_image_public_id: config.images.default_public_id.clone(),
        }
    }

    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Replaces whatever `prior` pointed at with a fresh session for `user`.
    async fn bind(&self, prior: Option<&str>, user: SessionUser) -> Result<SessionBinding, AuthError> {
        if let Some(old) = prior {
            self.sessions.remove(old).await?;
        }
        let session = Session {
            token: generate_token(),
            user,
            expires_at: OffsetDateTime::now_utc() + self.ttl,
        };
        self.sessions.set(session.clone()).await?;
        debug!(user_id = %session.user.id, "session bound");
        Ok(SessionBinding {
            token: session.token,
            identity: Identity::from_user(session.user),
            expires_at: session.expires_at,
        })
    }

    pub async fn login(
        &self,
        prior: Option<&str>,
        email: &str,
        password: &str,
    ) -> Result<SessionBinding, AuthError> {
        let email = normalize_email(email);
        match self.users.find_by_email(&email).await? {
            Some(user) if !user.is_anonymous() => {
                match verify_password_blocking(password.to_string(), user.password_hash.clone()).await {
                    Ok(true) => {
                        info!(user_id = %user.id, "user logged in");
                        return self.bind(prior, SessionUser::from(&user)).await;
                    }
                    Ok(false) => warn!(user_id = %user.id, "login invalid password"),
                    Err(e) => warn!(user_id = %user.id, error = %e, "stored password hash unusable"),
                }
            }
            _ => warn!(email = %email, "login unknown email"),
        }
        self.anonymous_login(prior).await
    }

    pub async fn anonymous_login(&self, prior: Option<&str>) -> Result<SessionBinding, AuthError> {
        let Some(anonymous) = self.users.find_by_email(ANONYMOUS_EMAIL).await? else {
            error!("anonymous user record is missing");
            return Err(AuthError::AnonymousUserMissing);
        };
        self.bind(prior, SessionUser::from(&anonymous)).await
    }

    /// Resolves the caller, extending a live session or falling back to anonymous.
    pub async fn current_user(&self, token: Option<&str>) -> Result<SessionBinding, AuthError> {
        if let Some(token) = token {
            if let Some(session) = self.sessions.get(token).await? {
                return self.refresh(session).await;
            }
        }
        self.anonymous_login(token).await
    }

    async fn refresh(&self, mut session: Session) -> Result<SessionBinding, AuthError> {
        session.expires_at = OffsetDateTime::now_utc() + self.ttl;
        self.sessions.set(session.clone()).await?;
        Ok(SessionBinding {
            token: session.token,
            identity: Identity::from_user(session.user),
            expires_at: session.expires_at,
        })
    }

    /// Swaps the snapshot held by a live session, e.g. after a profile write.
    pub async fn replace_snapshot(
        &self,
        token: &str,
        user: &User,
    ) -> Result<SessionBinding, AuthError> {
        self.refresh(Session {
            token: token.to_string(),
            user: SessionUser::from(user),
            expires_at: OffsetDateTime::now_utc(),
        })
        .await
    }

    pub async fn register(&self, input: RegisterInput) -> Result<RegisterOutcome, AuthError> {
        let email = normalize_email(&input.email);
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Ok(RegisterOutcome::Invalid("Invalid email"));
        }
        if input.password.is_empty() {
            return Ok(RegisterOutcome::Invalid("Password is required"));
        }
        if self.users.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Ok(RegisterOutcome::EmailTaken);
        }

        let password_hash = hash_password_blocking(input.password).await?;
        let confirmation_code = generate_confirmation_code();
        let created = self
            .users
            .create(NewUser {
                email: email.clone(),
                password_hash,
                first_name: input.first_name,
                last_name: input.last_name,
                language: input.language,
                nationality: input.nationality,
                image_public_id: Some(self.default_image_public_id.clone()),
                access_groups: groups::unconfirmed(),
                confirmation_code: confirmation_code.clone(),
            })
            .await?;
        let Some(user) = created else {
            warn!(email = %email, "email registered concurrently");
            return Ok(RegisterOutcome::EmailTaken);
        };

        self.dispatch_confirmation(&user.email, &confirmation_code);
        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(RegisterOutcome::Created(user))
    }

    fn dispatch_confirmation(&self, to: &str, code: &str) {
        let url = confirmation_url(&self.frontend_base_url, code);
        let message = confirmation_email(&self.mail, to, &url);
        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            let to = message.to.clone();
            match mailer.send(message).await {
                Ok(()) => info!(to = %to, "confirmation email sent"),
                Err(e) => error!(to = %to, error = %e, "confirmation email failed"),
            }
        });
    }

    pub async fn confirm_registration(
        &self,
        prior: Option<&str>,
        code: &str,
    ) -> Result<ConfirmOutcome, AuthError> {
        let Some(user) = self.users.confirm(code).await? else {
            warn!("unknown confirmation code");
            return Ok(ConfirmOutcome::NotFound {
                code: code.to_string(),
            });
        };
        info!(user_id = %user.id, "registration confirmed");
        let binding = self.bind(prior, SessionUser::from(&user)).await?;
        Ok(ConfirmOutcome::Confirmed(binding))
    }

    pub async fn logout(&self, prior: Option<&str>) -> Result<SessionBinding, AuthError> {
        self.anonymous_login(prior).await
    }
}
