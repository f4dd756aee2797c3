//! Server-side sessions keyed by an opaque cookie token.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use axum::http::{header::InvalidHeaderValue, HeaderMap, HeaderValue};
use rand::RngCore;
use sqlx::{types::Json, PgPool};
use time::OffsetDateTime;
use tokio::{sync::RwLock, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::auth::repo_types::SessionUser;
use crate::config::SessionConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
    pub expires_at: OffsetDateTime,
}

impl Session {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the live session for `token`; expired sessions are dropped and reported as `None`.
    async fn get(&self, token: &str) -> anyhow::Result<Option<Session>>;
    async fn set(&self, session: Session) -> anyhow::Result<()>;
    async fn remove(&self, token: &str) -> anyhow::Result<()>;
    /// Drops every expired session and returns how many were removed.
    async fn purge_expired(&self) -> anyhow::Result<u64>;
}

/// Purges expired sessions every `every` until the returned task is aborted.
pub fn spawn_sweeper(store: Arc<dyn SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(n) => info!(purged = n, "expired sessions purged"),
                Err(e) => warn!(error = %e, "session purge failed"),
            }
        }
    })
}

/// 32 random bytes, hex encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, token: &str) -> anyhow::Result<Option<Session>> {
        let now = OffsetDateTime::now_utc();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                Some(s) if !s.is_expired(now) => return Ok(Some(s.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        debug!("dropping expired session");
        self.sessions.write().await.remove(token);
        Ok(None)
    }

    async fn set(&self, session: Session) -> anyhow::Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session);
        Ok(())
    }

    async fn remove(&self, token: &str) -> anyhow::Result<()> {
        self.sessions.write().await.remove(token);
        Ok(())
    }

    async fn purge_expired(&self) -> anyhow::Result<u64> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}

#[derive(Clone)]
pub struct PgSessionStore {
    db: PgPool,
}

impl PgSessionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get(&self, token: &str) -> anyhow::Result<Option<Session>> {
        let row = sqlx::query_as::<_, (Json<SessionUser>, OffsetDateTime)>(
            r#"
            SELECT user_snapshot, expires_at
              FROM sessions
             WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await
        .context("lookup session")?;

        let Some((Json(user), expires_at)) = row else {
            return Ok(None);
        };
        let session = Session {
            token: token.to_string(),
            user,
            expires_at,
        };
        if session.is_expired(OffsetDateTime::now_utc()) {
            debug!("dropping expired session");
            self.remove(token).await?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    async fn set(&self, session: Session) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (token, user_snapshot, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (token)
            DO UPDATE SET user_snapshot = EXCLUDED.user_snapshot,
                          expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&session.token)
        .bind(Json(&session.user))
        .bind(session.expires_at)
        .execute(&self.db)
        .await
        .context("upsert session")?;
        Ok(())
    }

    async fn remove(&self, token: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.db)
            .await
            .context("delete session")?;
        Ok(())
    }

    async fn purge_expired(&self) -> anyhow::Result<u64> {
        let done = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(&self.db)
            .await
            .context("purge expired sessions")?;
        Ok(done.rows_affected())
    }
}

/// Reads the session token out of the `Cookie` header.
pub fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == cookie_name).then(|| val.trim().to_string())
        })
        .find(|val| !val.is_empty())
}

/// `Set-Cookie` value for a bound session. `HttpOnly` is always set.
pub fn session_cookie(cfg: &SessionConfig, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite={}; Max-Age={}",
        cfg.cookie_name,
        token,
        cfg.same_site.as_str(),
        cfg.ttl_seconds
    );
    if cfg.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SameSite, SessionBackend};
    use axum::http::header::COOKIE;
    use uuid::Uuid;

    fn snapshot() -> SessionUser {
        SessionUser {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            first_name: "A".into(),
            last_name: "X".into(),
            language: None,
            nationality: None,
            image_public_id: None,
            access_groups: vec!["members".into()],
            rating: 0,
            feedback: String::new(),
        }
    }

    fn cfg(secure: bool, same_site: SameSite) -> SessionConfig {
        SessionConfig {
            ttl_seconds: 9000,
            cookie_name: "sid".into(),
            cookie_secure: secure,
            same_site,
            backend: SessionBackend::Memory,
            sweep_interval_seconds: 300,
        }
    }

    fn session(token: &str, ttl_seconds: i64) -> Session {
        Session {
            token: token.into(),
            user: snapshot(),
            expires_at: OffsetDateTime::now_utc() + time::Duration::seconds(ttl_seconds),
        }
    }

    #[test]
    fn tokens_are_unique_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn memory_store_returns_live_sessions() {
        let store = MemorySessionStore::new();
        let session = Session {
            token: "t1".into(),
            user: snapshot(),
            expires_at: OffsetDateTime::now_utc() + time::Duration::seconds(60),
        };
        store.set(session.clone()).await.unwrap();
        assert_eq!(store.get("t1").await.unwrap(), Some(session));
        assert_eq!(store.get("other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_drops_expired_sessions() {
        let store = MemorySessionStore::new();
        store
            .set(Session {
                token: "old".into(),
                user: snapshot(),
                expires_at: OffsetDateTime::now_utc() - time::Duration::seconds(1),
            })
            .await
            .unwrap();
        assert_eq!(store.get("old").await.unwrap(), None);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn memory_store_remove() {
        let store = MemorySessionStore::new();
        store
            .set(Session {
                token: "t".into(),
                user: snapshot(),
                expires_at: OffsetDateTime::now_utc() + time::Duration::seconds(60),
            })
            .await
            .unwrap();
        store.remove("t").await.unwrap();
        assert_eq!(store.get("t").await.unwrap(), None);
    }

    #[tokio::test]
    async fn purge_evicts_expired_sessions_without_lookup() {
        let store = MemorySessionStore::new();
        store.set(session("old-1", -5)).await.unwrap();
        store.set(session("old-2", -1)).await.unwrap();
        store.set(session("live", 60)).await.unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 2);
        assert_eq!(store.len().await, 1);
        assert!(store.get("live").await.unwrap().is_some());
        assert_eq!(store.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sweeper_purges_in_background() {
        let store = Arc::new(MemorySessionStore::new());
        store.set(session("old", -1)).await.unwrap();
        store.set(session("live", 60)).await.unwrap();

        let sweeper = spawn_sweeper(store.clone(), Duration::from_millis(10));
        for _ in 0..100 {
            if store.len().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        sweeper.abort();
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn extracts_token_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; sid=abc123; lang=de"));
        assert_eq!(extract_session_token(&headers, "sid"), Some("abc123".into()));
        assert_eq!(extract_session_token(&headers, "missing"), None);
    }

    #[test]
    fn empty_cookie_value_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("sid="));
        assert_eq!(extract_session_token(&headers, "sid"), None);
    }

    #[test]
    fn cookie_attributes_follow_environment() {
        let dev = session_cookie(&cfg(false, SameSite::Lax), "tok").unwrap();
        let dev = dev.to_str().unwrap();
        assert!(dev.contains("sid=tok"));
        assert!(dev.contains("HttpOnly"));
        assert!(dev.contains("SameSite=Lax"));
        assert!(dev.contains("Max-Age=9000"));
        assert!(!dev.contains("Secure"));

        let prod = session_cookie(&cfg(true, SameSite::None), "tok").unwrap();
        let prod = prod.to_str().unwrap();
        assert!(prod.contains("HttpOnly"));
        assert!(prod.contains("SameSite=None"));
        assert!(prod.ends_with("; Secure"));
    }
}
