use serde::Deserialize;

/// Where sessions are kept between requests.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(self) -> &'static str {
        match self {
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub ttl_seconds: i64,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub same_site: SameSite,
    pub backend: SessionBackend,
    /// How often expired sessions are purged.
    pub sweep_interval_seconds: u64,
}

/// How confirmation emails leave the process.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    Smtp,
    /// Writes messages to the log only. Local development.
    Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub transport: MailTransport,
    pub account_name: String,
    pub account_password: Option<String>,
    pub sender_name: String,
    pub smtp_host: String,
    pub smtp_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    pub cloud_name: String,
    pub default_public_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub frontend_base_url: String,
    pub safe_origin_code: Option<String>,
    pub session: SessionConfig,
    pub mail: MailConfig,
    pub images: ImageConfig,
}

pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 9000;
pub const DEFAULT_SESSION_SWEEP_SECONDS: u64 = 300;

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source; `from_env` passes the process environment.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let Some(database_url) = var("DATABASE_URL") else {
            anyhow::bail!("DATABASE_URL is not set");
        };
        let production = var("APP_ENV").as_deref() == Some("production");

        let backend = match var("SESSION_BACKEND").as_deref() {
            Some("memory") => SessionBackend::Memory,
            Some("postgres") | None => SessionBackend::Postgres,
            Some(other) => anyhow::bail!("unknown SESSION_BACKEND {other:?}"),
        };

        let session = SessionConfig {
            ttl_seconds: var("SESSION_TTL_SECONDS")
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(DEFAULT_SESSION_TTL_SECONDS),
            cookie_name: var("SESSION_COOKIE_NAME").unwrap_or_else(|| "sid".into()),
            cookie_secure: production,
            same_site: if production { SameSite::None } else { SameSite::Lax },
            backend,
            sweep_interval_seconds: var("SESSION_SWEEP_SECONDS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_SESSION_SWEEP_SECONDS),
        };

        let transport = match var("MAILER_TRANSPORT").as_deref() {
            Some("smtp") | None => MailTransport::Smtp,
            Some("log") => MailTransport::Log,
            Some(other) => anyhow::bail!("unknown MAILER_TRANSPORT {other:?}"),
        };
        let account_password = var("MAILER_ACCOUNT_PASSWORD").filter(|v| !v.is_empty());
        if transport == MailTransport::Smtp && account_password.is_none() {
            anyhow::bail!("MAILER_ACCOUNT_PASSWORD is required for the smtp transport (set MAILER_TRANSPORT=log to skip delivery)");
        }
        let mail = MailConfig {
            transport,
            account_name: var("MAILER_ACCOUNT_NAME").unwrap_or_else(|| "deutschify".into()),
            account_password,
            sender_name: var("MAILER_SENDER_NAME")
                .unwrap_or_else(|| "Deutschify Der Integrationscoach".into()),
            smtp_host: var("MAILER_SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".into()),
            smtp_port: var("MAILER_SMTP_PORT")
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(465),
        };

        let images = ImageConfig {
            cloud_name: var("IMAGE_CLOUD_NAME").unwrap_or_else(|| "deutschify".into()),
            default_public_id: var("DEFAULT_IMAGE_PUBLIC_ID")
                .unwrap_or_else(|| "c4nct0lzjndw2u69zbyx".into()),
        };

        Ok(Self {
            database_url,
            frontend_base_url: var("FRONTEND_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".into()),
            safe_origin_code: var("SAFE_ORIGIN_CODE").filter(|v| !v.is_empty()),
            session,
            mail,
            images,
        })
    }
}
