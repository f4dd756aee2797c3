//! Outgoing email. Delivery is best effort; callers never wait on it.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use crate::config::{MailConfig, MailTransport};

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> anyhow::Result<()>;
}

/// Logs messages instead of delivering them. Selected with `MAILER_TRANSPORT=log`.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> anyhow::Result<()> {
        info!(to = %message.to, subject = %message.subject, "email not delivered (log transport)");
        Ok(())
    }
}

/// Delivers over SMTP with implicit TLS.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn from_config(cfg: &MailConfig) -> anyhow::Result<Self> {
        let password = cfg
            .account_password
            .clone()
            .context("smtp transport needs MAILER_ACCOUNT_PASSWORD")?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.smtp_host)
            .with_context(|| format!("smtp relay {}", cfg.smtp_host))?
            .port(cfg.smtp_port)
            .credentials(Credentials::new(cfg.account_name.clone(), password))
            .build();
        debug!(host = %cfg.smtp_host, port = cfg.smtp_port, "smtp transport ready");
        Ok(Self { transport })
    }
}

fn build_message(message: &EmailMessage) -> anyhow::Result<Message> {
    let from: Mailbox = message.from.parse().context("parse sender address")?;
    let to: Mailbox = message.to.parse().context("parse recipient address")?;
    Message::builder()
        .from(from)
        .to(to)
        .subject(message.subject.clone())
        .header(ContentType::TEXT_HTML)
        .body(message.html.clone())
        .context("build email")
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> anyhow::Result<()> {
        let email = build_message(&message)?;
        self.transport.send(email).await.context("smtp send")?;
        Ok(())
    }
}

/// Picks the configured transport.
pub fn mailer_from_config(cfg: &MailConfig) -> anyhow::Result<Arc<dyn Mailer>> {
    Ok(match cfg.transport {
        MailTransport::Smtp => Arc::new(SmtpMailer::from_config(cfg)?),
        MailTransport::Log => Arc::new(LogMailer),
    })
}

pub fn confirmation_url(frontend_base_url: &str, code: &str) -> String {
    format!(
        "{}/confirm-registration/{}",
        frontend_base_url.trim_end_matches('/'),
        code
    )
}

pub fn confirmation_email(cfg: &MailConfig, to: &str, confirm_url: &str) -> EmailMessage {
    EmailMessage {
        from: format!("{} <{}@gmail.com>", cfg.sender_name, cfg.account_name),
        to: to.to_string(),
        subject: "Please confirm your registration".into(),
        html: format!(
            "<h1>Thank you for your registration!</h1>\n\
             <p>We appreciate your membership!</p>\n\
             <p>Please click here to confirm your registration: <a href=\"{confirm_url}\">{confirm_url}</a></p>"
        ),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::sync::Mutex;

    /// Keeps every message; optionally fails delivery.
    #[derive(Default)]
    pub struct CapturingMailer {
        pub sent: Mutex<Vec<EmailMessage>>,
        pub fail: bool,
    }

    impl CapturingMailer {
        pub fn failing() -> Self {
            Self {
                sent: Mutex::default(),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl Mailer for CapturingMailer {
        async fn send(&self, message: EmailMessage) -> anyhow::Result<()> {
            self.sent.lock().await.push(message);
            if self.fail {
                anyhow::bail!("smtp unavailable");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_url_trims_trailing_slash() {
        assert_eq!(
            confirmation_url("https://app.example/", "abc"),
            "https://app.example/confirm-registration/abc"
        );
    }

    fn cfg(transport: MailTransport, password: Option<&str>) -> MailConfig {
        MailConfig {
            transport,
            account_name: "coach".into(),
            account_password: password.map(str::to_string),
            sender_name: "Coach".into(),
            smtp_host: "smtp.gmail.com".into(),
            smtp_port: 465,
        }
    }

    #[test]
    fn confirmation_email_links_code() {
        let cfg = cfg(MailTransport::Log, None);
        let msg = confirmation_email(&cfg, "a@x.com", "https://app/confirm-registration/abc");
        assert_eq!(msg.from, "Coach <coach@gmail.com>");
        assert_eq!(msg.to, "a@x.com");
        assert!(msg.html.contains("href=\"https://app/confirm-registration/abc\""));
    }

    #[test]
    fn confirmation_email_renders_as_html_mime() {
        let cfg = cfg(MailTransport::Smtp, Some("pw"));
        let msg = confirmation_email(&cfg, "a@x.com", "https://app/confirm-registration/abc");
        let raw = String::from_utf8(build_message(&msg).unwrap().formatted()).unwrap();
        assert!(raw.contains("To: a@x.com"));
        assert!(raw.contains("Subject: Please confirm your registration"));
        assert!(raw.contains("Content-Type: text/html"));
    }

    #[test]
    fn malformed_recipient_is_an_error() {
        let cfg = cfg(MailTransport::Smtp, Some("pw"));
        let msg = confirmation_email(&cfg, "not an address", "https://app/x");
        assert!(build_message(&msg).is_err());
    }

    #[tokio::test]
    async fn smtp_transport_requires_password() {
        assert!(SmtpMailer::from_config(&cfg(MailTransport::Smtp, None)).is_err());
        assert!(mailer_from_config(&cfg(MailTransport::Smtp, Some("pw"))).is_ok());
        assert!(mailer_from_config(&cfg(MailTransport::Log, None)).is_ok());
    }
}
