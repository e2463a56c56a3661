//! Outbound mail seam. Campaign logic lives in the handlers; this module
//! only knows how to deliver one message.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &sibyl_core::config::SmtpConfig) -> Result<Self> {
        let user = config
            .user
            .clone()
            .ok_or_else(|| anyhow!("SMTP user is not configured"))?;
        let password = config
            .password
            .clone()
            .ok_or_else(|| anyhow!("SMTP password is not configured"))?;

        // Port 465 is implicit TLS; everything else goes through STARTTLS.
        let builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };
        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(user.clone(), password))
            .build();

        let from_email = config.from_email.clone().unwrap_or(user);
        Ok(Self {
            transport,
            from: format!("{} <{}>", config.from_name, from_email),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.parse().context("Invalid sender address")?)
            .to(to.parse().with_context(|| format!("Invalid recipient address '{}'", to))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;
        self.transport
            .send(message)
            .await
            .with_context(|| format!("Failed to send mail to {}", to))?;
        tracing::info!(recipient = %to, "Sent campaign message");
        Ok(())
    }
}
