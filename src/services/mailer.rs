use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};

use crate::config::SmtpConfig;

/// Seam to transactional email delivery. Tests substitute a recording
/// implementation; production uses SMTP via lettre.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, text_body: &str, html_body: &str)
        -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .with_context(|| format!("invalid sender address: {}", config.from))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .context("failed to create SMTP transport")?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .port(config.port)
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<()> {
        let to_mailbox: Mailbox = to
            .parse()
            .with_context(|| format!("invalid recipient address: {}", to))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .context("failed to build email message")?;

        self.transport
            .send(message)
            .await
            .map_err(|e| anyhow!("SMTP send failed: {}", e))?;

        tracing::info!(%to, subject, "email dispatched");
        Ok(())
    }
}

/// Subject, text body and html body for the verification email.
pub fn verification_email(base_url: &str, token: &str) -> (String, String, String) {
    let link = format!("{}/api/v1/users/verify/{}", base_url, token);
    (
        "Verify your email".to_string(),
        format!("Please verify your email by clicking on the link:\n{}", link),
        format!(
            r#"<p>Please verify your email by clicking <a href="{}">here</a></p>"#,
            link
        ),
    )
}

/// Subject, text body and html body for the password-reset email.
pub fn reset_email(base_url: &str, token: &str) -> (String, String, String) {
    let link = format!("{}/api/v1/users/reset/{}", base_url, token);
    (
        "Reset your password".to_string(),
        format!(
            "A password reset was requested for your account. Reset it within 1 hour:\n{}\n\nIf you didn't request this, you can ignore this email.",
            link
        ),
        format!(
            r#"<p>A password reset was requested for your account. Click <a href="{}">here</a> to reset it. The link expires in 1 hour.</p><p>If you didn't request this, you can ignore this email.</p>"#,
            link
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_link_embeds_the_token() {
        let (subject, text, html) = verification_email("http://localhost:8000", "abc123");
        assert_eq!(subject, "Verify your email");
        assert!(text.contains("http://localhost:8000/api/v1/users/verify/abc123"));
        assert!(html.contains("http://localhost:8000/api/v1/users/verify/abc123"));
    }

    #[test]
    fn reset_link_embeds_the_token() {
        let (_, text, _) = reset_email("http://localhost:8000", "abc123");
        assert!(text.contains("http://localhost:8000/api/v1/users/reset/abc123"));
    }
}
