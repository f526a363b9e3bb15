use crate::config::EmailConfig;
use crate::errors::{ServiceError, ServiceResult};
use crate::services::otp_service::OtpPurpose;
use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::str::FromStr;

/// Outbound channel for one-time codes.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(
        &self,
        to_email: &str,
        purpose: OtpPurpose,
        code: &str,
        ttl_minutes: i64,
    ) -> ServiceResult<()>;
}

pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    config: EmailConfig,
}

impl EmailService {
    /// Creates a new EmailService instance
    pub fn new(config: EmailConfig) -> ServiceResult<Self> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| ServiceError::validation(format!("Invalid SMTP host: {e}")))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self { mailer, config })
    }

    /// Sends a generic email
    pub async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> ServiceResult<()> {
        let from_mailbox = Mailbox::from_str(&format!(
            "{} <{}>",
            self.config.from_name, self.config.from_email
        ))
        .map_err(|e| ServiceError::validation(format!("Invalid from email: {e}")))?;

        let to_mailbox = Mailbox::from_str(to_email)
            .map_err(|e| ServiceError::validation(format!("Invalid recipient email: {e}")))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                lettre::message::MultiPart::alternative()
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_content.to_string()),
                    )
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_content.to_string()),
                    ),
            )
            .map_err(|e| ServiceError::internal_error(format!("Failed to build email: {e}")))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| ServiceError::external_service(format!("Failed to send email: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl Mailer for EmailService {
    async fn send_otp(
        &self,
        to_email: &str,
        purpose: OtpPurpose,
        code: &str,
        ttl_minutes: i64,
    ) -> ServiceResult<()> {
        let (subject, action) = otp_wording(purpose);
        let html_content = build_otp_html(action, code, ttl_minutes);
        let text_content = build_otp_text(action, code, ttl_minutes);

        self.send_email(to_email, subject, &html_content, &text_content)
            .await
    }
}

fn otp_wording(purpose: OtpPurpose) -> (&'static str, &'static str) {
    match purpose {
        OtpPurpose::PasswordReset => ("Your password reset code", "reset your password"),
        OtpPurpose::EmailVerification => ("Verify your email address", "verify your email address"),
    }
}

fn build_otp_html(action: &str, code: &str, ttl_minutes: i64) -> String {
    format!(
        r#"
        <!DOCTYPE html>
        <html>
        <head>
            <meta charset="UTF-8">
            <title>Your verification code</title>
        </head>
        <body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
            <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
                <p>Use the code below to {}:</p>

                <div style="text-align: center; margin: 30px 0; font-size: 32px;
                            letter-spacing: 8px; font-weight: bold;">
                    {}
                </div>

                <hr style="border: none; border-top: 1px solid #ecf0f1; margin: 30px 0;">

                <p style="font-size: 12px; color: #7f8c8d;">
                    This code expires in {} minutes. If you did not request it,
                    you can safely ignore this email.
                </p>
            </div>
        </body>
        </html>
        "#,
        action, code, ttl_minutes
    )
}

fn build_otp_text(action: &str, code: &str, ttl_minutes: i64) -> String {
    format!(
        r#"Use the code below to {}:

{}

This code expires in {} minutes. If you did not request it, you can safely ignore this email.
"#,
        action, code, ttl_minutes
    )
}

/// Captures sent codes instead of delivering them.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: std::sync::Mutex<Vec<(String, OtpPurpose, String)>>,
    pub fail: bool,
    /// Held before every send, standing in for a slow relay.
    pub delay: Option<std::time::Duration>,
}

#[cfg(test)]
impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: std::time::Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Codes are mailed from a background task; poll until one arrives.
    pub async fn wait_for_code(&self, email: &str, purpose: OtpPurpose) -> String {
        for _ in 0..200 {
            if let Some(code) = self.last_code(email, purpose) {
                return code;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("no {purpose} code was mailed to {email}");
    }

    pub async fn wait_for_count(&self, expected: usize) {
        for _ in 0..200 {
            if self.count() >= expected {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("expected {expected} mails, saw {}", self.count());
    }

    /// Most recent code sent to `email` for `purpose`.
    pub fn last_code(&self, email: &str, purpose: OtpPurpose) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, p, _)| to == email && *p == purpose)
            .map(|(_, _, code)| code.clone())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_otp(
        &self,
        to_email: &str,
        purpose: OtpPurpose,
        code: &str,
        _ttl_minutes: i64,
    ) -> ServiceResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ServiceError::external_service("SMTP relay unavailable"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to_email.to_string(), purpose, code.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_bodies_contain_code_and_expiry() {
        let (_, action) = otp_wording(OtpPurpose::PasswordReset);
        let html = build_otp_html(action, "123456", 10);
        let text = build_otp_text(action, "123456", 10);

        for body in [&html, &text] {
            assert!(body.contains("123456"));
            assert!(body.contains("10 minutes"));
            assert!(body.contains("reset your password"));
        }
    }
}
