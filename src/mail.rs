use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{authentication::Credentials, client::{Tls, TlsParameters}},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{error, info, instrument};

use crate::config::SmtpConfig;

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    #[instrument(skip(cfg), fields(host = %cfg.host, port = cfg.port))]
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let tls = TlsParameters::new(cfg.host.clone()).context("smtp tls parameters")?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.host)
            .port(cfg.port)
            .timeout(Some(std::time::Duration::from_secs(10)));
        builder = if cfg.starttls {
            builder.tls(Tls::Required(tls))
        } else {
            builder.tls(Tls::Wrapper(tls))
        };
        if !cfg.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                cfg.username.clone(),
                cfg.password.clone(),
            ));
        }

        let from: Mailbox = format!("{} <{}>", cfg.from_name, cfg.from_email)
            .parse()
            .context("invalid from address")?;

        info!("smtp mailer initialized");
        Ok(Self {
            from,
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, message), fields(to = %message.to, subject = %message.subject))]
    async fn send(&self, message: EmailMessage) -> anyhow::Result<()> {
        let to: Mailbox = message.to.parse().context("invalid recipient address")?;
        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&message.subject)
            .header(ContentType::TEXT_HTML)
            .body(message.html_body)
            .context("build email")?;

        self.transport.send(email).await.map_err(|e| {
            error!(error = %e, "smtp send failed");
            anyhow::anyhow!("smtp send failed: {e}")
        })?;
        info!("email sent");
        Ok(())
    }
}

pub fn verification_code_email(to: &str, code: i32, ttl_minutes: i64) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Bookworm Library Verification Code".into(),
        html_body: format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px; border: 1px solid #ddd; border-radius: 8px; background-color: #000; color: #fff;">
    <h2 style="color: #fff; text-align: center;">Verify Your Email Address</h2>
    <p style="font-size: 16px; color: #ccc;">Dear User,</p>
    <p style="font-size: 16px; color: #ccc;">To complete your registration or login, please use the following verification code:</p>
    <div style="text-align: center; margin: 20px 0;">
        <span style="display: inline-block; font-size: 24px; font-weight: bold; color: #000; padding: 10px 20px; border: 1px solid #fff; border-radius: 5px; background-color: #fff;">{code}</span>
    </div>
    <p style="font-size: 16px; color: #ccc;">This code will expire in {ttl_minutes} minutes. Please do not share this code with anyone.</p>
    <p style="font-size: 16px; color: #ccc;">If you did not request this email, please ignore it.</p>
    <footer style="margin-top: 20px; text-align: center; font-size: 14px; color: #666;">
        <p>Thank you,<br>Bookworm Team</p>
    </footer>
</div>"#
        ),
    }
}

pub fn forgot_password_email(to: &str, reset_url: &str, ttl_minutes: i64) -> EmailMessage {
    let reset_url = html_escape::encode_double_quoted_attribute(reset_url);
    EmailMessage {
        to: to.to_string(),
        subject: "Bookworm Library Password Recovery".into(),
        html_body: format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px; border: 1px solid #ddd; border-radius: 8px; background-color: #000; color: #fff;">
    <h2 style="color: #fff; text-align: center;">Reset Your Password</h2>
    <p style="font-size: 16px; color: #ccc;">Dear User,</p>
    <p style="font-size: 16px; color: #ccc;">You requested to reset your password. Please click the button below to proceed:</p>
    <div style="text-align: center; margin: 20px 0;">
        <a href="{reset_url}" style="display: inline-block; font-size: 16px; font-weight: bold; color: #000; text-decoration: none; padding: 12px 20px; border: 1px solid #fff; border-radius: 5px; background-color: #fff;">Reset Password</a>
    </div>
    <p style="font-size: 16px; color: #ccc;">If you did not request this, please ignore this email. The link will expire in {ttl_minutes} minutes.</p>
    <p style="font-size: 16px; color: #ccc;">If the button above doesn't work, copy and paste the following URL into your browser:</p>
    <p style="font-size: 16px; color: #fff; word-wrap: break-word;">{reset_url}</p>
    <footer style="margin-top: 20px; text-align: center; font-size: 14px; color: #666;">
        <p>Thank you,<br>Bookworm Team</p>
    </footer>
</div>"#
        ),
    }
}
