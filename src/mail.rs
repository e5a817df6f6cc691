use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_sesv2::{
    config::{Builder as SesConfigBuilder, Region},
    types::{Body, Content, Destination, EmailContent, Message},
    Client,
};
use tracing::info;

use crate::config::MailConfig;

/// A message for the out-of-band channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

impl OutboundMail {
    pub fn verification(to: &str, verify_url: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Verify your Portal email".into(),
            text: format!("Welcome! Please verify your email by visiting this link: {verify_url}"),
        }
    }

    pub fn temporary_password(to: &str, temp_password: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Your Portal temporary password".into(),
            text: format!(
                "Here is your temporary password: {temp_password}\n\nPlease log in and change it."
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutboundMail) -> anyhow::Result<()>;

    /// `false` when messages never leave the process.
    fn delivers(&self) -> bool {
        true
    }
}

/// AWS SES v2 transport.
#[derive(Clone)]
pub struct SesMailer {
    client: Client,
    from: String,
}

impl SesMailer {
    pub async fn new(cfg: &MailConfig) -> anyhow::Result<Self> {
        let mut loader = defaults(BehaviorVersion::latest()).region(Region::new(cfg.region.clone()));
        if let (Some(access_key), Some(secret_key)) = (&cfg.access_key, &cfg.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "static",
            ));
        }
        if let Some(endpoint) = &cfg.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let conf = SesConfigBuilder::from(&shared).build();
        Ok(Self {
            client: Client::from_conf(conf),
            from: cfg.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(&self, mail: OutboundMail) -> anyhow::Result<()> {
        let subject = Content::builder()
            .data(mail.subject)
            .charset("UTF-8")
            .build()
            .context("build subject")?;
        let text = Content::builder()
            .data(mail.text)
            .charset("UTF-8")
            .build()
            .context("build body")?;
        let message = Message::builder()
            .subject(subject)
            .body(Body::builder().text(text).build())
            .build();

        self.client
            .send_email()
            .from_email_address(&self.from)
            .destination(Destination::builder().to_addresses(&mail.to).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .context("ses send_email")?;
        info!(to = %mail.to, "mail sent");
        Ok(())
    }
}

/// Used when no transport is configured. Logs the envelope only: bodies can
/// carry temporary passwords.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutboundMail) -> anyhow::Result<()> {
        info!(to = %mail.to, subject = %mail.subject, "mail transport not configured; message dropped");
        Ok(())
    }

    fn delivers(&self) -> bool {
        false
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_mail_carries_the_link() {
        let mail = OutboundMail::verification("a@b.co", "http://h/api/auth/verify?token=abc");
        assert_eq!(mail.to, "a@b.co");
        assert!(mail.text.ends_with("token=abc"));
    }

    #[tokio::test]
    async fn recording_mailer_extracts_secrets() {
        let m = testing::RecordingMailer::default();
        m.send(OutboundMail::verification("a@b.co", "http://h/api/auth/verify?token=abc"))
            .await
            .unwrap();
        m.send(OutboundMail::temporary_password("a@b.co", "Zx81Qa7kLm"))
            .await
            .unwrap();
        assert_eq!(m.temporary_password("a@b.co").as_deref(), Some("Zx81Qa7kLm"));
        assert!(m.verification_token("a@b.co").is_none());
    }

    #[tokio::test]
    async fn log_mailer_never_fails_but_does_not_deliver() {
        LogMailer
            .send(OutboundMail::temporary_password("a@b.co", "secret"))
            .await
            .unwrap();
        assert!(!LogMailer.delivers());
        assert!(testing::RecordingMailer::default().delivers());
    }
}
