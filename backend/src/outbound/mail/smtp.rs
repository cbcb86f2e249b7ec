//! SMTP relay through `lettre`.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::info;
use zeroize::Zeroizing;

use crate::domain::ports::{MailMessage, Mailer, MailerError};

/// Connection settings for [`SmtpMailer`].
#[derive(Debug, Clone)]
pub struct SmtpMailerConfig {
    /// Relay host.
    pub host: String,
    /// Relay port; STARTTLS is negotiated.
    pub port: u16,
    /// Login, when the relay requires authentication.
    pub username: Option<String>,
    /// Password for `username`.
    pub password: Option<Zeroizing<String>>,
    /// `From` address, e.g. `MediSecure <no-reply@example.com>`.
    pub from: String,
}

/// Errors raised while building the SMTP transport.
#[derive(Debug, Error)]
pub enum SmtpMailerError {
    /// The sender address does not parse.
    #[error("invalid from address: {0}")]
    InvalidFrom(#[from] lettre::address::AddressError),
    /// The relay could not be configured.
    #[error("invalid smtp relay: {0}")]
    Relay(#[from] lettre::transport::smtp::Error),
}

/// [`Mailer`] delivering through an SMTP relay.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build a mailer from `config`.
    ///
    /// # Errors
    /// Returns [`SmtpMailerError`] for an unparsable sender or relay host.
    pub fn new(config: &SmtpMailerConfig) -> Result<Self, SmtpMailerError> {
        let from: Mailbox = config.from.parse()?;
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?.port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.as_str().to_owned(),
            ));
        }
        info!(host = %config.host, port = config.port, "smtp mailer configured");
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailerError> {
        let to: Mailbox = message
            .to
            .as_ref()
            .parse()
            .map_err(|err: lettre::address::AddressError| MailerError::compose(err.to_string()))?;
        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|err| MailerError::compose(err.to_string()))?;
        self.transport
            .send(email)
            .await
            .map_err(|err| MailerError::transport(err.to_string()))?;
        Ok(())
    }
}
