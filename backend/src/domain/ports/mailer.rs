//! Port for outbound email.
use async_trait::async_trait;

use crate::domain::{Email, Error, VerificationCode};

use super::define_port_error;

define_port_error! {
    /// Errors raised by mail adapters.
    pub enum MailerError {
        /// The message could not be built.
        Compose { message: String } => "mail composition failed: {message}",
        /// The transport rejected or failed to deliver the message.
        Transport { message: String } => "mail delivery failed: {message}",
    }
}

impl From<MailerError> for Error {
    fn from(err: MailerError) -> Self {
        match err {
            MailerError::Compose { message } => Error::internal(message),
            MailerError::Transport { message } => {
                Error::service_unavailable(format!("mail delivery unavailable: {message}"))
            }
        }
    }
}

/// Plain-text email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    /// Recipient.
    pub to: Email,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

impl MailMessage {
    /// Email confirmation code for a new registration.
    pub fn email_verification(to: Email, full_name: &str, code: &VerificationCode) -> Self {
        Self {
            to,
            subject: "Verify your MediSecure account".to_owned(),
            body: format!(
                "Hello {full_name},\n\nYour verification code is {}.\nIt expires in 10 minutes.\n",
                code.as_str()
            ),
        }
    }

    /// Code confirming a login from an unrecognised device.
    pub fn device_verification(to: Email, device_name: Option<&str>, code: &VerificationCode) -> Self {
        let device = device_name.unwrap_or("an unrecognised device");
        Self {
            to,
            subject: "New device sign-in".to_owned(),
            body: format!(
                "A sign-in was attempted from {device}.\nEnter code {} to trust this device.\n",
                code.as_str()
            ),
        }
    }

    /// Password reset code.
    pub fn password_reset(to: Email, code: &VerificationCode) -> Self {
        Self {
            to,
            subject: "Reset your MediSecure password".to_owned(),
            body: format!(
                "Your password reset code is {}.\nIf you did not request a reset, ignore this message.\n",
                code.as_str()
            ),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver `message`.
    async fn send(&self, message: &MailMessage) -> Result<(), MailerError>;
}
