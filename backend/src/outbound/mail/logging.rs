//! Mailer that only logs.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::ports::{MailMessage, Mailer, MailerError};

/// [`Mailer`] writing messages to the log instead of sending them.
///
/// Recipient and subject go out at `info`; the body, which carries one-time
/// codes, only at `debug` so production filters drop it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMailer;

#[async_trait]
impl Mailer for LoggingMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailerError> {
        info!(target: "medisecure::mail", to = %message.to, subject = %message.subject, "mail queued");
        debug!(target: "medisecure::mail", body = %message.body, "mail body");
        Ok(())
    }
}
