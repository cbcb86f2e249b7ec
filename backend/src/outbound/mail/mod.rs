//! Outbound mail adapters.
//!
//! [`LoggingMailer`] is the default delivery stub: it writes messages to the
//! `medisecure::mail` tracing target. [`SmtpMailer`] relays through an SMTP
//! server when one is configured.

mod logging;
mod smtp;

pub use logging::LoggingMailer;
pub use smtp::{SmtpMailer, SmtpMailerConfig, SmtpMailerError};
