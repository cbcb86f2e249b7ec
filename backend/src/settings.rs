//! Application settings loaded via OrthoConfig.
//!
//! Values come from `MEDISECURE_*` environment variables, an optional
//! configuration file and command-line flags. Secret material is not read
//! here; see [`crate::inbound::http::security_config`].

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::domain::AuthPolicy;
use crate::outbound::mail::SmtpMailerConfig;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_MAIL_FROM: &str = "MediSecure <no-reply@medisecure.local>";

/// Runtime configuration for the MediSecure server.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "MEDISECURE")]
pub struct AppSettings {
    /// Interface to listen on.
    pub host: Option<IpAddr>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// PostgreSQL URL; in-memory repositories are used when unset.
    pub database_url: Option<String>,
    /// Maximum pooled database connections.
    #[ortho_config(default = 10)]
    pub database_max_connections: u32,
    /// Redis URL for codes and refresh tokens; in-memory when unset.
    pub redis_url: Option<String>,
    /// Maximum pooled Redis connections.
    #[ortho_config(default = 8)]
    pub redis_max_connections: u32,
    /// SMTP relay host; mail is logged when unset.
    pub smtp_host: Option<String>,
    /// SMTP relay port.
    pub smtp_port: Option<u16>,
    /// SMTP login.
    pub smtp_username: Option<String>,
    /// SMTP password.
    pub smtp_password: Option<String>,
    /// `From` header for outgoing mail.
    pub mail_from: Option<String>,
    /// Lifetime of verification, device and reset codes in seconds.
    #[ortho_config(default = 600)]
    pub code_ttl_secs: u64,
    /// Lifetime of access tokens in seconds.
    #[ortho_config(default = 900)]
    pub access_token_ttl_secs: u64,
    /// Lifetime of refresh tokens in seconds.
    #[ortho_config(default = 604_800)]
    pub refresh_token_ttl_secs: u64,
}

impl AppSettings {
    /// Socket address the server binds to, `0.0.0.0:8080` by default.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(
            self.host.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            self.port.unwrap_or(DEFAULT_PORT),
        )
    }

    /// Token and code lifetimes.
    #[must_use]
    pub fn auth_policy(&self) -> AuthPolicy {
        AuthPolicy {
            code_ttl: Duration::from_secs(self.code_ttl_secs),
            access_token_ttl: Duration::from_secs(self.access_token_ttl_secs),
            refresh_token_ttl: Duration::from_secs(self.refresh_token_ttl_secs),
        }
    }

    /// SMTP relay settings, present only when a host is configured.
    #[must_use]
    pub fn smtp(&self) -> Option<SmtpMailerConfig> {
        let host = self.smtp_host.clone()?;
        Some(SmtpMailerConfig {
            host,
            port: self.smtp_port.unwrap_or(DEFAULT_SMTP_PORT),
            username: self.smtp_username.clone(),
            password: self.smtp_password.clone().map(Zeroizing::new),
            from: self
                .mail_from
                .clone()
                .unwrap_or_else(|| DEFAULT_MAIL_FROM.to_owned()),
        })
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for settings parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 8] = [
        "MEDISECURE_HOST",
        "MEDISECURE_PORT",
        "MEDISECURE_DATABASE_URL",
        "MEDISECURE_REDIS_URL",
        "MEDISECURE_SMTP_HOST",
        "MEDISECURE_SMTP_PORT",
        "MEDISECURE_MAIL_FROM",
        "MEDISECURE_ACCESS_TOKEN_TTL_SECS",
    ];

    fn load_from_empty_args() -> AppSettings {
        AppSettings::load_from_iter([OsString::from("medisecure")]).expect("config should load")
    }

    fn env_with(overrides: &[(&str, &str)]) -> Vec<(&'static str, Option<String>)> {
        VARS.iter()
            .map(|name| {
                let value = overrides
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| (*value).to_owned());
                (*name, value)
            })
            .collect()
    }

    #[rstest]
    fn defaults_run_in_memory_on_all_interfaces() {
        let _guard = lock_env(env_with(&[]));

        let settings = load_from_empty_args();
        assert_eq!(settings.bind_addr(), "0.0.0.0:8080".parse().expect("addr"));
        assert!(settings.database_url.is_none());
        assert!(settings.redis_url.is_none());
        assert!(settings.smtp().is_none());
        let policy = settings.auth_policy();
        assert_eq!(policy.code_ttl, Duration::from_secs(600));
        assert_eq!(policy.access_token_ttl, Duration::from_secs(900));
        assert_eq!(policy.refresh_token_ttl, Duration::from_secs(604_800));
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env(env_with(&[
            ("MEDISECURE_HOST", "127.0.0.1"),
            ("MEDISECURE_PORT", "9000"),
            ("MEDISECURE_DATABASE_URL", "postgres://localhost/medisecure"),
            ("MEDISECURE_SMTP_HOST", "smtp.example.com"),
            ("MEDISECURE_ACCESS_TOKEN_TTL_SECS", "300"),
        ]));

        let settings = load_from_empty_args();
        assert_eq!(settings.bind_addr(), "127.0.0.1:9000".parse().expect("addr"));
        assert_eq!(
            settings.database_url.as_deref(),
            Some("postgres://localhost/medisecure")
        );
        assert_eq!(
            settings.auth_policy().access_token_ttl,
            Duration::from_secs(300)
        );
        let smtp = settings.smtp().expect("smtp configured");
        assert_eq!(smtp.host, "smtp.example.com");
        assert_eq!(smtp.port, DEFAULT_SMTP_PORT);
        assert_eq!(smtp.from, DEFAULT_MAIL_FROM);
    }
}
