//! Backend entry-point: loads configuration, connects adapters and serves
//! the REST API.

mod server;

use std::sync::Arc;

use actix_web::web;
use color_eyre::eyre::{Result, WrapErr, eyre};
use mockable::DefaultEnv;
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use medisecure::AppSettings;
use medisecure::inbound::http::health::HealthState;
use medisecure::inbound::http::security_config::fingerprint::secret_fingerprint;
use medisecure::inbound::http::security_config::{BuildMode, security_settings_from_env};
use medisecure::outbound::cache::RedisExpiringStore;
use medisecure::outbound::mail::SmtpMailer;
use medisecure::outbound::persistence::{DbPool, PoolConfig, run_pending_migrations};
use server::{ServerConfig, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings =
        AppSettings::load().map_err(|err| eyre!("failed to load configuration: {err}"))?;
    let security =
        security_settings_from_env(&DefaultEnv::new(), BuildMode::from_debug_assertions())
            .wrap_err("invalid security configuration")?;
    info!(
        fingerprint = %secret_fingerprint(&security.jwt_secret),
        ephemeral = security.ephemeral,
        cookie_secure = security.cookie_secure,
        "security material loaded"
    );

    let mut config = ServerConfig::new(security, settings.auth_policy(), settings.bind_addr());

    if let Some(database_url) = settings.database_url.as_deref() {
        run_pending_migrations(database_url)
            .await
            .wrap_err("database migration failed")?;
        let pool = DbPool::new(
            PoolConfig::new(database_url).with_max_size(settings.database_max_connections),
        )
        .await
        .wrap_err("failed to build database pool")?;
        config = config.with_db_pool(pool);
    }

    if let Some(redis_url) = settings.redis_url.as_deref() {
        let store = RedisExpiringStore::connect(redis_url, settings.redis_max_connections)
            .await
            .wrap_err("failed to connect to redis")?;
        config = config.with_redis(store);
    }

    if let Some(smtp) = settings.smtp() {
        let mailer = SmtpMailer::new(&smtp).wrap_err("invalid smtp configuration")?;
        config = config.with_mailer(Arc::new(mailer));
    }

    let health_state = web::Data::new(HealthState::new());
    info!(addr = %settings.bind_addr(), "starting server");
    create_server(health_state, config)?.await?;
    Ok(())
}
