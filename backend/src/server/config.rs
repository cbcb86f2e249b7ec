//! HTTP server configuration object and helpers.

use std::net::SocketAddr;
use std::sync::Arc;

use medisecure::domain::AuthPolicy;
use medisecure::domain::ports::Mailer;
use medisecure::inbound::http::security_config::SecuritySettings;
use medisecure::outbound::cache::RedisExpiringStore;
use medisecure::outbound::mail::LoggingMailer;
use medisecure::outbound::persistence::DbPool;

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) security: SecuritySettings,
    pub(crate) policy: AuthPolicy,
    pub(crate) bind_addr: SocketAddr,
    pub(crate) db_pool: Option<DbPool>,
    pub(crate) redis: Option<RedisExpiringStore>,
    pub(crate) mailer: Arc<dyn Mailer>,
}

impl ServerConfig {
    /// Configuration backed by in-memory adapters and the logging mailer.
    #[must_use]
    pub fn new(security: SecuritySettings, policy: AuthPolicy, bind_addr: SocketAddr) -> Self {
        Self {
            security,
            policy,
            bind_addr,
            db_pool: None,
            redis: None,
            mailer: Arc::new(LoggingMailer),
        }
    }

    /// Attach a database connection pool for persistence adapters.
    ///
    /// When provided, every repository port is served by its Diesel adapter.
    #[must_use]
    pub fn with_db_pool(mut self, pool: DbPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Keep codes and refresh tokens in Redis instead of process memory.
    #[must_use]
    pub fn with_redis(mut self, store: RedisExpiringStore) -> Self {
        self.redis = Some(store);
        self
    }

    /// Replace the logging mailer.
    #[must_use]
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }
}
