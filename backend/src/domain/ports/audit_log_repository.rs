//! Port for the append-only audit trail.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pagination::{Page, PageRequest};

use crate::domain::{AuditAction, AuditFilter, AuditLog, AuditStatus};

use super::PersistenceError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Append an entry.
    async fn record(&self, entry: &AuditLog) -> Result<(), PersistenceError>;

    /// Page through entries matching `filter`, newest first.
    async fn list(
        &self,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLog>, PersistenceError>;

    /// Entries created at or after `since`, optionally narrowed by action
    /// and status.
    async fn count_since(
        &self,
        since: DateTime<Utc>,
        action: Option<AuditAction>,
        status: Option<AuditStatus>,
    ) -> Result<u64, PersistenceError>;
}
