//! PostgreSQL-backed `AuditLogRepository` implementation using Diesel ORM.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use pagination::{Page, PageRequest};

use crate::domain::ports::{AuditLogRepository, PersistenceError};
use crate::domain::{AuditAction, AuditFilter, AuditLog, AuditStatus, UserId};

use super::diesel_helpers::{collect_rows, map_diesel_error, map_pool_error, to_count};
use super::models::AuditLogRow;
use super::pool::DbPool;
use super::schema::audit_logs;

/// Diesel-backed implementation of the `AuditLogRepository` port.
#[derive(Clone)]
pub struct DieselAuditLogRepository {
    pool: DbPool,
}

impl DieselAuditLogRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: AuditLogRow) -> Result<AuditLog, PersistenceError> {
    let status = AuditStatus::parse(&row.status)
        .ok_or_else(|| PersistenceError::query(format!("unrecognised audit status: {}", row.status)))?;
    Ok(AuditLog {
        id: row.id,
        user_id: row.user_id.map(UserId::from_uuid),
        action: AuditAction::parse(&row.action),
        resource: row.resource,
        resource_id: row.resource_id,
        ip_address: row.ip_address,
        user_agent: row.user_agent,
        details: row.details,
        status,
        created_at: row.created_at,
    })
}

fn entry_to_row(entry: &AuditLog) -> AuditLogRow {
    AuditLogRow {
        id: entry.id,
        user_id: entry.user_id.map(|id| *id.as_uuid()),
        action: entry.action.as_str().to_owned(),
        resource: entry.resource.clone(),
        resource_id: entry.resource_id.clone(),
        ip_address: entry.ip_address.clone(),
        user_agent: entry.user_agent.clone(),
        details: entry.details.clone(),
        status: entry.status.as_str().to_owned(),
        created_at: entry.created_at,
    }
}

fn filtered(filter: &AuditFilter) -> audit_logs::BoxedQuery<'static, Pg> {
    let mut query = audit_logs::table.into_boxed();
    if let Some(user_id) = filter.user_id {
        query = query.filter(audit_logs::user_id.eq(*user_id.as_uuid()));
    }
    if let Some(action) = &filter.action {
        query = query.filter(audit_logs::action.eq(action.as_str().to_owned()));
    }
    if let Some(status) = filter.status {
        query = query.filter(audit_logs::status.eq(status.as_str()));
    }
    query
}

#[async_trait]
impl AuditLogRepository for DieselAuditLogRepository {
    async fn record(&self, entry: &AuditLog) -> Result<(), PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(audit_logs::table)
            .values(&entry_to_row(entry))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn list(
        &self,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLog>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let total: i64 = filtered(filter)
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let rows: Vec<AuditLogRow> = filtered(filter)
            .select(AuditLogRow::as_select())
            .order_by(audit_logs::created_at.desc())
            .offset(page.offset_i64())
            .limit(page.limit_i64())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let items = collect_rows(rows.into_iter().map(row_to_entry))?;
        Ok(Page::new(items, to_count(total), page))
    }

    async fn count_since(
        &self,
        since: DateTime<Utc>,
        action: Option<AuditAction>,
        status: Option<AuditStatus>,
    ) -> Result<u64, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let filter = AuditFilter {
            user_id: None,
            action,
            status,
        };
        let total: i64 = filtered(&filter)
            .filter(audit_logs::created_at.ge(since))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(to_count(total))
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use uuid::Uuid;

    fn entry(action: AuditAction) -> AuditLog {
        AuditLog {
            id: Uuid::new_v4(),
            user_id: Some(UserId::random()),
            action,
            resource: Some("appointments".into()),
            resource_id: None,
            ip_address: Some("198.51.100.4".into()),
            user_agent: Some("curl/8.5".into()),
            details: Some(json!({"method": "GET", "path": "/api/v1/appointments", "statusCode": 200})),
            status: AuditStatus::Success,
            created_at: Utc::now(),
        }
    }

    #[rstest]
    #[case(AuditAction::Login)]
    #[case(AuditAction::Other("PROPFIND".into()))]
    fn entries_round_trip_through_rows(#[case] action: AuditAction) {
        let original = entry(action);
        assert_eq!(row_to_entry(entry_to_row(&original)).expect("entry"), original);
    }

    #[rstest]
    fn unknown_statuses_are_corrupt() {
        let mut row = entry_to_row(&entry(AuditAction::Read));
        row.status = "MAYBE".into();
        assert!(row_to_entry(row).is_err());
    }
}
