//! PostgreSQL-backed `DeviceRepository` implementation using Diesel ORM.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::domain::ports::{DeviceRepository, PersistenceError};
use crate::domain::{UserDevice, UserId};

use super::diesel_helpers::{map_diesel_error, map_pool_error, to_count};
use super::models::DeviceRow;
use super::pool::DbPool;
use super::schema::user_devices;

/// Diesel-backed implementation of the `DeviceRepository` port.
#[derive(Clone)]
pub struct DieselDeviceRepository {
    pool: DbPool,
}

impl DieselDeviceRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_device(row: DeviceRow) -> UserDevice {
    UserDevice {
        id: row.id,
        user_id: UserId::from_uuid(row.user_id),
        fingerprint: row.fingerprint,
        device_name: row.device_name,
        ip_address: row.ip_address,
        user_agent: row.user_agent,
        is_trusted: row.is_trusted,
        created_at: row.created_at,
        last_used_at: row.last_used_at,
    }
}

fn device_to_row(device: &UserDevice) -> DeviceRow {
    DeviceRow {
        id: device.id,
        user_id: *device.user_id.as_uuid(),
        fingerprint: device.fingerprint.clone(),
        device_name: device.device_name.clone(),
        ip_address: device.ip_address.clone(),
        user_agent: device.user_agent.clone(),
        is_trusted: device.is_trusted,
        created_at: device.created_at,
        last_used_at: device.last_used_at,
    }
}

#[async_trait]
impl DeviceRepository for DieselDeviceRepository {
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<UserDevice>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<DeviceRow> = user_devices::table
            .filter(user_devices::user_id.eq(user_id.as_uuid()))
            .select(DeviceRow::as_select())
            .order_by(user_devices::last_used_at.desc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(row_to_device).collect())
    }

    async fn find_by_fingerprint(
        &self,
        user_id: &UserId,
        fingerprint: &str,
    ) -> Result<Option<UserDevice>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<DeviceRow> = user_devices::table
            .filter(
                user_devices::user_id
                    .eq(user_id.as_uuid())
                    .and(user_devices::fingerprint.eq(fingerprint)),
            )
            .select(DeviceRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(row_to_device))
    }

    async fn insert(&self, device: &UserDevice) -> Result<(), PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(user_devices::table)
            .values(&device_to_row(device))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn touch(
        &self,
        device_id: Uuid,
        used_at: DateTime<Utc>,
        ip_address: Option<String>,
    ) -> Result<(), PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let target = user_devices::table.filter(user_devices::id.eq(device_id));
        let result = match ip_address {
            Some(ip) => {
                diesel::update(target)
                    .set((
                        user_devices::last_used_at.eq(used_at),
                        user_devices::ip_address.eq(ip),
                    ))
                    .execute(&mut conn)
                    .await
            }
            None => {
                diesel::update(target)
                    .set(user_devices::last_used_at.eq(used_at))
                    .execute(&mut conn)
                    .await
            }
        };
        result.map(|_| ()).map_err(map_diesel_error)
    }

    async fn delete(&self, user_id: &UserId, device_id: Uuid) -> Result<bool, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let removed = diesel::delete(
            user_devices::table.filter(
                user_devices::id
                    .eq(device_id)
                    .and(user_devices::user_id.eq(user_id.as_uuid())),
            ),
        )
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(removed > 0)
    }

    async fn delete_all_for_user(&self, user_id: &UserId) -> Result<u64, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let removed = diesel::delete(
            user_devices::table.filter(user_devices::user_id.eq(user_id.as_uuid())),
        )
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(removed as u64)
    }

    async fn count_all(&self) -> Result<u64, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let total: i64 = user_devices::table
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(to_count(total))
    }
}
