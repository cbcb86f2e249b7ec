//! Administrative use-cases: user management, audit review and system
//! statistics. Callers must hold the admin role; handlers check it before
//! reaching this service, and the self-protection rules live here.

use std::sync::Arc;

use chrono::TimeDelta;
use mockable::Clock;
use pagination::{Page, PageRequest};
use tracing::info;

use super::ports::{AuditLogRepository, DeviceRepository, UserListFilter, UserRepository};
use super::{
    Actor, AuditAction, AuditFilter, AuditLog, AuditStatus, Error, RefreshTokens, Role, User,
    UserId,
};

/// Window covered by the recent-activity counters.
pub const STATS_WINDOW_HOURS: i64 = 24;

/// Snapshot returned by the statistics endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemStats {
    /// Every stored account.
    pub total_users: u64,
    /// Accounts with a confirmed email.
    pub verified_users: u64,
    /// Accounts per role, in [`Role::ALL`] order.
    pub users_by_role: Vec<(Role, u64)>,
    /// Registered devices across all accounts.
    pub total_devices: u64,
    /// Audit entries recorded in the window.
    pub recent_audit_actions: u64,
    /// Failed logins recorded in the window.
    pub failed_logins: u64,
}

/// Driven ports required by [`AdminService`].
#[derive(Clone)]
pub struct AdminServicePorts {
    /// Account storage.
    pub users: Arc<dyn UserRepository>,
    /// Trusted device registry.
    pub devices: Arc<dyn DeviceRepository>,
    /// Audit trail.
    pub audit_logs: Arc<dyn AuditLogRepository>,
    /// Refresh token registry, for ending sessions of removed accounts.
    pub refresh_tokens: RefreshTokens,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

/// Administration service.
#[derive(Clone)]
pub struct AdminService {
    ports: AdminServicePorts,
}

impl AdminService {
    /// Create the service.
    pub fn new(ports: AdminServicePorts) -> Self {
        Self { ports }
    }

    async fn load(&self, user_id: &UserId) -> Result<User, Error> {
        self.ports
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| Error::not_found("user not found"))
    }

    /// Page through accounts.
    pub async fn list_users(
        &self,
        filter: UserListFilter,
        page: PageRequest,
    ) -> Result<Page<User>, Error> {
        Ok(self.ports.users.list(filter, page).await?)
    }

    /// One account by id.
    pub async fn get_user(&self, user_id: &UserId) -> Result<User, Error> {
        self.load(user_id).await
    }

    /// Change another account's role.
    pub async fn update_role(
        &self,
        admin: &Actor,
        user_id: &UserId,
        role: Role,
    ) -> Result<User, Error> {
        if admin.user_id == *user_id {
            return Err(Error::invalid_request("cannot change your own role"));
        }
        let mut user = self.load(user_id).await?;
        let previous = user.role;
        user.role = role;
        user.updated_at = self.ports.clock.utc();
        self.ports.users.update(&user).await?;
        info!(admin_id = %admin.user_id, user_id = %user.id, from = %previous, to = %role, "role changed");
        Ok(user)
    }

    /// Deactivate another account, forget its devices and end its sessions.
    pub async fn delete_user(&self, admin: &Actor, user_id: &UserId) -> Result<(), Error> {
        if admin.user_id == *user_id {
            return Err(Error::invalid_request("cannot delete your own account"));
        }
        let mut user = self.load(user_id).await?;
        let removed = self.ports.devices.delete_all_for_user(user_id).await?;
        user.is_active = false;
        user.updated_at = self.ports.clock.utc();
        self.ports.users.update(&user).await?;
        self.ports.refresh_tokens.revoke_all(user_id).await?;
        info!(admin_id = %admin.user_id, user_id = %user_id, devices = removed, "account deleted");
        Ok(())
    }

    /// Page through the audit trail, newest first.
    pub async fn list_audit_logs(
        &self,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLog>, Error> {
        Ok(self.ports.audit_logs.list(filter, page).await?)
    }

    /// Audit trail of one account, newest first.
    pub async fn user_audit_logs(
        &self,
        user_id: &UserId,
        page: PageRequest,
    ) -> Result<Page<AuditLog>, Error> {
        let filter = AuditFilter {
            user_id: Some(*user_id),
            ..AuditFilter::default()
        };
        self.list_audit_logs(&filter, page).await
    }

    /// Aggregate counts for the dashboard.
    pub async fn stats(&self) -> Result<SystemStats, Error> {
        let counts = self.ports.users.counts().await?;
        let total_devices = self.ports.devices.count_all().await?;
        let since = self.ports.clock.utc() - TimeDelta::hours(STATS_WINDOW_HOURS);
        let recent_audit_actions = self
            .ports
            .audit_logs
            .count_since(since, None, None)
            .await?;
        let failed_logins = self
            .ports
            .audit_logs
            .count_since(since, Some(AuditAction::Login), Some(AuditStatus::Failure))
            .await?;
        let users_by_role = Role::ALL
            .iter()
            .map(|role| {
                let count = counts
                    .by_role
                    .iter()
                    .find(|(candidate, _)| candidate == role)
                    .map_or(0, |(_, count)| *count);
                (*role, count)
            })
            .collect();
        Ok(SystemStats {
            total_users: counts.total,
            verified_users: counts.verified,
            users_by_role,
            total_devices,
            recent_audit_actions,
            failed_logins,
        })
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use std::time::Duration;

    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::{MockAuditLogRepository, MockDeviceRepository, MockUserRepository, UserCounts};
    use crate::domain::{Email, FullName};
    use crate::outbound::memory::{
        InMemoryAuditLogRepository, InMemoryDeviceRepository, InMemoryExpiringStore,
        InMemoryUserRepository,
    };
    use crate::test_support::{MutableClock, fixture_now};
    use rstest::rstest;
    use uuid::Uuid;

    fn service_over(
        users: Arc<dyn UserRepository>,
        devices: Arc<dyn DeviceRepository>,
        audit_logs: Arc<dyn AuditLogRepository>,
    ) -> AdminService {
        let clock = Arc::new(MutableClock::new(fixture_now()));
        AdminService::new(AdminServicePorts {
            users,
            devices,
            audit_logs,
            refresh_tokens: RefreshTokens::new(
                Arc::new(InMemoryExpiringStore::with_clock(clock.clone())),
                Duration::from_secs(60),
            ),
            clock,
        })
    }

    fn admin() -> Actor {
        Actor {
            user_id: UserId::random(),
            role: Role::Admin,
        }
    }

    fn member(email: &str, role: Role) -> User {
        User::register(
            Email::parse(email).expect("email"),
            FullName::new("Member").expect("name"),
            role,
            fixture_now(),
        )
    }

    fn audit(action: AuditAction, status: AuditStatus, hours_ago: i64) -> AuditLog {
        AuditLog {
            id: Uuid::new_v4(),
            user_id: None,
            action,
            resource: Some("auth".into()),
            resource_id: None,
            ip_address: None,
            user_agent: None,
            details: None,
            status,
            created_at: fixture_now() - TimeDelta::hours(hours_ago),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn admins_cannot_demote_themselves() {
        let admin = admin();
        let service = service_over(
            Arc::new(MockUserRepository::new()),
            Arc::new(MockDeviceRepository::new()),
            Arc::new(MockAuditLogRepository::new()),
        );
        let err = service
            .update_role(&admin, &admin.user_id, Role::Patient)
            .await
            .expect_err("self");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
        let err = service
            .delete_user(&admin, &admin.user_id)
            .await
            .expect_err("self");
        assert_eq!(err.message(), "cannot delete your own account");
    }

    #[rstest]
    #[tokio::test]
    async fn role_changes_are_persisted() {
        let users = Arc::new(InMemoryUserRepository::default());
        let patient = member("pat@example.com", Role::Patient);
        users.insert(&patient, "hash").await.expect("insert");
        let service = service_over(
            users.clone(),
            Arc::new(InMemoryDeviceRepository::default()),
            Arc::new(InMemoryAuditLogRepository::default()),
        );

        let updated = service
            .update_role(&admin(), &patient.id, Role::Staff)
            .await
            .expect("role change");
        assert_eq!(updated.role, Role::Staff);
        let stored = service.get_user(&patient.id).await.expect("lookup");
        assert_eq!(stored.role, Role::Staff);
    }

    #[rstest]
    #[tokio::test]
    async fn deleting_a_user_removes_devices_and_deactivates() {
        let target = member("pat@example.com", Role::Patient);
        let target_id = target.id;
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .times(1)
            .return_once(move |_| Ok(Some(target)));
        users
            .expect_update()
            .withf(|user| !user.is_active)
            .times(1)
            .return_once(|_| Ok(()));
        let mut devices = MockDeviceRepository::new();
        devices
            .expect_delete_all_for_user()
            .withf(move |id| *id == target_id)
            .times(1)
            .return_once(|_| Ok(2));
        let service = service_over(
            Arc::new(users),
            Arc::new(devices),
            Arc::new(MockAuditLogRepository::new()),
        );

        service
            .delete_user(&admin(), &target_id)
            .await
            .expect("deleted");
    }

    #[rstest]
    #[tokio::test]
    async fn missing_users_are_not_found() {
        let service = service_over(
            Arc::new(InMemoryUserRepository::default()),
            Arc::new(InMemoryDeviceRepository::default()),
            Arc::new(InMemoryAuditLogRepository::default()),
        );
        let err = service
            .get_user(&UserId::random())
            .await
            .expect_err("absent");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[rstest]
    #[tokio::test]
    async fn stats_cover_the_last_day() {
        let audit_logs = Arc::new(InMemoryAuditLogRepository::default());
        for entry in [
            audit(AuditAction::Login, AuditStatus::Failure, 1),
            audit(AuditAction::Login, AuditStatus::Failure, 30),
            audit(AuditAction::Login, AuditStatus::Success, 2),
            audit(AuditAction::Read, AuditStatus::Success, 3),
        ] {
            audit_logs.record(&entry).await.expect("record");
        }
        let mut users = MockUserRepository::new();
        users.expect_counts().times(1).return_once(|| {
            Ok(UserCounts {
                total: 3,
                verified: 2,
                by_role: vec![(Role::Doctor, 1), (Role::Patient, 2)],
            })
        });
        let mut devices = MockDeviceRepository::new();
        devices.expect_count_all().times(1).return_once(|| Ok(4));
        let service = service_over(Arc::new(users), Arc::new(devices), audit_logs);

        let stats = service.stats().await.expect("stats");
        assert_eq!(stats.total_users, 3);
        assert_eq!(stats.verified_users, 2);
        assert_eq!(stats.total_devices, 4);
        assert_eq!(stats.recent_audit_actions, 3);
        assert_eq!(stats.failed_logins, 1);
        assert_eq!(
            stats.users_by_role,
            vec![
                (Role::Patient, 2),
                (Role::Doctor, 1),
                (Role::Admin, 0),
                (Role::Staff, 0),
            ]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn user_audit_logs_are_scoped_to_the_account() {
        let audit_logs = Arc::new(InMemoryAuditLogRepository::default());
        let subject = UserId::random();
        let mut mine = audit(AuditAction::Read, AuditStatus::Success, 1);
        mine.user_id = Some(subject);
        audit_logs.record(&mine).await.expect("record");
        audit_logs
            .record(&audit(AuditAction::Read, AuditStatus::Success, 1))
            .await
            .expect("record");
        let service = service_over(
            Arc::new(InMemoryUserRepository::default()),
            Arc::new(InMemoryDeviceRepository::default()),
            audit_logs,
        );

        let page = service
            .user_audit_logs(&subject, PageRequest::first(10))
            .await
            .expect("logs");
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, mine.id);
    }
}
