//! In-memory account, device and profile repositories.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pagination::{Page, PageRequest};
use uuid::Uuid;

use crate::domain::ports::{
    DeviceRepository, PersistenceError, ProfileRepository, UserCounts, UserListFilter,
    UserRepository,
};
use crate::domain::{Email, Role, User, UserDevice, UserId, UserProfile};

struct StoredUser {
    user: User,
    password_hash: String,
    history: Vec<(DateTime<Utc>, String)>,
}

/// [`UserRepository`] backed by a map.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<UserId, StoredUser>>,
}

impl InMemoryUserRepository {
    fn users(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, StoredUser>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn email_taken(users: &HashMap<UserId, StoredUser>, email: &Email, except: UserId) -> bool {
    users
        .values()
        .any(|stored| stored.user.email == *email && stored.user.id != except)
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, user: &User, password_hash: &str) -> Result<(), PersistenceError> {
        let mut users = self.users();
        if email_taken(&users, &user.email, user.id) || users.contains_key(&user.id) {
            return Err(PersistenceError::conflict("email already registered"));
        }
        users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_hash: password_hash.to_owned(),
                history: Vec::new(),
            },
        );
        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, PersistenceError> {
        Ok(self.users().get(id).map(|stored| stored.user.clone()))
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, PersistenceError> {
        Ok(self
            .users()
            .values()
            .find(|stored| stored.user.email == *email)
            .map(|stored| stored.user.clone()))
    }

    async fn update(&self, user: &User) -> Result<(), PersistenceError> {
        let mut users = self.users();
        if email_taken(&users, &user.email, user.id) {
            return Err(PersistenceError::conflict("email already registered"));
        }
        let stored = users
            .get_mut(&user.id)
            .ok_or_else(|| PersistenceError::query("user not found"))?;
        stored.user = user.clone();
        Ok(())
    }

    async fn password_hash(&self, id: &UserId) -> Result<Option<String>, PersistenceError> {
        Ok(self.users().get(id).map(|stored| stored.password_hash.clone()))
    }

    async fn replace_password(
        &self,
        id: &UserId,
        new_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let mut users = self.users();
        let stored = users
            .get_mut(id)
            .ok_or_else(|| PersistenceError::query("user not found"))?;
        let previous = std::mem::replace(&mut stored.password_hash, new_hash.to_owned());
        stored.history.push((changed_at, previous));
        stored.user.updated_at = changed_at;
        Ok(())
    }

    async fn recent_password_hashes(
        &self,
        id: &UserId,
        limit: u32,
    ) -> Result<Vec<String>, PersistenceError> {
        let users = self.users();
        let Some(stored) = users.get(id) else {
            return Ok(Vec::new());
        };
        let mut history = stored.history.clone();
        history.reverse();
        history.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(history
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|(_, hash)| hash)
            .collect())
    }

    async fn list(
        &self,
        filter: UserListFilter,
        page: PageRequest,
    ) -> Result<Page<User>, PersistenceError> {
        let mut matching: Vec<User> = self
            .users()
            .values()
            .map(|stored| stored.user.clone())
            .filter(|user| filter.role.is_none_or(|role| user.role == role))
            .filter(|user| filter.is_verified.is_none_or(|flag| user.is_verified == flag))
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let total = matching.len() as u64;
        Ok(Page::new(page.apply(matching), total, page))
    }

    async fn counts(&self) -> Result<UserCounts, PersistenceError> {
        let users = self.users();
        let by_role = Role::ALL
            .iter()
            .map(|role| {
                let count = users
                    .values()
                    .filter(|stored| stored.user.role == *role)
                    .count() as u64;
                (*role, count)
            })
            .collect();
        Ok(UserCounts {
            total: users.len() as u64,
            verified: users.values().filter(|s| s.user.is_verified).count() as u64,
            by_role,
        })
    }
}

/// [`DeviceRepository`] backed by a map.
#[derive(Default)]
pub struct InMemoryDeviceRepository {
    devices: Mutex<HashMap<Uuid, UserDevice>>,
}

impl InMemoryDeviceRepository {
    fn devices(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, UserDevice>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DeviceRepository for InMemoryDeviceRepository {
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<UserDevice>, PersistenceError> {
        let mut devices: Vec<UserDevice> = self
            .devices()
            .values()
            .filter(|device| device.user_id == *user_id)
            .cloned()
            .collect();
        devices.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
        Ok(devices)
    }

    async fn find_by_fingerprint(
        &self,
        user_id: &UserId,
        fingerprint: &str,
    ) -> Result<Option<UserDevice>, PersistenceError> {
        Ok(self
            .devices()
            .values()
            .find(|device| device.user_id == *user_id && device.fingerprint == fingerprint)
            .cloned())
    }

    async fn insert(&self, device: &UserDevice) -> Result<(), PersistenceError> {
        self.devices().insert(device.id, device.clone());
        Ok(())
    }

    async fn touch(
        &self,
        device_id: Uuid,
        used_at: DateTime<Utc>,
        ip_address: Option<String>,
    ) -> Result<(), PersistenceError> {
        if let Some(device) = self.devices().get_mut(&device_id) {
            device.last_used_at = used_at;
            if ip_address.is_some() {
                device.ip_address = ip_address;
            }
        }
        Ok(())
    }

    async fn delete(&self, user_id: &UserId, device_id: Uuid) -> Result<bool, PersistenceError> {
        let mut devices = self.devices();
        let owned = devices
            .get(&device_id)
            .is_some_and(|device| device.user_id == *user_id);
        if owned {
            devices.remove(&device_id);
        }
        Ok(owned)
    }

    async fn delete_all_for_user(&self, user_id: &UserId) -> Result<u64, PersistenceError> {
        let mut devices = self.devices();
        let before = devices.len();
        devices.retain(|_, device| device.user_id != *user_id);
        Ok((before - devices.len()) as u64)
    }

    async fn count_all(&self) -> Result<u64, PersistenceError> {
        Ok(self.devices().len() as u64)
    }
}

/// [`ProfileRepository`] backed by a map.
#[derive(Default)]
pub struct InMemoryProfileRepository {
    profiles: Mutex<HashMap<UserId, UserProfile>>,
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn find(&self, user_id: &UserId) -> Result<Option<UserProfile>, PersistenceError> {
        Ok(self
            .profiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned())
    }

    async fn upsert(&self, profile: &UserProfile) -> Result<(), PersistenceError> {
        self.profiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(profile.user_id, profile.clone());
        Ok(())
    }
}
