//! Self-service account management for the signed-in user.
//!
//! Covers the `/users/me` surface: account fields, soft deletion, trusted
//! devices, password changes with reuse protection, and the encrypted
//! patient profile.

use std::sync::Arc;

use mockable::Clock;
use tracing::info;
use uuid::Uuid;

use super::ports::{DeviceRepository, FieldCipher, PasswordHasher, ProfileRepository, UserRepository};
use super::profile::{BLOOD_TYPE_MAX, PROFILE_PICTURE_URL_MAX};
use super::{
    Email, Error, FullName, ProfileUpdate, RefreshTokens, User, UserDevice, UserId, UserProfile,
    validate_password,
};

/// Archived hashes checked on top of the current one when changing a
/// password.
pub const PASSWORD_HISTORY_DEPTH: u32 = 4;

/// Requested changes to the caller's account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountChanges {
    /// New login address; clears the verified flag when it differs.
    pub email: Option<Email>,
    /// New display name.
    pub full_name: Option<FullName>,
}

/// Driven ports required by [`AccountService`].
#[derive(Clone)]
pub struct AccountServicePorts {
    /// Account storage.
    pub users: Arc<dyn UserRepository>,
    /// Trusted device registry.
    pub devices: Arc<dyn DeviceRepository>,
    /// Profile storage.
    pub profiles: Arc<dyn ProfileRepository>,
    /// Password hashing.
    pub hasher: Arc<dyn PasswordHasher>,
    /// Profile field encryption.
    pub cipher: Arc<dyn FieldCipher>,
    /// Refresh token registry, for ending sessions.
    pub refresh_tokens: RefreshTokens,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

/// Account self-service.
#[derive(Clone)]
pub struct AccountService {
    ports: AccountServicePorts,
}

fn check_length(field: &str, value: Option<&String>, max: usize) -> Result<(), Error> {
    match value {
        Some(value) if value.chars().count() > max => Err(Error::invalid_request(format!(
            "{field} must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}

impl AccountService {
    /// Create the service.
    pub fn new(ports: AccountServicePorts) -> Self {
        Self { ports }
    }

    async fn load(&self, user_id: &UserId) -> Result<User, Error> {
        self.ports
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| Error::not_found("user not found"))
    }

    /// The caller's account.
    pub async fn get_me(&self, user_id: &UserId) -> Result<User, Error> {
        self.load(user_id).await
    }

    /// Apply `changes` to the caller's account.
    pub async fn update_me(&self, user_id: &UserId, changes: AccountChanges) -> Result<User, Error> {
        let mut user = self.load(user_id).await?;
        if let Some(email) = changes.email.filter(|email| *email != user.email) {
            let taken = self
                .ports
                .users
                .find_by_email(&email)
                .await?
                .is_some_and(|other| other.id != user.id);
            if taken {
                return Err(Error::conflict("email already in use"));
            }
            user.email = email;
            user.is_verified = false;
        }
        if let Some(full_name) = changes.full_name {
            user.full_name = full_name;
        }
        user.updated_at = self.ports.clock.utc();
        self.ports.users.update(&user).await?;
        info!(user_id = %user.id, "account updated");
        Ok(user)
    }

    /// Deactivate the caller's account and end every session.
    pub async fn delete_me(&self, user_id: &UserId) -> Result<(), Error> {
        let mut user = self.load(user_id).await?;
        user.is_active = false;
        user.updated_at = self.ports.clock.utc();
        self.ports.users.update(&user).await?;
        self.ports.refresh_tokens.revoke_all(user_id).await?;
        info!(user_id = %user_id, "account deactivated");
        Ok(())
    }

    /// Devices the caller has signed in from.
    pub async fn list_devices(&self, user_id: &UserId) -> Result<Vec<UserDevice>, Error> {
        Ok(self.ports.devices.list_for_user(user_id).await?)
    }

    /// Forget one of the caller's devices.
    pub async fn remove_device(&self, user_id: &UserId, device_id: Uuid) -> Result<(), Error> {
        if !self.ports.devices.delete(user_id, device_id).await? {
            return Err(Error::not_found("device not found"));
        }
        info!(user_id = %user_id, device_id = %device_id, "device removed");
        Ok(())
    }

    /// Change the password after re-checking the current one.
    ///
    /// The new password may not match the current hash nor any of the
    /// [`PASSWORD_HISTORY_DEPTH`] most recent archived hashes.
    pub async fn change_password(
        &self,
        user_id: &UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), Error> {
        let Some(current_hash) = self.ports.users.password_hash(user_id).await? else {
            return Err(Error::not_found("user not found"));
        };
        if !self.ports.hasher.verify(current_password, &current_hash)? {
            return Err(Error::unauthorized("current password is incorrect"));
        }
        validate_password(new_password)?;

        let mut recent = vec![current_hash];
        recent.extend(
            self.ports
                .users
                .recent_password_hashes(user_id, PASSWORD_HISTORY_DEPTH)
                .await?,
        );
        for hash in &recent {
            if self.ports.hasher.verify(new_password, hash)? {
                return Err(Error::invalid_request(
                    "password was used recently; choose a different one",
                ));
            }
        }

        let hash = self.ports.hasher.hash(new_password)?;
        self.ports
            .users
            .replace_password(user_id, &hash, self.ports.clock.utc())
            .await?;
        info!(user_id = %user_id, "password changed");
        Ok(())
    }

    /// The caller's decrypted profile.
    pub async fn get_profile(&self, user_id: &UserId) -> Result<UserProfile, Error> {
        let stored = self
            .ports
            .profiles
            .find(user_id)
            .await?
            .ok_or_else(|| Error::not_found("profile not found"))?;
        self.decrypt(stored)
    }

    /// Create or update the caller's profile.
    pub async fn upsert_profile(
        &self,
        user_id: &UserId,
        update: ProfileUpdate,
    ) -> Result<UserProfile, Error> {
        check_length("bloodType", update.blood_type.as_ref(), BLOOD_TYPE_MAX)?;
        check_length(
            "profilePictureUrl",
            update.profile_picture_url.as_ref(),
            PROFILE_PICTURE_URL_MAX,
        )?;
        let now = self.ports.clock.utc();
        let profile = match self.ports.profiles.find(user_id).await? {
            Some(stored) => {
                let current = self.decrypt(stored)?;
                UserProfile {
                    details: current.details.merge(update.details),
                    blood_type: update.blood_type.or(current.blood_type),
                    profile_picture_url: update
                        .profile_picture_url
                        .or(current.profile_picture_url),
                    updated_at: now,
                    ..current
                }
            }
            None => UserProfile {
                user_id: *user_id,
                details: update.details,
                blood_type: update.blood_type,
                profile_picture_url: update.profile_picture_url,
                created_at: now,
                updated_at: now,
            },
        };
        let details = profile
            .details
            .clone()
            .try_map(|value| self.ports.cipher.encrypt(&value))?;
        self.ports
            .profiles
            .upsert(&UserProfile {
                details,
                ..profile.clone()
            })
            .await?;
        info!(user_id = %user_id, "profile saved");
        Ok(profile)
    }

    fn decrypt(&self, stored: UserProfile) -> Result<UserProfile, Error> {
        let details = stored
            .details
            .try_map(|value| self.ports.cipher.decrypt(&value))?;
        Ok(UserProfile { details, ..stored })
    }
}

#[cfg(test)]
#[path = "account_service_tests.rs"]
mod tests;
