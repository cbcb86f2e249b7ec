//! Trusted devices recognised at login.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::UserId;

/// Number of fingerprint characters shown to clients.
pub const FINGERPRINT_PREVIEW_CHARS: usize = 16;

/// Device a user has signed in from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDevice {
    /// Device identifier.
    pub id: Uuid,
    /// Owning account.
    pub user_id: UserId,
    /// Client fingerprint; unique per user.
    pub fingerprint: String,
    /// Optional human-readable name.
    pub device_name: Option<String>,
    /// Peer address at registration.
    pub ip_address: Option<String>,
    /// User agent at registration.
    pub user_agent: Option<String>,
    /// Whether the device skips the login challenge.
    pub is_trusted: bool,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
    /// Last successful login from this device.
    pub last_used_at: DateTime<Utc>,
}

impl UserDevice {
    /// Fingerprint truncated for display.
    ///
    /// # Examples
    /// ```
    /// use chrono::Utc;
    /// use medisecure::domain::{UserDevice, UserId};
    /// use uuid::Uuid;
    ///
    /// let now = Utc::now();
    /// let device = UserDevice {
    ///     id: Uuid::new_v4(),
    ///     user_id: UserId::random(),
    ///     fingerprint: "0123456789abcdef0123".into(),
    ///     device_name: None,
    ///     ip_address: None,
    ///     user_agent: None,
    ///     is_trusted: true,
    ///     created_at: now,
    ///     last_used_at: now,
    /// };
    /// assert_eq!(device.masked_fingerprint(), "0123456789abcdef...");
    /// ```
    pub fn masked_fingerprint(&self) -> String {
        let preview: String = self
            .fingerprint
            .chars()
            .take(FINGERPRINT_PREVIEW_CHARS)
            .collect();
        format!("{preview}...")
    }
}
