//! Audit trail entries and the rules that classify HTTP requests.

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::UserId;

/// Longest user agent stored with an entry.
pub const USER_AGENT_MAX: usize = 500;
/// Path prefix of the versioned API.
pub const API_PREFIX: &str = "/api/v1";

/// What an audited request did.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuditAction {
    /// Password login.
    Login,
    /// Logout.
    Logout,
    /// Account creation.
    Signup,
    /// Email or device verification.
    Verification,
    /// Password reset code requested.
    PasswordResetRequest,
    /// Password reset completed.
    PasswordReset,
    /// Password changed by its owner.
    PasswordChange,
    /// Any other read.
    Read,
    /// Any other creation.
    Create,
    /// Any other modification.
    Update,
    /// Any other deletion.
    Delete,
    /// Unclassified method, stored verbatim.
    Other(String),
}

impl AuditAction {
    /// Stable storage representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::Signup => "SIGNUP",
            Self::Verification => "VERIFICATION",
            Self::PasswordResetRequest => "PASSWORD_RESET_REQUEST",
            Self::PasswordReset => "PASSWORD_RESET",
            Self::PasswordChange => "PASSWORD_CHANGE",
            Self::Read => "READ",
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Parse a stored action name; unknown names become [`AuditAction::Other`].
    pub fn parse(raw: &str) -> Self {
        match raw {
            "LOGIN" => Self::Login,
            "LOGOUT" => Self::Logout,
            "SIGNUP" => Self::Signup,
            "VERIFICATION" => Self::Verification,
            "PASSWORD_RESET_REQUEST" => Self::PasswordResetRequest,
            "PASSWORD_RESET" => Self::PasswordReset,
            "PASSWORD_CHANGE" => Self::PasswordChange,
            "READ" => Self::Read,
            "CREATE" => Self::Create,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Classify a request by path keywords first, then by method.
    ///
    /// # Examples
    /// ```
    /// use medisecure::domain::AuditAction;
    ///
    /// assert_eq!(AuditAction::classify("POST", "/api/v1/auth/login"), AuditAction::Login);
    /// assert_eq!(AuditAction::classify("PATCH", "/api/v1/users/me"), AuditAction::Update);
    /// ```
    pub fn classify(method: &str, path: &str) -> Self {
        const KEYWORDS: [(&str, AuditAction); 7] = [
            ("/login", AuditAction::Login),
            ("/logout", AuditAction::Logout),
            ("/signup", AuditAction::Signup),
            ("/verify", AuditAction::Verification),
            ("/forgot-password", AuditAction::PasswordResetRequest),
            ("/reset-password", AuditAction::PasswordReset),
            ("/change-password", AuditAction::PasswordChange),
        ];
        if let Some((_, action)) = KEYWORDS.iter().find(|(needle, _)| path.contains(needle)) {
            return action.clone();
        }
        match method {
            "GET" => Self::Read,
            "POST" => Self::Create,
            "PUT" | "PATCH" => Self::Update,
            "DELETE" => Self::Delete,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an audited request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditStatus {
    /// 2xx or 3xx response.
    Success,
    /// Any other response.
    Failure,
}

impl AuditStatus {
    /// Classify an HTTP status code.
    pub const fn from_status_code(code: u16) -> Self {
        if code >= 200 && code < 400 {
            Self::Success
        } else {
            Self::Failure
        }
    }

    /// Stable storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }

    /// Parse a stored status name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "SUCCESS" => Some(Self::Success),
            "FAILURE" => Some(Self::Failure),
            _ => None,
        }
    }
}

/// Resource name and optional id addressed by an API path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditResource {
    /// First path segment after the API prefix.
    pub resource: Option<String>,
    /// Following segment when it is a UUID.
    pub resource_id: Option<String>,
}

impl AuditResource {
    /// Extract the resource from a request path.
    ///
    /// # Examples
    /// ```
    /// use medisecure::domain::AuditResource;
    ///
    /// let parsed = AuditResource::from_path(
    ///     "/api/v1/appointments/3fa85f64-5717-4562-b3fc-2c963f66afa6/cancel",
    /// );
    /// assert_eq!(parsed.resource.as_deref(), Some("appointments"));
    /// assert!(parsed.resource_id.is_some());
    /// ```
    pub fn from_path(path: &str) -> Self {
        let rest = path.strip_prefix(API_PREFIX).unwrap_or(path);
        let mut segments = rest.split('/').filter(|segment| !segment.is_empty());
        let resource = segments.next().map(str::to_owned);
        let resource_id = segments
            .next()
            .filter(|segment| Uuid::parse_str(segment).is_ok())
            .map(str::to_owned);
        Self {
            resource,
            resource_id,
        }
    }
}

/// Trim a user agent to [`USER_AGENT_MAX`] characters.
pub fn truncate_user_agent(raw: &str) -> String {
    raw.chars().take(USER_AGENT_MAX).collect()
}

/// Recorded audit event.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditLog {
    /// Identifier.
    pub id: Uuid,
    /// Acting user, when authenticated.
    pub user_id: Option<UserId>,
    /// Classified action.
    pub action: AuditAction,
    /// Resource name.
    pub resource: Option<String>,
    /// Resource identifier.
    pub resource_id: Option<String>,
    /// Client address.
    pub ip_address: Option<String>,
    /// Client user agent, truncated.
    pub user_agent: Option<String>,
    /// Request summary: method, path and status code.
    pub details: Option<Value>,
    /// Outcome.
    pub status: AuditStatus,
    /// Recording timestamp.
    pub created_at: DateTime<Utc>,
}

/// Filter for audit listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    /// Restrict to one user.
    pub user_id: Option<UserId>,
    /// Restrict to one action.
    pub action: Option<AuditAction>,
    /// Restrict to one outcome.
    pub status: Option<AuditStatus>,
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("POST", "/api/v1/auth/login", AuditAction::Login)]
    #[case("POST", "/api/v1/auth/logout", AuditAction::Logout)]
    #[case("POST", "/api/v1/auth/signup", AuditAction::Signup)]
    #[case("POST", "/api/v1/auth/verify-email", AuditAction::Verification)]
    #[case("POST", "/api/v1/auth/verify-device", AuditAction::Verification)]
    #[case("POST", "/api/v1/auth/forgot-password", AuditAction::PasswordResetRequest)]
    #[case("POST", "/api/v1/auth/reset-password", AuditAction::PasswordReset)]
    #[case("POST", "/api/v1/users/me/change-password", AuditAction::PasswordChange)]
    #[case("GET", "/api/v1/appointments", AuditAction::Read)]
    #[case("POST", "/api/v1/appointments", AuditAction::Create)]
    #[case("PUT", "/api/v1/users/me/profile", AuditAction::Update)]
    #[case("PATCH", "/api/v1/users/me", AuditAction::Update)]
    #[case("DELETE", "/api/v1/users/me", AuditAction::Delete)]
    #[case("OPTIONS", "/api/v1/users/me", AuditAction::Other("OPTIONS".into()))]
    fn classifies_requests(#[case] method: &str, #[case] path: &str, #[case] expected: AuditAction) {
        assert_eq!(AuditAction::classify(method, path), expected);
    }

    #[rstest]
    #[case(200, AuditStatus::Success)]
    #[case(302, AuditStatus::Success)]
    #[case(399, AuditStatus::Success)]
    #[case(400, AuditStatus::Failure)]
    #[case(503, AuditStatus::Failure)]
    #[case(101, AuditStatus::Failure)]
    fn status_classification(#[case] code: u16, #[case] expected: AuditStatus) {
        assert_eq!(AuditStatus::from_status_code(code), expected);
    }

    #[rstest]
    #[case("/api/v1/users/me", Some("users"), false)]
    #[case("/api/v1/messages/3fa85f64-5717-4562-b3fc-2c963f66afa6", Some("messages"), true)]
    #[case("/api/v1", None, false)]
    fn resource_extraction(
        #[case] path: &str,
        #[case] resource: Option<&str>,
        #[case] has_id: bool,
    ) {
        let parsed = AuditResource::from_path(path);
        assert_eq!(parsed.resource.as_deref(), resource);
        assert_eq!(parsed.resource_id.is_some(), has_id);
    }

    #[rstest]
    fn user_agent_is_truncated() {
        let agent = "x".repeat(USER_AGENT_MAX + 20);
        assert_eq!(truncate_user_agent(&agent).chars().count(), USER_AGENT_MAX);
    }

    #[rstest]
    fn action_names_round_trip() {
        for action in [AuditAction::Login, AuditAction::PasswordResetRequest, AuditAction::Delete] {
            assert_eq!(AuditAction::parse(action.as_str()), action);
        }
    }
}
