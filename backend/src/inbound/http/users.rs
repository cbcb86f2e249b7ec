//! Self-service account handlers under `/api/v1/users/me`.
//!
//! ```text
//! GET /api/v1/users/me
//! PUT /api/v1/users/me {"fullName":"Ada King"}
//! POST /api/v1/users/me/change-password {"currentPassword":"..","newPassword":".."}
//! PUT /api/v1/users/me/profile {"bloodType":"O+"}
//! ```

use actix_web::{HttpResponse, delete, get, post, put, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{
    AccountChanges, ProfileDetails, ProfileUpdate, Role, User, UserDevice, UserId, UserProfile,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::{ErrorSchema, RoleSchema};
use crate::inbound::http::session::Authenticated;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, parse_email, parse_full_name, parse_uuid};

/// Account as returned to clients.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "Ada Lovelace")]
    pub full_name: String,
    #[schema(value_type = RoleSchema)]
    pub role: Role,
    pub is_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: *user.id.as_uuid(),
            email: user.email.to_string(),
            full_name: String::from(user.full_name),
            role: user.role,
            is_verified: user.is_verified,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
            last_login: user.last_login,
        }
    }
}

/// Plain confirmation payload.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "password changed")]
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body for `PUT /api/v1/users/me`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
}

impl TryFrom<UpdateMeRequest> for AccountChanges {
    type Error = crate::domain::Error;

    fn try_from(value: UpdateMeRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            email: value
                .email
                .as_deref()
                .map(|raw| parse_email(raw, FieldName::new("email")))
                .transpose()?,
            full_name: value
                .full_name
                .as_deref()
                .map(|raw| parse_full_name(raw, FieldName::new("fullName")))
                .transpose()?,
        })
    }
}

/// Trusted device summary; the fingerprint is masked.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceResponse {
    pub id: Uuid,
    #[schema(example = "0123456789abcdef...")]
    pub device_fingerprint: String,
    pub device_name: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub is_trusted: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl From<UserDevice> for DeviceResponse {
    fn from(device: UserDevice) -> Self {
        Self {
            device_fingerprint: device.masked_fingerprint(),
            id: device.id,
            device_name: device.device_name,
            ip_address: device.ip_address,
            user_agent: device.user_agent,
            is_trusted: device.is_trusted,
            created_at: device.created_at,
            last_used_at: device.last_used_at,
        }
    }
}

/// Body for `POST /api/v1/users/me/change-password`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Profile fields accepted by `PUT /api/v1/users/me/profile`. Absent fields
/// keep their stored value.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[schema(example = "1815-12-10")]
    pub date_of_birth: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub medical_record_number: Option<String>,
    pub insurance_number: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    #[schema(example = "O+")]
    pub blood_type: Option<String>,
    pub profile_picture_url: Option<String>,
}

impl From<ProfileRequest> for ProfileUpdate {
    fn from(value: ProfileRequest) -> Self {
        Self {
            details: ProfileDetails {
                first_name: value.first_name,
                last_name: value.last_name,
                date_of_birth: value.date_of_birth,
                phone: value.phone,
                address: value.address,
                medical_record_number: value.medical_record_number,
                insurance_number: value.insurance_number,
                emergency_contact_name: value.emergency_contact_name,
                emergency_contact_phone: value.emergency_contact_phone,
            },
            blood_type: value.blood_type,
            profile_picture_url: value.profile_picture_url,
        }
    }
}

/// Decrypted profile.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub medical_record_number: Option<String>,
    pub insurance_number: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub blood_type: Option<String>,
    pub profile_picture_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserProfile> for ProfileResponse {
    fn from(profile: UserProfile) -> Self {
        let ProfileDetails {
            first_name,
            last_name,
            date_of_birth,
            phone,
            address,
            medical_record_number,
            insurance_number,
            emergency_contact_name,
            emergency_contact_phone,
        } = profile.details;
        Self {
            user_id: *profile.user_id.as_uuid(),
            first_name,
            last_name,
            date_of_birth,
            phone,
            address,
            medical_record_number,
            insurance_number,
            emergency_contact_name,
            emergency_contact_phone,
            blood_type: profile.blood_type,
            profile_picture_url: profile.profile_picture_url,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

fn caller(auth: &Authenticated) -> &UserId {
    &auth.actor().user_id
}

/// Return the signed-in account.
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema)
    ),
    tags = ["users"],
    operation_id = "getMe",
    security(("AccessToken" = []))
)]
#[get("/users/me")]
pub async fn get_me(
    state: web::Data<HttpState>,
    auth: Authenticated,
) -> ApiResult<web::Json<UserResponse>> {
    let user = state.accounts.get_me(caller(&auth)).await?;
    Ok(web::Json(user.into()))
}

/// Change the caller's email or display name.
///
/// A new email address must be verified again.
#[utoipa::path(
    put,
    path = "/api/v1/users/me",
    request_body = UpdateMeRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 409, description = "Email already in use", body = ErrorSchema)
    ),
    tags = ["users"],
    operation_id = "updateMe",
    security(("AccessToken" = []))
)]
#[put("/users/me")]
pub async fn update_me(
    state: web::Data<HttpState>,
    auth: Authenticated,
    payload: web::Json<UpdateMeRequest>,
) -> ApiResult<web::Json<UserResponse>> {
    let changes = AccountChanges::try_from(payload.into_inner())?;
    let user = state.accounts.update_me(caller(&auth), changes).await?;
    Ok(web::Json(user.into()))
}

/// Deactivate the caller's account and end every session.
#[utoipa::path(
    delete,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Account deactivated", body = MessageResponse),
        (status = 401, description = "Unauthorised", body = ErrorSchema)
    ),
    tags = ["users"],
    operation_id = "deleteMe",
    security(("AccessToken" = []))
)]
#[delete("/users/me")]
pub async fn delete_me(state: web::Data<HttpState>, auth: Authenticated) -> ApiResult<HttpResponse> {
    state.accounts.delete_me(caller(&auth)).await?;
    Ok(HttpResponse::Ok()
        .cookie(state.cookies.clear_access())
        .cookie(state.cookies.clear_refresh())
        .json(MessageResponse::new("account deactivated")))
}

/// Devices the caller has signed in from.
#[utoipa::path(
    get,
    path = "/api/v1/users/me/devices",
    responses(
        (status = 200, description = "Devices", body = [DeviceResponse]),
        (status = 401, description = "Unauthorised", body = ErrorSchema)
    ),
    tags = ["users"],
    operation_id = "listDevices",
    security(("AccessToken" = []))
)]
#[get("/users/me/devices")]
pub async fn list_devices(
    state: web::Data<HttpState>,
    auth: Authenticated,
) -> ApiResult<web::Json<Vec<DeviceResponse>>> {
    let devices = state.accounts.list_devices(caller(&auth)).await?;
    Ok(web::Json(
        devices.into_iter().map(DeviceResponse::from).collect(),
    ))
}

/// Forget one of the caller's devices.
#[utoipa::path(
    delete,
    path = "/api/v1/users/me/devices/{device_id}",
    params(("device_id" = String, Path, description = "Device identifier")),
    responses(
        (status = 200, description = "Device removed", body = MessageResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema)
    ),
    tags = ["users"],
    operation_id = "removeDevice",
    security(("AccessToken" = []))
)]
#[delete("/users/me/devices/{device_id}")]
pub async fn remove_device(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> ApiResult<web::Json<MessageResponse>> {
    let device_id = parse_uuid(&path.into_inner(), FieldName::new("deviceId"))?;
    state
        .accounts
        .remove_device(caller(&auth), device_id)
        .await?;
    Ok(web::Json(MessageResponse::new("device removed")))
}

/// Replace the caller's password.
#[utoipa::path(
    post,
    path = "/api/v1/users/me/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Weak or recently used password", body = ErrorSchema),
        (status = 401, description = "Current password is incorrect", body = ErrorSchema)
    ),
    tags = ["users"],
    operation_id = "changePassword",
    security(("AccessToken" = []))
)]
#[post("/users/me/change-password")]
pub async fn change_password(
    state: web::Data<HttpState>,
    auth: Authenticated,
    payload: web::Json<ChangePasswordRequest>,
) -> ApiResult<web::Json<MessageResponse>> {
    let ChangePasswordRequest {
        current_password,
        new_password,
    } = payload.into_inner();
    state
        .accounts
        .change_password(caller(&auth), &current_password, &new_password)
        .await?;
    Ok(web::Json(MessageResponse::new("password changed")))
}

/// The caller's decrypted profile.
#[utoipa::path(
    get,
    path = "/api/v1/users/me/profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 404, description = "No profile yet", body = ErrorSchema)
    ),
    tags = ["users"],
    operation_id = "getProfile",
    security(("AccessToken" = []))
)]
#[get("/users/me/profile")]
pub async fn get_profile(
    state: web::Data<HttpState>,
    auth: Authenticated,
) -> ApiResult<web::Json<ProfileResponse>> {
    let profile = state.accounts.get_profile(caller(&auth)).await?;
    Ok(web::Json(profile.into()))
}

/// Create or update the caller's profile.
#[utoipa::path(
    put,
    path = "/api/v1/users/me/profile",
    request_body = ProfileRequest,
    responses(
        (status = 200, description = "Stored profile", body = ProfileResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema)
    ),
    tags = ["users"],
    operation_id = "upsertProfile",
    security(("AccessToken" = []))
)]
#[put("/users/me/profile")]
pub async fn upsert_profile(
    state: web::Data<HttpState>,
    auth: Authenticated,
    payload: web::Json<ProfileRequest>,
) -> ApiResult<web::Json<ProfileResponse>> {
    let profile = state
        .accounts
        .upsert_profile(caller(&auth), payload.into_inner().into())
        .await?;
    Ok(web::Json(profile.into()))
}

#[cfg(test)]
mod tests;
