//! Administration handlers under `/api/v1/admin`. Every route requires the
//! admin role.

use std::collections::BTreeMap;

use actix_web::{delete, get, put, web};
use chrono::{DateTime, Utc};
use pagination::PageBounds;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::{
    Actor, AuditAction, AuditFilter, AuditLog, AuditStatus, Error, Role, SystemStats, UserId,
    UserListFilter,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::page::PageResponse;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::Authenticated;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::users::{MessageResponse, UserResponse};
use crate::inbound::http::validation::{
    FieldName, page_request, parse_choice, parse_optional_uuid, parse_user_id,
};

const USER_PAGE: PageBounds = PageBounds::new(100, 1000);
const AUDIT_PAGE: PageBounds = PageBounds::new(100, 1000);

fn require_admin(auth: &Authenticated) -> Result<&Actor, Error> {
    let actor = auth.actor();
    actor.require_any(&[Role::Admin])?;
    Ok(actor)
}

fn parse_role(raw: &str) -> Result<Role, Error> {
    parse_choice(raw, FieldName::new("role"))
}

/// Filters for `GET /api/v1/admin/users`.
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListUsersQuery {
    /// Rows to skip. Defaults to 0.
    pub skip: Option<u32>,
    /// Page size, 1 to 1000. Defaults to 100.
    pub limit: Option<u32>,
    /// Restrict to one role.
    pub role: Option<String>,
    /// Restrict by verification flag.
    pub is_verified: Option<bool>,
}

/// Filters for `GET /api/v1/admin/audit-logs`.
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuditLogQuery {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
    pub user_id: Option<String>,
    /// Action name such as `LOGIN` or `READ`.
    pub action: Option<String>,
    /// `SUCCESS` or `FAILURE`.
    pub status: Option<String>,
}

/// Window for per-user audit listings.
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WindowQuery {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

/// Body for `PUT /api/v1/admin/users/{user_id}/role`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateRoleRequest {
    #[schema(example = "doctor")]
    pub role: String,
}

/// Audit entry as returned to admins.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogResponse {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    #[schema(example = "LOGIN")]
    pub action: String,
    pub resource: Option<String>,
    pub resource_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: Option<serde_json::Value>,
    #[schema(example = "SUCCESS")]
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<AuditLog> for AuditLogResponse {
    fn from(log: AuditLog) -> Self {
        Self {
            id: log.id,
            user_id: log.user_id.map(|id| *id.as_uuid()),
            action: log.action.as_str().to_owned(),
            resource: log.resource,
            resource_id: log.resource_id,
            ip_address: log.ip_address,
            user_agent: log.user_agent,
            details: log.details,
            status: log.status.as_str().to_owned(),
            created_at: log.created_at,
        }
    }
}

/// System statistics.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_users: u64,
    pub verified_users: u64,
    /// Account count keyed by role name.
    pub users_by_role: BTreeMap<String, u64>,
    pub total_devices: u64,
    /// Audit entries in the last 24 hours.
    pub recent_audit_actions: u64,
    /// Failed logins in the last 24 hours.
    pub failed_logins: u64,
}

impl From<SystemStats> for StatsResponse {
    fn from(summary: SystemStats) -> Self {
        Self {
            total_users: summary.total_users,
            verified_users: summary.verified_users,
            users_by_role: summary
                .users_by_role
                .into_iter()
                .map(|(role, count)| (role.as_str().to_owned(), count))
                .collect(),
            total_devices: summary.total_devices,
            recent_audit_actions: summary.recent_audit_actions,
            failed_logins: summary.failed_logins,
        }
    }
}

impl TryFrom<AuditLogQuery> for AuditFilter {
    type Error = Error;

    fn try_from(query: AuditLogQuery) -> Result<Self, Self::Error> {
        let status = query
            .status
            .as_deref()
            .map(|raw| {
                AuditStatus::parse(&raw.to_ascii_uppercase()).ok_or_else(|| {
                    Error::invalid_request("status must be SUCCESS or FAILURE").with_details(
                        json!({"field": "status", "value": raw, "code": "invalid_value"}),
                    )
                })
            })
            .transpose()?;
        Ok(Self {
            user_id: parse_optional_uuid(query.user_id.as_deref(), FieldName::new("userId"))?
                .map(UserId::from_uuid),
            action: query
                .action
                .as_deref()
                .map(|raw| AuditAction::parse(&raw.to_ascii_uppercase())),
            status,
        })
    }
}

/// Page through accounts.
#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Accounts", body = PageResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Admin role required", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminListUsers",
    security(("AccessToken" = []))
)]
#[get("/admin/users")]
pub async fn list_users(
    state: web::Data<HttpState>,
    auth: Authenticated,
    query: web::Query<ListUsersQuery>,
) -> ApiResult<web::Json<PageResponse<UserResponse>>> {
    require_admin(&auth)?;
    let query = query.into_inner();
    let page = page_request(query.skip, query.limit, USER_PAGE)?;
    let filter = UserListFilter {
        role: query.role.as_deref().map(parse_role).transpose()?,
        is_verified: query.is_verified,
    };
    let users = state.admin.list_users(filter, page).await?;
    Ok(web::Json(users.into()))
}

/// One account by id.
#[utoipa::path(
    get,
    path = "/api/v1/admin/users/{user_id}",
    params(("user_id" = String, Path, description = "Account identifier")),
    responses(
        (status = 200, description = "Account", body = UserResponse),
        (status = 403, description = "Admin role required", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminGetUser",
    security(("AccessToken" = []))
)]
#[get("/admin/users/{user_id}")]
pub async fn get_user(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> ApiResult<web::Json<UserResponse>> {
    require_admin(&auth)?;
    let user_id = parse_user_id(&path.into_inner(), FieldName::new("userId"))?;
    let user = state.admin.get_user(&user_id).await?;
    Ok(web::Json(user.into()))
}

/// Change another account's role.
#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{user_id}/role",
    params(("user_id" = String, Path, description = "Account identifier")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Updated account", body = UserResponse),
        (status = 400, description = "Unknown role or own account", body = ErrorSchema),
        (status = 403, description = "Admin role required", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminUpdateRole",
    security(("AccessToken" = []))
)]
#[put("/admin/users/{user_id}/role")]
pub async fn update_role(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
    payload: web::Json<UpdateRoleRequest>,
) -> ApiResult<web::Json<UserResponse>> {
    let admin = require_admin(&auth)?;
    let user_id = parse_user_id(&path.into_inner(), FieldName::new("userId"))?;
    let role = parse_role(&payload.role)?;
    let user = state.admin.update_role(admin, &user_id, role).await?;
    Ok(web::Json(user.into()))
}

/// Deactivate another account and forget its devices.
#[utoipa::path(
    delete,
    path = "/api/v1/admin/users/{user_id}",
    params(("user_id" = String, Path, description = "Account identifier")),
    responses(
        (status = 200, description = "Account deactivated", body = MessageResponse),
        (status = 400, description = "Own account", body = ErrorSchema),
        (status = 403, description = "Admin role required", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminDeleteUser",
    security(("AccessToken" = []))
)]
#[delete("/admin/users/{user_id}")]
pub async fn delete_user(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> ApiResult<web::Json<MessageResponse>> {
    let admin = require_admin(&auth)?;
    let user_id = parse_user_id(&path.into_inner(), FieldName::new("userId"))?;
    state.admin.delete_user(admin, &user_id).await?;
    Ok(web::Json(MessageResponse::new("user deleted")))
}

/// Page through the audit trail, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/admin/audit-logs",
    params(AuditLogQuery),
    responses(
        (status = 200, description = "Audit entries", body = PageResponse<AuditLogResponse>),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 403, description = "Admin role required", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminListAuditLogs",
    security(("AccessToken" = []))
)]
#[get("/admin/audit-logs")]
pub async fn list_audit_logs(
    state: web::Data<HttpState>,
    auth: Authenticated,
    query: web::Query<AuditLogQuery>,
) -> ApiResult<web::Json<PageResponse<AuditLogResponse>>> {
    require_admin(&auth)?;
    let query = query.into_inner();
    let page = page_request(query.skip, query.limit, AUDIT_PAGE)?;
    let filter = AuditFilter::try_from(query)?;
    let logs = state.admin.list_audit_logs(&filter, page).await?;
    Ok(web::Json(logs.into()))
}

/// Audit trail of one account, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/admin/audit-logs/user/{user_id}",
    params(
        ("user_id" = String, Path, description = "Account identifier"),
        WindowQuery
    ),
    responses(
        (status = 200, description = "Audit entries", body = PageResponse<AuditLogResponse>),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 403, description = "Admin role required", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminUserAuditLogs",
    security(("AccessToken" = []))
)]
#[get("/admin/audit-logs/user/{user_id}")]
pub async fn user_audit_logs(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
    query: web::Query<WindowQuery>,
) -> ApiResult<web::Json<PageResponse<AuditLogResponse>>> {
    require_admin(&auth)?;
    let user_id = parse_user_id(&path.into_inner(), FieldName::new("userId"))?;
    let page = page_request(query.skip, query.limit, AUDIT_PAGE)?;
    let logs = state.admin.user_audit_logs(&user_id, page).await?;
    Ok(web::Json(logs.into()))
}

/// Aggregate account, device and audit counters.
#[utoipa::path(
    get,
    path = "/api/v1/admin/stats",
    responses(
        (status = 200, description = "Statistics", body = StatsResponse),
        (status = 403, description = "Admin role required", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminStats",
    security(("AccessToken" = []))
)]
#[get("/admin/stats")]
pub async fn stats(
    state: web::Data<HttpState>,
    auth: Authenticated,
) -> ApiResult<web::Json<StatsResponse>> {
    require_admin(&auth)?;
    let stats = state.admin.stats().await?;
    Ok(web::Json(stats.into()))
}
