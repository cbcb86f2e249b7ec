//! Authentication handlers under `/api/v1/auth`.
//!
//! ```text
//! POST /api/v1/auth/signup {"email":"ada@example.com","password":"..","fullName":"Ada"}
//! POST /api/v1/auth/verify-email {"email":"ada@example.com","code":"123456"}
//! POST /api/v1/auth/login {"email":"ada@example.com","password":".."}
//! POST /api/v1/auth/refresh            (refresh_token cookie)
//! ```
//!
//! Successful logins set the `access_token` and `refresh_token` cookies; see
//! [`crate::inbound::http::cookies`].

use actix_web::{HttpRequest, HttpResponse, ResponseError, get, http::header, post, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{
    DeviceContext, Error, LoginCredentials, LoginOutcome, LoginValidationError, RefreshOutcome,
    Registration, Role, TokenPair, User, UserValidationError, truncate_user_agent,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::cookies::REFRESH_TOKEN_COOKIE;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::Authenticated;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::users::{MessageResponse, UserResponse};
use crate::inbound::http::validation::{FieldName, parse_email, parse_uuid};

/// Body for `POST /api/v1/auth/signup`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    pub password: String,
    #[schema(example = "Ada Lovelace")]
    pub full_name: String,
    /// Defaults to `patient`.
    #[schema(example = "patient")]
    pub role: Option<String>,
}

impl TryFrom<SignupRequest> for Registration {
    type Error = UserValidationError;

    fn try_from(value: SignupRequest) -> Result<Self, Self::Error> {
        let role = value
            .role
            .as_deref()
            .map(str::parse::<Role>)
            .transpose()?;
        Self::try_from_parts(&value.email, &value.password, &value.full_name, role)
    }
}

/// Signup acknowledgement.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SignupResponse {
    pub message: String,
    pub email: String,
}

/// Email plus mailed code.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct VerifyEmailRequest {
    pub email: String,
    #[schema(example = "123456")]
    pub code: String,
}

/// Request carrying only an email address.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct EmailRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
}

/// Body for `POST /api/v1/auth/login`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Client-supplied device fingerprint. Derived from the user agent and
    /// address when absent.
    pub device_fingerprint: Option<String>,
    pub device_name: Option<String>,
}

impl TryFrom<&LoginRequest> for LoginCredentials {
    type Error = LoginValidationError;

    fn try_from(value: &LoginRequest) -> Result<Self, Self::Error> {
        Self::try_from_parts(&value.email, &value.password)
    }
}

/// Login result. Either `user` is present and cookies were set, or
/// `requiresVerification` is true and a code was mailed for `deviceId`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub requires_verification: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
    pub message: String,
}

/// Body for `POST /api/v1/auth/verify-device`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyDeviceRequest {
    pub email: String,
    pub device_id: String,
    pub code: String,
}

/// Body for `POST /api/v1/auth/reset-password`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

fn map_login_validation_error(err: LoginValidationError) -> Error {
    let (field, code) = match err {
        LoginValidationError::InvalidEmail => ("email", "invalid_email"),
        LoginValidationError::EmptyPassword => ("password", "empty_password"),
    };
    Error::invalid_request(err.to_string()).with_details(json!({ "field": field, "code": code }))
}

fn map_registration_error(err: UserValidationError) -> Error {
    let field = match err {
        UserValidationError::InvalidEmail | UserValidationError::EmailTooLong { .. } => "email",
        UserValidationError::EmptyFullName | UserValidationError::FullNameTooLong { .. } => {
            "fullName"
        }
        UserValidationError::PasswordTooShort { .. }
        | UserValidationError::PasswordTooLong { .. } => "password",
        UserValidationError::UnknownRole => "role",
        UserValidationError::InvalidId => "id",
    };
    Error::invalid_request(err.to_string()).with_details(json!({ "field": field }))
}

fn device_context(req: &HttpRequest, payload: &LoginRequest) -> DeviceContext {
    let ip_address = req
        .connection_info()
        .realip_remote_addr()
        .map(str::to_owned);
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(truncate_user_agent);
    DeviceContext {
        fingerprint: payload.device_fingerprint.clone(),
        device_name: payload.device_name.clone(),
        ip_address,
        user_agent,
    }
}

fn signed_in(state: &HttpState, user: User, tokens: TokenPair) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(state.cookies.access_cookie(tokens.access_token))
        .cookie(state.cookies.refresh_cookie(tokens.refresh_token))
        .json(LoginResponse {
            requires_verification: false,
            device_id: None,
            user: Some(user.into()),
            message: "login successful".to_owned(),
        })
}

/// Start a registration and mail a verification code.
#[utoipa::path(
    post,
    path = "/api/v1/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Verification code sent", body = SignupResponse),
        (status = 400, description = "Invalid request or email taken", body = ErrorSchema),
        (status = 503, description = "Mail or store unavailable", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "signup",
    security([])
)]
#[post("/auth/signup")]
pub async fn signup(
    state: web::Data<HttpState>,
    payload: web::Json<SignupRequest>,
) -> ApiResult<HttpResponse> {
    let registration =
        Registration::try_from(payload.into_inner()).map_err(map_registration_error)?;
    let email = registration.email.to_string();
    state.auth.signup(registration).await?;
    Ok(HttpResponse::Created().json(SignupResponse {
        message: "verification code sent; check your email".to_owned(),
        email,
    }))
}

/// Confirm a pending registration and create the account.
#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Account created", body = UserResponse),
        (status = 400, description = "Invalid or expired code", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "verifyEmail",
    security([])
)]
#[post("/auth/verify-email")]
pub async fn verify_email(
    state: web::Data<HttpState>,
    payload: web::Json<VerifyEmailRequest>,
) -> ApiResult<web::Json<UserResponse>> {
    let email = parse_email(&payload.email, FieldName::new("email"))?;
    let user = state.auth.verify_email(&email, &payload.code).await?;
    Ok(web::Json(user.into()))
}

/// Mail a fresh code for a pending registration.
#[utoipa::path(
    post,
    path = "/api/v1/auth/resend-verification",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Code re-sent", body = MessageResponse),
        (status = 400, description = "Nothing pending", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "resendVerification",
    security([])
)]
#[post("/auth/resend-verification")]
pub async fn resend_verification(
    state: web::Data<HttpState>,
    payload: web::Json<EmailRequest>,
) -> ApiResult<web::Json<MessageResponse>> {
    let email = parse_email(&payload.email, FieldName::new("email"))?;
    state.auth.resend_verification(&email).await?;
    Ok(web::Json(MessageResponse::new("verification code sent")))
}

/// Password login with device recognition.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in, or device verification required", body = LoginResponse,
            headers(("Set-Cookie" = String, description = "access_token and refresh_token cookies"))),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Invalid credentials", body = ErrorSchema),
        (status = 403, description = "Account disabled or unverified", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "login",
    security([])
)]
#[post("/auth/login")]
pub async fn login(
    req: HttpRequest,
    state: web::Data<HttpState>,
    payload: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let payload = payload.into_inner();
    let credentials =
        LoginCredentials::try_from(&payload).map_err(map_login_validation_error)?;
    let context = device_context(&req, &payload);
    match state.auth.login(&credentials, &context).await? {
        LoginOutcome::Authenticated { user, tokens } => Ok(signed_in(&state, user, tokens)),
        LoginOutcome::DeviceVerificationRequired { device_id } => {
            Ok(HttpResponse::Ok().json(LoginResponse {
                requires_verification: true,
                device_id: Some(device_id),
                user: None,
                message: "new device detected; a verification code was sent by email".to_owned(),
            }))
        }
    }
}

/// Trust a new device with the mailed code and sign in.
#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-device",
    request_body = VerifyDeviceRequest,
    responses(
        (status = 200, description = "Device trusted; signed in", body = LoginResponse),
        (status = 400, description = "Invalid or expired code", body = ErrorSchema),
        (status = 403, description = "Account disabled", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "verifyDevice",
    security([])
)]
#[post("/auth/verify-device")]
pub async fn verify_device(
    state: web::Data<HttpState>,
    payload: web::Json<VerifyDeviceRequest>,
) -> ApiResult<HttpResponse> {
    let email = parse_email(&payload.email, FieldName::new("email"))?;
    let device_id = parse_uuid(&payload.device_id, FieldName::new("deviceId"))?;
    let (user, tokens) = state
        .auth
        .verify_device(&email, device_id, &payload.code)
        .await?;
    Ok(signed_in(&state, user, tokens))
}

/// The signed-in account.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorised", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "currentUser",
    security(("AccessToken" = []))
)]
#[get("/auth/me")]
pub async fn me(
    state: web::Data<HttpState>,
    auth: Authenticated,
) -> ApiResult<web::Json<UserResponse>> {
    let user = state.auth.current_user(&auth.actor().user_id).await?;
    Ok(web::Json(user.into()))
}

/// Issue a new access token from the refresh cookie.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    responses(
        (status = 200, description = "Access cookie renewed", body = MessageResponse),
        (status = 401, description = "Missing, unknown or revoked refresh token", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "refresh",
    security(("RefreshToken" = []))
)]
#[post("/auth/refresh")]
pub async fn refresh(req: HttpRequest, state: web::Data<HttpState>) -> ApiResult<HttpResponse> {
    let token = req
        .cookie(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::unauthorized("missing refresh token"))?;
    match state.auth.refresh(&token).await? {
        RefreshOutcome::Refreshed { access_token } => Ok(HttpResponse::Ok()
            .cookie(state.cookies.access_cookie(access_token))
            .json(MessageResponse::new("token refreshed"))),
        RefreshOutcome::Revoked => {
            let mut response = Error::unauthorized("session is no longer valid").error_response();
            for cookie in [state.cookies.clear_access(), state.cookies.clear_refresh()] {
                response
                    .add_cookie(&cookie)
                    .map_err(|err| Error::internal(format!("failed to clear cookie: {err}")))?;
            }
            Ok(response)
        }
    }
}

/// End the session and clear both cookies.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses((status = 200, description = "Signed out", body = MessageResponse)),
    tags = ["auth"],
    operation_id = "logout",
    security([])
)]
#[post("/auth/logout")]
pub async fn logout(req: HttpRequest, state: web::Data<HttpState>) -> ApiResult<HttpResponse> {
    let token = req.cookie(REFRESH_TOKEN_COOKIE).map(|cookie| cookie.value().to_owned());
    state.auth.logout(token.as_deref()).await?;
    Ok(HttpResponse::Ok()
        .cookie(state.cookies.clear_access())
        .cookie(state.cookies.clear_refresh())
        .json(MessageResponse::new("logged out")))
}

/// Mail a password reset code. The response never reveals whether the
/// account exists.
#[utoipa::path(
    post,
    path = "/api/v1/auth/forgot-password",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Reset code sent when the account exists", body = MessageResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "forgotPassword",
    security([])
)]
#[post("/auth/forgot-password")]
pub async fn forgot_password(
    state: web::Data<HttpState>,
    payload: web::Json<EmailRequest>,
) -> ApiResult<web::Json<MessageResponse>> {
    let email = parse_email(&payload.email, FieldName::new("email"))?;
    state.auth.forgot_password(&email).await?;
    Ok(web::Json(MessageResponse::new(
        "if the account exists, a reset code has been sent",
    )))
}

/// Set a new password with a mailed reset code.
#[utoipa::path(
    post,
    path = "/api/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid code or weak password", body = ErrorSchema),
        (status = 404, description = "User not found", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "resetPassword",
    security([])
)]
#[post("/auth/reset-password")]
pub async fn reset_password(
    state: web::Data<HttpState>,
    payload: web::Json<ResetPasswordRequest>,
) -> ApiResult<web::Json<MessageResponse>> {
    let email = parse_email(&payload.email, FieldName::new("email"))?;
    state
        .auth
        .reset_password(&email, &payload.code, &payload.new_password)
        .await?;
    Ok(web::Json(MessageResponse::new("password has been reset")))
}

#[cfg(test)]
mod tests;
