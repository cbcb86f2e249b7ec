//! Appointment handlers under `/api/v1/appointments`.
//!
//! ```text
//! POST /api/v1/appointments {"doctorId":"..","appointmentDate":"2031-03-11T10:00:00Z","reason":".."}
//! GET  /api/v1/appointments/my?status=scheduled&skip=0&limit=20
//! POST /api/v1/appointments/{id}/cancel {"cancellationReason":".."}
//! ```

use actix_web::{HttpResponse, get, post, put, web};
use chrono::{DateTime, Utc};
use pagination::PageBounds;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::{
    Appointment, AppointmentChanges, AppointmentStatus, Error, NewAppointment, ScheduleWindow,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::page::PageResponse;
use crate::inbound::http::schemas::{AppointmentStatusSchema, ErrorSchema};
use crate::inbound::http::session::Authenticated;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, page_request, parse_optional_choice, parse_optional_rfc3339_timestamp,
    parse_rfc3339_timestamp, parse_user_id, parse_uuid,
};

const APPOINTMENT_PAGE: PageBounds = PageBounds::new(20, 100);

/// Body for `POST /api/v1/appointments`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub doctor_id: String,
    /// RFC 3339 start of the slot.
    #[schema(example = "2031-03-11T10:00:00Z")]
    pub appointment_date: String,
    /// 15 to 240 minutes; defaults to 30.
    pub duration_minutes: Option<u32>,
    #[schema(example = "Persistent headache for two weeks")]
    pub reason: String,
    pub notes: Option<String>,
}

impl TryFrom<CreateAppointmentRequest> for NewAppointment {
    type Error = Error;

    fn try_from(value: CreateAppointmentRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            doctor_id: parse_user_id(&value.doctor_id, FieldName::new("doctorId"))?,
            appointment_date: parse_rfc3339_timestamp(
                &value.appointment_date,
                FieldName::new("appointmentDate"),
            )?,
            duration_minutes: value.duration_minutes,
            reason: value.reason,
            notes: value.notes,
        })
    }
}

/// Body for `PUT /api/v1/appointments/{id}`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentRequest {
    pub appointment_date: Option<String>,
    pub duration_minutes: Option<u32>,
    #[schema(value_type = Option<AppointmentStatusSchema>)]
    pub status: Option<String>,
    pub notes: Option<String>,
}

impl TryFrom<UpdateAppointmentRequest> for AppointmentChanges {
    type Error = Error;

    fn try_from(value: UpdateAppointmentRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            appointment_date: parse_optional_rfc3339_timestamp(
                value.appointment_date.as_deref(),
                FieldName::new("appointmentDate"),
            )?,
            duration_minutes: value.duration_minutes,
            status: parse_optional_choice(value.status.as_deref(), FieldName::new("status"))?,
            notes: value.notes,
        })
    }
}

/// Body for `POST /api/v1/appointments/{id}/cancel`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelAppointmentRequest {
    /// 10 to 500 characters.
    pub cancellation_reason: String,
}

/// Listing filters for `GET /api/v1/appointments/my`.
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MyAppointmentsQuery {
    pub skip: Option<u32>,
    /// 1 to 100; defaults to 20.
    pub limit: Option<u32>,
    #[param(value_type = Option<AppointmentStatusSchema>)]
    pub status: Option<String>,
}

/// Window for `GET /api/v1/appointments/doctor/{doctor_id}/schedule`.
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ScheduleQuery {
    /// RFC 3339 lower bound, inclusive.
    pub date_from: Option<String>,
    /// RFC 3339 upper bound, inclusive.
    pub date_to: Option<String>,
}

/// Appointment as returned to participants.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentResponse {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub duration_minutes: u32,
    #[schema(value_type = AppointmentStatusSchema)]
    pub status: AppointmentStatus,
    pub reason: String,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Appointment> for AppointmentResponse {
    fn from(value: Appointment) -> Self {
        Self {
            id: value.id,
            patient_id: *value.patient_id.as_uuid(),
            doctor_id: *value.doctor_id.as_uuid(),
            appointment_date: value.appointment_date,
            duration_minutes: value.duration_minutes,
            status: value.status,
            reason: value.reason,
            notes: value.notes,
            cancellation_reason: value.cancellation_reason,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

fn appointment_id(raw: String) -> Result<Uuid, Error> {
    parse_uuid(&raw, FieldName::new("appointmentId"))
}

/// Book a slot with a doctor; the caller becomes the patient.
#[utoipa::path(
    post,
    path = "/api/v1/appointments",
    request_body = CreateAppointmentRequest,
    responses(
        (status = 201, description = "Appointment booked", body = AppointmentResponse),
        (status = 400, description = "Invalid request or unknown doctor", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 409, description = "Slot already taken", body = ErrorSchema)
    ),
    tags = ["appointments"],
    operation_id = "createAppointment",
    security(("AccessToken" = []))
)]
#[post("/appointments")]
pub async fn create_appointment(
    state: web::Data<HttpState>,
    auth: Authenticated,
    payload: web::Json<CreateAppointmentRequest>,
) -> ApiResult<HttpResponse> {
    let request = NewAppointment::try_from(payload.into_inner())?;
    let appointment = state.appointments.create(auth.actor(), request).await?;
    Ok(HttpResponse::Created().json(AppointmentResponse::from(appointment)))
}

/// Appointments the caller booked, or attends as the doctor.
#[utoipa::path(
    get,
    path = "/api/v1/appointments/my",
    params(MyAppointmentsQuery),
    responses(
        (status = 200, description = "Appointments, latest first", body = PageResponse<AppointmentResponse>),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema)
    ),
    tags = ["appointments"],
    operation_id = "myAppointments",
    security(("AccessToken" = []))
)]
#[get("/appointments/my")]
pub async fn my_appointments(
    state: web::Data<HttpState>,
    auth: Authenticated,
    query: web::Query<MyAppointmentsQuery>,
) -> ApiResult<web::Json<PageResponse<AppointmentResponse>>> {
    let query = query.into_inner();
    let page = page_request(query.skip, query.limit, APPOINTMENT_PAGE)?;
    let status = parse_optional_choice(query.status.as_deref(), FieldName::new("status"))?;
    let appointments = state
        .appointments
        .my_appointments(auth.actor(), status, page)
        .await?;
    Ok(web::Json(appointments.into()))
}

/// A doctor's non-cancelled appointments, earliest first.
#[utoipa::path(
    get,
    path = "/api/v1/appointments/doctor/{doctor_id}/schedule",
    params(
        ("doctor_id" = String, Path, description = "Doctor identifier"),
        ScheduleQuery
    ),
    responses(
        (status = 200, description = "Schedule", body = [AppointmentResponse]),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema)
    ),
    tags = ["appointments"],
    operation_id = "doctorSchedule",
    security(("AccessToken" = []))
)]
#[get("/appointments/doctor/{doctor_id}/schedule")]
pub async fn doctor_schedule(
    state: web::Data<HttpState>,
    _auth: Authenticated,
    path: web::Path<String>,
    query: web::Query<ScheduleQuery>,
) -> ApiResult<web::Json<Vec<AppointmentResponse>>> {
    let doctor_id = parse_user_id(&path.into_inner(), FieldName::new("doctorId"))?;
    let window = ScheduleWindow {
        from: parse_optional_rfc3339_timestamp(
            query.date_from.as_deref(),
            FieldName::new("dateFrom"),
        )?,
        to: parse_optional_rfc3339_timestamp(query.date_to.as_deref(), FieldName::new("dateTo"))?,
    };
    let schedule = state
        .appointments
        .doctor_schedule(&doctor_id, window)
        .await?;
    Ok(web::Json(
        schedule.into_iter().map(AppointmentResponse::from).collect(),
    ))
}

/// One appointment, visible to its patient, its doctor and admins.
#[utoipa::path(
    get,
    path = "/api/v1/appointments/{appointment_id}",
    params(("appointment_id" = String, Path, description = "Appointment identifier")),
    responses(
        (status = 200, description = "Appointment", body = AppointmentResponse),
        (status = 403, description = "Not a participant", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema)
    ),
    tags = ["appointments"],
    operation_id = "getAppointment",
    security(("AccessToken" = []))
)]
#[get("/appointments/{appointment_id}")]
pub async fn get_appointment(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> ApiResult<web::Json<AppointmentResponse>> {
    let id = appointment_id(path.into_inner())?;
    let appointment = state.appointments.get(auth.actor(), id).await?;
    Ok(web::Json(appointment.into()))
}

/// Reschedule, change status or replace notes.
#[utoipa::path(
    put,
    path = "/api/v1/appointments/{appointment_id}",
    params(("appointment_id" = String, Path, description = "Appointment identifier")),
    request_body = UpdateAppointmentRequest,
    responses(
        (status = 200, description = "Updated appointment", body = AppointmentResponse),
        (status = 400, description = "Invalid request or closed appointment", body = ErrorSchema),
        (status = 403, description = "Not a participant", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema),
        (status = 409, description = "Slot already taken", body = ErrorSchema)
    ),
    tags = ["appointments"],
    operation_id = "updateAppointment",
    security(("AccessToken" = []))
)]
#[put("/appointments/{appointment_id}")]
pub async fn update_appointment(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
    payload: web::Json<UpdateAppointmentRequest>,
) -> ApiResult<web::Json<AppointmentResponse>> {
    let id = appointment_id(path.into_inner())?;
    let changes = AppointmentChanges::try_from(payload.into_inner())?;
    let appointment = state.appointments.update(auth.actor(), id, changes).await?;
    Ok(web::Json(appointment.into()))
}

/// Cancel an open appointment.
#[utoipa::path(
    post,
    path = "/api/v1/appointments/{appointment_id}/cancel",
    params(("appointment_id" = String, Path, description = "Appointment identifier")),
    request_body = CancelAppointmentRequest,
    responses(
        (status = 200, description = "Cancelled appointment", body = AppointmentResponse),
        (status = 400, description = "Already closed or reason out of range", body = ErrorSchema),
        (status = 403, description = "Not a participant", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema)
    ),
    tags = ["appointments"],
    operation_id = "cancelAppointment",
    security(("AccessToken" = []))
)]
#[post("/appointments/{appointment_id}/cancel")]
pub async fn cancel_appointment(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
    payload: web::Json<CancelAppointmentRequest>,
) -> ApiResult<web::Json<AppointmentResponse>> {
    let id = appointment_id(path.into_inner())?;
    let appointment = state
        .appointments
        .cancel(auth.actor(), id, &payload.cancellation_reason)
        .await?;
    Ok(web::Json(appointment.into()))
}
