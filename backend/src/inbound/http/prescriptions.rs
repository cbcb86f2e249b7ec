//! Prescription handlers under `/api/v1/prescriptions`.
//!
//! Doctors issue and cancel; patients read and draw refills against a
//! single medication line.

use actix_web::{HttpResponse, get, post, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::{
    Error, Medication, NewMedication, NewPrescription, Prescription, PrescriptionStatus,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::{ErrorSchema, PrescriptionStatusSchema};
use crate::inbound::http::session::Authenticated;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, parse_optional_choice, parse_optional_uuid, parse_user_id, parse_uuid,
};

/// One medication line of a new prescription.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRequest {
    #[schema(example = "Amoxicillin")]
    pub medication_name: String,
    #[schema(example = "500mg")]
    pub dosage: String,
    #[schema(example = "three times daily")]
    pub frequency: String,
    /// 1 to 365.
    pub duration_days: u32,
    pub quantity: u32,
    /// 0 to 12.
    #[serde(default)]
    pub refills_allowed: u32,
    pub instructions: Option<String>,
}

impl From<MedicationRequest> for NewMedication {
    fn from(value: MedicationRequest) -> Self {
        Self {
            medication_name: value.medication_name,
            dosage: value.dosage,
            frequency: value.frequency,
            duration_days: value.duration_days,
            quantity: value.quantity,
            refills_allowed: value.refills_allowed,
            instructions: value.instructions,
        }
    }
}

/// Body for `POST /api/v1/prescriptions`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePrescriptionRequest {
    pub patient_id: String,
    pub appointment_id: Option<String>,
    /// 10 to 2000 characters.
    pub diagnosis: String,
    pub notes: Option<String>,
    pub medications: Vec<MedicationRequest>,
}

impl TryFrom<CreatePrescriptionRequest> for NewPrescription {
    type Error = Error;

    fn try_from(value: CreatePrescriptionRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            patient_id: parse_user_id(&value.patient_id, FieldName::new("patientId"))?,
            appointment_id: parse_optional_uuid(
                value.appointment_id.as_deref(),
                FieldName::new("appointmentId"),
            )?,
            diagnosis: value.diagnosis,
            notes: value.notes,
            medications: value.medications.into_iter().map(Into::into).collect(),
        })
    }
}

/// Filter for `GET /api/v1/prescriptions/my`.
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MyPrescriptionsQuery {
    #[param(value_type = Option<PrescriptionStatusSchema>)]
    pub status: Option<String>,
}

/// Medication line as returned to clients.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MedicationResponse {
    pub id: Uuid,
    pub medication_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration_days: u32,
    pub quantity: u32,
    pub refills_allowed: u32,
    pub refills_remaining: u32,
    pub instructions: Option<String>,
}

impl From<Medication> for MedicationResponse {
    fn from(value: Medication) -> Self {
        Self {
            id: value.id,
            medication_name: value.medication_name,
            dosage: value.dosage,
            frequency: value.frequency,
            duration_days: value.duration_days,
            quantity: value.quantity,
            refills_allowed: value.refills_allowed,
            refills_remaining: value.refills_remaining,
            instructions: value.instructions,
        }
    }
}

/// Prescription with its medication lines.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionResponse {
    pub id: Uuid,
    #[schema(example = "RX-20310310090000-0A1B2C3D")]
    pub prescription_number: String,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub diagnosis: String,
    pub notes: Option<String>,
    #[schema(value_type = PrescriptionStatusSchema)]
    pub status: PrescriptionStatus,
    pub issued_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub medications: Vec<MedicationResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Prescription> for PrescriptionResponse {
    fn from(value: Prescription) -> Self {
        Self {
            id: value.id,
            prescription_number: value.prescription_number,
            patient_id: *value.patient_id.as_uuid(),
            doctor_id: *value.doctor_id.as_uuid(),
            appointment_id: value.appointment_id,
            diagnosis: value.diagnosis,
            notes: value.notes,
            status: value.status,
            issued_date: value.issued_date,
            expiry_date: value.expiry_date,
            medications: value.medications.into_iter().map(Into::into).collect(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Outcome of a refill request.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefillResponse {
    pub message: String,
    pub refills_remaining: u32,
    pub medication: MedicationResponse,
}

fn prescription_id(raw: &str) -> Result<Uuid, Error> {
    parse_uuid(raw, FieldName::new("prescriptionId"))
}

/// Issue a prescription for a patient.
#[utoipa::path(
    post,
    path = "/api/v1/prescriptions",
    request_body = CreatePrescriptionRequest,
    responses(
        (status = 201, description = "Prescription issued", body = PrescriptionResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 403, description = "Caller is not a doctor", body = ErrorSchema),
        (status = 404, description = "Patient not found", body = ErrorSchema)
    ),
    tags = ["prescriptions"],
    operation_id = "createPrescription",
    security(("AccessToken" = []))
)]
#[post("/prescriptions")]
pub async fn create_prescription(
    state: web::Data<HttpState>,
    auth: Authenticated,
    payload: web::Json<CreatePrescriptionRequest>,
) -> ApiResult<HttpResponse> {
    let request = NewPrescription::try_from(payload.into_inner())?;
    let prescription = state.prescriptions.create(auth.actor(), request).await?;
    Ok(HttpResponse::Created().json(PrescriptionResponse::from(prescription)))
}

/// Prescriptions for the caller, or written by them when they are a doctor.
#[utoipa::path(
    get,
    path = "/api/v1/prescriptions/my",
    params(MyPrescriptionsQuery),
    responses(
        (status = 200, description = "Prescriptions, newest first", body = [PrescriptionResponse]),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema)
    ),
    tags = ["prescriptions"],
    operation_id = "myPrescriptions",
    security(("AccessToken" = []))
)]
#[get("/prescriptions/my")]
pub async fn my_prescriptions(
    state: web::Data<HttpState>,
    auth: Authenticated,
    query: web::Query<MyPrescriptionsQuery>,
) -> ApiResult<web::Json<Vec<PrescriptionResponse>>> {
    let status = parse_optional_choice(query.status.as_deref(), FieldName::new("status"))?;
    let prescriptions = state
        .prescriptions
        .my_prescriptions(auth.actor(), status)
        .await?;
    Ok(web::Json(
        prescriptions
            .into_iter()
            .map(PrescriptionResponse::from)
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/prescriptions/{prescription_id}",
    params(("prescription_id" = String, Path, description = "Prescription identifier")),
    responses(
        (status = 200, description = "Prescription", body = PrescriptionResponse),
        (status = 403, description = "Forbidden", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema)
    ),
    tags = ["prescriptions"],
    operation_id = "getPrescription",
    security(("AccessToken" = []))
)]
#[get("/prescriptions/{prescription_id}")]
pub async fn get_prescription(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> ApiResult<web::Json<PrescriptionResponse>> {
    let id = prescription_id(&path)?;
    let prescription = state.prescriptions.get(auth.actor(), id).await?;
    Ok(web::Json(prescription.into()))
}

/// Withdraw an active prescription.
#[utoipa::path(
    post,
    path = "/api/v1/prescriptions/{prescription_id}/cancel",
    params(("prescription_id" = String, Path, description = "Prescription identifier")),
    responses(
        (status = 200, description = "Cancelled prescription", body = PrescriptionResponse),
        (status = 400, description = "Prescription is not active", body = ErrorSchema),
        (status = 403, description = "Not the prescribing doctor", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema)
    ),
    tags = ["prescriptions"],
    operation_id = "cancelPrescription",
    security(("AccessToken" = []))
)]
#[post("/prescriptions/{prescription_id}/cancel")]
pub async fn cancel_prescription(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> ApiResult<web::Json<PrescriptionResponse>> {
    let id = prescription_id(&path)?;
    let prescription = state.prescriptions.cancel(auth.actor(), id).await?;
    Ok(web::Json(prescription.into()))
}

/// Draw one refill of a medication line.
#[utoipa::path(
    post,
    path = "/api/v1/prescriptions/{prescription_id}/medications/{medication_id}/refill",
    params(
        ("prescription_id" = String, Path, description = "Prescription identifier"),
        ("medication_id" = String, Path, description = "Medication line identifier")
    ),
    responses(
        (status = 200, description = "Refill granted", body = RefillResponse),
        (status = 400, description = "Inactive prescription or no refills left", body = ErrorSchema),
        (status = 403, description = "Not the patient", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema)
    ),
    tags = ["prescriptions"],
    operation_id = "requestRefill",
    security(("AccessToken" = []))
)]
#[post("/prescriptions/{prescription_id}/medications/{medication_id}/refill")]
pub async fn request_refill(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<(String, String)>,
) -> ApiResult<web::Json<RefillResponse>> {
    let (prescription, medication) = path.into_inner();
    let id = prescription_id(&prescription)?;
    let medication_id = parse_uuid(&medication, FieldName::new("medicationId"))?;
    let medication = state
        .prescriptions
        .request_refill(auth.actor(), id, medication_id)
        .await?;
    Ok(web::Json(RefillResponse {
        message: "refill processed".to_owned(),
        refills_remaining: medication.refills_remaining,
        medication: medication.into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Role, User};
    use crate::inbound::http::configure;
    use crate::test_support::http::{TestHarness, bearer, send_json};
    use actix_web::http::StatusCode;
    use actix_web::{App, test as actix_test};
    use rstest::rstest;
    use serde_json::{Value, json};

    fn issue_body(patient: &User, refills: u32) -> Value {
        json!({
            "patientId": patient.id.to_string(),
            "diagnosis": "Bacterial sinus infection",
            "medications": [{
                "medicationName": "Amoxicillin",
                "dosage": "500mg",
                "frequency": "three times daily",
                "durationDays": 10,
                "quantity": 30,
                "refillsAllowed": refills,
            }],
        })
    }

    #[rstest]
    #[actix_web::test]
    async fn doctors_issue_and_patients_refill() {
        let harness = TestHarness::new();
        let (_, doctor) = harness
            .seed_with_token("house@example.com", Role::Doctor)
            .await;
        let (patient, patient_token) = harness
            .seed_with_token("ada@example.com", Role::Patient)
            .await;
        let app = actix_test::init_service(
            App::new().app_data(harness.data()).configure(configure),
        )
        .await;

        let request = actix_test::TestRequest::post()
            .uri("/api/v1/prescriptions")
            .insert_header(bearer(&doctor))
            .set_json(issue_body(&patient, 1))
            .to_request();
        let (status, issued) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(issued["status"], "active");
        assert_eq!(issued["expiryDate"], "2032-03-09T09:00:00Z");
        assert!(
            issued["prescriptionNumber"]
                .as_str()
                .is_some_and(|number| number.starts_with("RX-20310310090000-"))
        );
        let refill_uri = format!(
            "/api/v1/prescriptions/{}/medications/{}/refill",
            issued["id"].as_str().unwrap_or_default(),
            issued["medications"][0]["id"].as_str().unwrap_or_default(),
        );

        let refill = || {
            actix_test::TestRequest::post()
                .uri(&refill_uri)
                .insert_header(bearer(&patient_token))
                .to_request()
        };
        let (status, body) = send_json(&app, refill()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["refillsRemaining"], 0);

        let (status, body) = send_json(&app, refill()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "no refills remaining");

        let request = actix_test::TestRequest::post()
            .uri(&refill_uri)
            .insert_header(bearer(&doctor))
            .to_request();
        let (status, _) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[rstest]
    #[actix_web::test]
    async fn only_doctors_issue() {
        let harness = TestHarness::new();
        let (patient, patient_token) = harness
            .seed_with_token("ada@example.com", Role::Patient)
            .await;
        let app = actix_test::init_service(
            App::new().app_data(harness.data()).configure(configure),
        )
        .await;

        let request = actix_test::TestRequest::post()
            .uri("/api/v1/prescriptions")
            .insert_header(bearer(&patient_token))
            .set_json(issue_body(&patient, 0))
            .to_request();
        let (status, _) = send_json(&app, request).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[rstest]
    #[case::short_diagnosis("diagnosis", json!("flu"))]
    #[case::no_medications("medications", json!([]))]
    #[case::bad_patient("patientId", json!("not-a-uuid"))]
    #[actix_web::test]
    async fn invalid_prescriptions_are_rejected(#[case] field: &str, #[case] value: Value) {
        let harness = TestHarness::new();
        let (_, doctor) = harness
            .seed_with_token("house@example.com", Role::Doctor)
            .await;
        let patient = harness
            .seed_user("ada@example.com", "Ada Lovelace", Role::Patient)
            .await;
        let app = actix_test::init_service(
            App::new().app_data(harness.data()).configure(configure),
        )
        .await;
        let mut body = issue_body(&patient, 0);
        body[field] = value;

        let request = actix_test::TestRequest::post()
            .uri("/api/v1/prescriptions")
            .insert_header(bearer(&doctor))
            .set_json(body)
            .to_request();
        let (status, _) = send_json(&app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[rstest]
    #[actix_web::test]
    async fn listing_visibility_and_cancellation() {
        let harness = TestHarness::new();
        let (_, doctor) = harness
            .seed_with_token("house@example.com", Role::Doctor)
            .await;
        let (_, other_doctor) = harness
            .seed_with_token("wilson@example.com", Role::Doctor)
            .await;
        let (patient, patient_token) = harness
            .seed_with_token("ada@example.com", Role::Patient)
            .await;
        let (_, stranger) = harness
            .seed_with_token("eve@example.com", Role::Patient)
            .await;
        let app = actix_test::init_service(
            App::new().app_data(harness.data()).configure(configure),
        )
        .await;
        let request = actix_test::TestRequest::post()
            .uri("/api/v1/prescriptions")
            .insert_header(bearer(&doctor))
            .set_json(issue_body(&patient, 2))
            .to_request();
        let (_, issued) = send_json(&app, request).await;
        let uri = format!(
            "/api/v1/prescriptions/{}",
            issued["id"].as_str().unwrap_or_default()
        );

        for (token, expected) in [(&patient_token, 1), (&doctor, 1), (&other_doctor, 0)] {
            let request = actix_test::TestRequest::get()
                .uri("/api/v1/prescriptions/my?status=active")
                .insert_header(bearer(token))
                .to_request();
            let (status, body) = send_json(&app, request).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body.as_array().map(Vec::len), Some(expected));
        }

        let request = actix_test::TestRequest::get()
            .uri(&uri)
            .insert_header(bearer(&stranger))
            .to_request();
        let (status, _) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let cancel = |token: &str| {
            actix_test::TestRequest::post()
                .uri(&format!("{uri}/cancel"))
                .insert_header(bearer(token))
                .to_request()
        };
        let (status, _) = send_json(&app, cancel(other_doctor.as_str())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = send_json(&app, cancel(doctor.as_str())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "cancelled");
        let (status, _) = send_json(&app, cancel(doctor.as_str())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[rstest]
    #[actix_web::test]
    async fn unknown_prescriptions_are_not_found() {
        let harness = TestHarness::new();
        let (_, token) = harness
            .seed_with_token("ada@example.com", Role::Patient)
            .await;
        let app = actix_test::init_service(
            App::new().app_data(harness.data()).configure(configure),
        )
        .await;

        let request = actix_test::TestRequest::get()
            .uri(&format!("/api/v1/prescriptions/{}", Uuid::new_v4()))
            .insert_header(bearer(&token))
            .to_request();
        let (status, _) = send_json(&app, request).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
