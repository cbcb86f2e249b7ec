//! OpenAPI documentation configuration.
//!
//! This module defines the [`ApiDoc`] struct which generates the OpenAPI
//! specification for the REST API. It registers:
//!
//! - **Paths**: every HTTP endpoint from the inbound layer
//! - **Schemas**: request and response DTOs plus the domain wrappers in
//!   [`crate::inbound::http::schemas`], which keep utoipa out of the domain
//! - **Security**: the access token (bearer header or cookie) and the
//!   refresh token cookie
//!
//! The generated specification is used by Swagger UI (debug builds) and
//! exported via `cargo run --bin openapi-dump` for external tooling.

use crate::inbound::http::cookies::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::inbound::http::schemas::{
    AppointmentStatusSchema, ErrorCodeSchema, ErrorSchema, InvoiceStatusSchema,
    PaymentMethodSchema, PrescriptionStatusSchema, RoleSchema,
};
use crate::inbound::http::{
    admin, appointments, auth, billing, health, messages, prescriptions, users,
};
use utoipa::openapi::security::{
    ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme,
};
use utoipa::{Modify, OpenApi};

/// Enrich the generated document with the token security schemes.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "AccessToken",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some(format!(
                        "Access token from POST /api/v1/auth/login, sent as a bearer \
                         token or in the `{ACCESS_TOKEN_COOKIE}` cookie."
                    )))
                    .build(),
            ),
        );
        components.add_security_scheme(
            "RefreshToken",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                REFRESH_TOKEN_COOKIE,
                "Opaque refresh token, scoped to POST /api/v1/auth/refresh.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
/// Swagger UI is enabled in debug builds only and used by tooling.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "MediSecure API",
        description = "Healthcare records backend: accounts, appointments, prescriptions, \
                       secure messaging and billing."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("AccessToken" = [])),
    paths(
        auth::signup,
        auth::verify_email,
        auth::resend_verification,
        auth::login,
        auth::verify_device,
        auth::me,
        auth::refresh,
        auth::logout,
        auth::forgot_password,
        auth::reset_password,
        users::get_me,
        users::update_me,
        users::delete_me,
        users::list_devices,
        users::remove_device,
        users::change_password,
        users::get_profile,
        users::upsert_profile,
        admin::list_users,
        admin::get_user,
        admin::update_role,
        admin::delete_user,
        admin::list_audit_logs,
        admin::user_audit_logs,
        admin::stats,
        appointments::create_appointment,
        appointments::my_appointments,
        appointments::doctor_schedule,
        appointments::get_appointment,
        appointments::update_appointment,
        appointments::cancel_appointment,
        prescriptions::create_prescription,
        prescriptions::my_prescriptions,
        prescriptions::get_prescription,
        prescriptions::cancel_prescription,
        prescriptions::request_refill,
        messages::send_message,
        messages::inbox,
        messages::sent_messages,
        messages::get_message,
        messages::mark_read,
        messages::delete_message,
        billing::create_invoice,
        billing::my_invoices,
        billing::get_invoice,
        billing::record_payment,
        billing::list_payments,
        billing::cancel_invoice,
        health::root,
        health::ready,
        health::live,
    ),
    components(schemas(
        ErrorSchema,
        ErrorCodeSchema,
        RoleSchema,
        AppointmentStatusSchema,
        PrescriptionStatusSchema,
        InvoiceStatusSchema,
        PaymentMethodSchema,
        users::UserResponse,
        users::MessageResponse,
        users::DeviceResponse,
        users::ProfileResponse,
        appointments::AppointmentResponse,
        prescriptions::PrescriptionResponse,
        prescriptions::MedicationResponse,
        messages::ConversationMessage,
        billing::InvoiceResponse,
        billing::PaymentResponse,
        admin::AuditLogResponse,
        admin::StatsResponse,
    )),
    tags(
        (name = "auth", description = "Signup, verification, login and token lifecycle"),
        (name = "users", description = "Self-service account and profile management"),
        (name = "admin", description = "Administration; admin role only"),
        (name = "appointments", description = "Booking and scheduling"),
        (name = "prescriptions", description = "Prescriptions and refills"),
        (name = "messages", description = "Encrypted patient and clinician messaging"),
        (name = "billing", description = "Invoices and payments"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    //! Tests verifying OpenAPI paths, schemas and security schemes.

    use super::*;
    use crate::test_support::openapi::{has_property, unwrap_object_schema};
    use rstest::rstest;

    // utoipa replaces :: with . in schema names
    const ERROR_SCHEMA_NAME: &str = "crate.domain.Error";

    #[rstest]
    fn error_schema_has_required_fields() {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.as_ref().expect("components").schemas;
        let error = unwrap_object_schema(
            schemas.get(ERROR_SCHEMA_NAME).expect("Error schema"),
            ERROR_SCHEMA_NAME,
        );

        assert!(has_property(error, "code"));
        assert!(has_property(error, "message"));
        assert!(has_property(error, "traceId"));
    }

    #[rstest]
    #[case("/api/v1/auth/login")]
    #[case("/api/v1/users/me")]
    #[case("/api/v1/admin/stats")]
    #[case("/api/v1/appointments/my")]
    #[case("/api/v1/prescriptions/{prescription_id}/medications/{medication_id}/refill")]
    #[case("/api/v1/messages/inbox")]
    #[case("/api/v1/billing/invoices/{invoice_id}/payments")]
    #[case("/health/ready")]
    fn documented_paths_include(#[case] path: &str) {
        let doc = ApiDoc::openapi();
        assert!(
            doc.paths.paths.contains_key(path),
            "missing path {path}"
        );
    }

    #[rstest]
    fn security_schemes_are_registered() {
        let doc = ApiDoc::openapi();
        let schemes = &doc.components.as_ref().expect("components").security_schemes;
        assert!(schemes.contains_key("AccessToken"));
        assert!(schemes.contains_key("RefreshToken"));
    }
}
