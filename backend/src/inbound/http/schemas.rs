//! OpenAPI schema definitions for domain types.
//!
//! Domain types remain framework-agnostic by not deriving `ToSchema`. This
//! module provides the schema definitions required for OpenAPI documentation
//! using utoipa's external schema registration.
//!
//! The schema wrappers mirror the structure of their corresponding domain
//! types but live in the inbound adapter layer where framework concerns belong.

use utoipa::ToSchema;

/// OpenAPI schema for [`crate::domain::ErrorCode`].
///
/// Stable machine-readable error codes returned in API error responses.
#[derive(ToSchema)]
#[schema(as = crate::domain::ErrorCode)]
pub enum ErrorCodeSchema {
    /// The request is malformed or fails validation.
    #[schema(rename = "invalid_request")]
    InvalidRequest,
    /// Authentication failed or is missing.
    #[schema(rename = "unauthorized")]
    Unauthorized,
    /// Authenticated but not permitted to perform this action.
    #[schema(rename = "forbidden")]
    Forbidden,
    /// The requested resource does not exist.
    #[schema(rename = "not_found")]
    NotFound,
    /// The request conflicts with existing state.
    #[schema(rename = "conflict")]
    Conflict,
    /// A backing service is unavailable.
    #[schema(rename = "service_unavailable")]
    ServiceUnavailable,
    /// An unexpected error occurred on the server.
    #[schema(rename = "internal_error")]
    InternalError,
}

/// OpenAPI schema for [`crate::domain::Error`].
///
/// API error response payload with machine-readable code and human-readable
/// message.
#[derive(ToSchema)]
#[schema(as = crate::domain::Error, rename_all = "camelCase")]
#[expect(
    dead_code,
    reason = "Used only for OpenAPI schema generation via utoipa"
)]
pub struct ErrorSchema {
    /// Stable machine-readable error code.
    #[schema(example = "invalid_request")]
    code: ErrorCodeSchema,
    /// Human-readable message returned to clients.
    #[schema(example = "appointmentDate must be in the future")]
    message: String,
    /// Correlation identifier for tracing this error across systems.
    #[schema(example = "3fa85f64-5717-4562-b3fc-2c963f66afa6")]
    trace_id: Option<String>,
    /// Supplementary error details for clients.
    details: Option<serde_json::Value>,
}

/// OpenAPI schema for [`crate::domain::Role`].
#[derive(ToSchema)]
#[schema(as = Role)]
pub enum RoleSchema {
    #[schema(rename = "patient")]
    Patient,
    #[schema(rename = "doctor")]
    Doctor,
    #[schema(rename = "admin")]
    Admin,
    #[schema(rename = "staff")]
    Staff,
}

/// OpenAPI schema for [`crate::domain::AppointmentStatus`].
#[derive(ToSchema)]
#[schema(as = AppointmentStatus)]
pub enum AppointmentStatusSchema {
    #[schema(rename = "scheduled")]
    Scheduled,
    #[schema(rename = "confirmed")]
    Confirmed,
    #[schema(rename = "cancelled")]
    Cancelled,
    #[schema(rename = "completed")]
    Completed,
    #[schema(rename = "no_show")]
    NoShow,
    #[schema(rename = "rescheduled")]
    Rescheduled,
}

/// OpenAPI schema for [`crate::domain::PrescriptionStatus`].
#[derive(ToSchema)]
#[schema(as = PrescriptionStatus)]
pub enum PrescriptionStatusSchema {
    #[schema(rename = "active")]
    Active,
    #[schema(rename = "completed")]
    Completed,
    #[schema(rename = "cancelled")]
    Cancelled,
    #[schema(rename = "expired")]
    Expired,
}

/// OpenAPI schema for [`crate::domain::InvoiceStatus`].
#[derive(ToSchema)]
#[schema(as = InvoiceStatus)]
pub enum InvoiceStatusSchema {
    #[schema(rename = "draft")]
    Draft,
    #[schema(rename = "pending")]
    Pending,
    #[schema(rename = "paid")]
    Paid,
    #[schema(rename = "partially_paid")]
    PartiallyPaid,
    #[schema(rename = "overdue")]
    Overdue,
    #[schema(rename = "cancelled")]
    Cancelled,
}

/// OpenAPI schema for [`crate::domain::PaymentMethod`].
#[derive(ToSchema)]
#[schema(as = PaymentMethod)]
pub enum PaymentMethodSchema {
    #[schema(rename = "cash")]
    Cash,
    #[schema(rename = "credit_card")]
    CreditCard,
    #[schema(rename = "debit_card")]
    DebitCard,
    #[schema(rename = "insurance")]
    Insurance,
    #[schema(rename = "bank_transfer")]
    BankTransfer,
    #[schema(rename = "online")]
    Online,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AppointmentStatus, InvoiceStatus, PaymentMethod, Role};
    use rstest::rstest;
    use utoipa::PartialSchema;

    fn schema_to_json<T: PartialSchema>() -> String {
        serde_json::to_string(&T::schema()).expect("schema serialises to JSON")
    }

    #[test]
    fn error_schema_has_expected_name() {
        let schema_json = schema_to_json::<ErrorSchema>();
        // utoipa replaces :: with . in schema names
        assert_eq!(ErrorSchema::name(), "crate.domain.Error");
        assert!(schema_json.contains("message"));
        assert!(
            schema_json.contains("traceId"),
            "schema should use the camelCase wire name"
        );
    }

    #[test]
    fn error_code_schema_variants_match_domain() {
        let schema_json = schema_to_json::<ErrorCodeSchema>();
        for code in [
            "invalid_request",
            "unauthorized",
            "forbidden",
            "not_found",
            "conflict",
            "service_unavailable",
            "internal_error",
        ] {
            assert!(schema_json.contains(code), "missing {code}");
        }
    }

    fn wire(value: impl serde::Serialize) -> String {
        serde_json::to_value(value)
            .expect("enum serialises")
            .as_str()
            .expect("enum serialises to a string")
            .to_owned()
    }

    #[rstest]
    fn enum_schemas_list_every_wire_value() {
        let roles = schema_to_json::<RoleSchema>();
        for role in Role::ALL {
            assert!(roles.contains(&wire(role)));
        }
        let statuses = schema_to_json::<AppointmentStatusSchema>();
        assert!(statuses.contains(&wire(AppointmentStatus::NoShow)));
        let invoices = schema_to_json::<InvoiceStatusSchema>();
        assert!(invoices.contains(&wire(InvoiceStatus::PartiallyPaid)));
        let methods = schema_to_json::<PaymentMethodSchema>();
        assert!(methods.contains(&wire(PaymentMethod::BankTransfer)));
    }
}
