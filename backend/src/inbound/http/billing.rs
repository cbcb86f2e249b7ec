//! Billing handlers under `/api/v1/billing`.
//!
//! Amounts travel as integer minor units (cents) in both directions.

use actix_web::{HttpResponse, get, post, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::{
    Error, Invoice, InvoiceItem, InvoiceStatus, NewInvoice, NewInvoiceItem, NewPayment, Payment,
    PaymentMethod, PaymentReceipt,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::{ErrorSchema, InvoiceStatusSchema, PaymentMethodSchema};
use crate::inbound::http::session::Authenticated;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, parse_choice, parse_optional_choice, parse_optional_uuid, parse_rfc3339_timestamp,
    parse_user_id, parse_uuid,
};

/// One line of a new invoice.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItemRequest {
    /// 5 to 255 characters.
    #[schema(example = "General consultation")]
    pub description: String,
    pub quantity: u32,
    /// Price per unit in cents.
    pub unit_price: i64,
    /// At most 50 characters.
    pub service_code: Option<String>,
}

impl From<InvoiceItemRequest> for NewInvoiceItem {
    fn from(value: InvoiceItemRequest) -> Self {
        Self {
            description: value.description,
            quantity: value.quantity,
            unit_price: value.unit_price,
            service_code: value.service_code,
        }
    }
}

/// Body for `POST /api/v1/billing/invoices`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub patient_id: String,
    pub appointment_id: Option<String>,
    pub items: Vec<InvoiceItemRequest>,
    #[serde(default)]
    pub tax_amount: i64,
    #[serde(default)]
    pub discount_amount: i64,
    /// RFC 3339 due date.
    pub due_date: String,
    pub notes: Option<String>,
}

impl TryFrom<CreateInvoiceRequest> for NewInvoice {
    type Error = Error;

    fn try_from(value: CreateInvoiceRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            patient_id: parse_user_id(&value.patient_id, FieldName::new("patientId"))?,
            appointment_id: parse_optional_uuid(
                value.appointment_id.as_deref(),
                FieldName::new("appointmentId"),
            )?,
            items: value.items.into_iter().map(Into::into).collect(),
            tax_amount: value.tax_amount,
            discount_amount: value.discount_amount,
            due_date: parse_rfc3339_timestamp(&value.due_date, FieldName::new("dueDate"))?,
            notes: value.notes,
        })
    }
}

/// Body for `POST /api/v1/billing/invoices/{invoice_id}/payments`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Cents; positive and no larger than the balance due.
    pub amount: i64,
    #[schema(value_type = PaymentMethodSchema)]
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
}

impl TryFrom<PaymentRequest> for NewPayment {
    type Error = Error;

    fn try_from(value: PaymentRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            amount: value.amount,
            payment_method: parse_choice(&value.payment_method, FieldName::new("paymentMethod"))?,
            transaction_id: value.transaction_id,
            notes: value.notes,
        })
    }
}

/// Filter for `GET /api/v1/billing/invoices/my`.
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MyInvoicesQuery {
    #[param(value_type = Option<InvoiceStatusSchema>)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItemResponse {
    pub id: Uuid,
    pub description: String,
    pub quantity: u32,
    pub unit_price: i64,
    pub total_price: i64,
    pub service_code: Option<String>,
}

impl From<InvoiceItem> for InvoiceItemResponse {
    fn from(value: InvoiceItem) -> Self {
        Self {
            id: value.id,
            description: value.description,
            quantity: value.quantity,
            unit_price: value.unit_price,
            total_price: value.total_price,
            service_code: value.service_code,
        }
    }
}

/// Invoice with its line items.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub id: Uuid,
    #[schema(example = "INV-20310310-0A1B2C")]
    pub invoice_number: String,
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub subtotal: i64,
    pub tax_amount: i64,
    pub discount_amount: i64,
    pub total_amount: i64,
    pub amount_paid: i64,
    /// Always `totalAmount - amountPaid`.
    pub balance_due: i64,
    #[schema(value_type = InvoiceStatusSchema)]
    pub status: InvoiceStatus,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub paid_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub items: Vec<InvoiceItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(value: Invoice) -> Self {
        Self {
            id: value.id,
            invoice_number: value.invoice_number,
            patient_id: *value.patient_id.as_uuid(),
            appointment_id: value.appointment_id,
            subtotal: value.subtotal,
            tax_amount: value.tax_amount,
            discount_amount: value.discount_amount,
            total_amount: value.total_amount,
            amount_paid: value.amount_paid,
            balance_due: value.balance_due,
            status: value.status,
            issue_date: value.issue_date,
            due_date: value.due_date,
            paid_date: value.paid_date,
            notes: value.notes,
            items: value.items.into_iter().map(Into::into).collect(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub amount: i64,
    #[schema(value_type = PaymentMethodSchema)]
    pub payment_method: PaymentMethod,
    pub payment_date: DateTime<Utc>,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
    pub processed_by: Uuid,
}

impl From<Payment> for PaymentResponse {
    fn from(value: Payment) -> Self {
        Self {
            id: value.id,
            invoice_id: value.invoice_id,
            amount: value.amount,
            payment_method: value.payment_method,
            payment_date: value.payment_date,
            transaction_id: value.transaction_id,
            notes: value.notes,
            processed_by: *value.processed_by.as_uuid(),
        }
    }
}

/// Recorded payment plus the invoice balance it left behind.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceiptResponse {
    pub payment: PaymentResponse,
    #[schema(value_type = InvoiceStatusSchema)]
    pub invoice_status: InvoiceStatus,
    pub amount_paid: i64,
    pub balance_due: i64,
}

impl From<PaymentReceipt> for PaymentReceiptResponse {
    fn from(value: PaymentReceipt) -> Self {
        Self {
            payment: value.payment.into(),
            invoice_status: value.settlement.status,
            amount_paid: value.settlement.amount_paid,
            balance_due: value.settlement.balance_due,
        }
    }
}

fn invoice_id(raw: &str) -> Result<Uuid, Error> {
    parse_uuid(raw, FieldName::new("invoiceId"))
}

/// Issue an invoice to a patient.
#[utoipa::path(
    post,
    path = "/api/v1/billing/invoices",
    request_body = CreateInvoiceRequest,
    responses(
        (status = 201, description = "Invoice issued", body = InvoiceResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 403, description = "Caller is not admin or staff", body = ErrorSchema),
        (status = 404, description = "Patient not found", body = ErrorSchema)
    ),
    tags = ["billing"],
    operation_id = "createInvoice",
    security(("AccessToken" = []))
)]
#[post("/billing/invoices")]
pub async fn create_invoice(
    state: web::Data<HttpState>,
    auth: Authenticated,
    payload: web::Json<CreateInvoiceRequest>,
) -> ApiResult<HttpResponse> {
    let request = NewInvoice::try_from(payload.into_inner())?;
    let invoice = state.billing.create_invoice(auth.actor(), request).await?;
    Ok(HttpResponse::Created().json(InvoiceResponse::from(invoice)))
}

/// The caller's invoices; every invoice for admin and staff.
#[utoipa::path(
    get,
    path = "/api/v1/billing/invoices/my",
    params(MyInvoicesQuery),
    responses(
        (status = 200, description = "Invoices, newest first", body = [InvoiceResponse]),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema)
    ),
    tags = ["billing"],
    operation_id = "myInvoices",
    security(("AccessToken" = []))
)]
#[get("/billing/invoices/my")]
pub async fn my_invoices(
    state: web::Data<HttpState>,
    auth: Authenticated,
    query: web::Query<MyInvoicesQuery>,
) -> ApiResult<web::Json<Vec<InvoiceResponse>>> {
    let status = parse_optional_choice(query.status.as_deref(), FieldName::new("status"))?;
    let invoices = state.billing.my_invoices(auth.actor(), status).await?;
    Ok(web::Json(invoices.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/billing/invoices/{invoice_id}",
    params(("invoice_id" = String, Path, description = "Invoice identifier")),
    responses(
        (status = 200, description = "Invoice", body = InvoiceResponse),
        (status = 403, description = "Forbidden", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema)
    ),
    tags = ["billing"],
    operation_id = "getInvoice",
    security(("AccessToken" = []))
)]
#[get("/billing/invoices/{invoice_id}")]
pub async fn get_invoice(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> ApiResult<web::Json<InvoiceResponse>> {
    let id = invoice_id(&path)?;
    let invoice = state.billing.get_invoice(auth.actor(), id).await?;
    Ok(web::Json(invoice.into()))
}

/// Apply a payment against the balance due.
#[utoipa::path(
    post,
    path = "/api/v1/billing/invoices/{invoice_id}/payments",
    params(("invoice_id" = String, Path, description = "Invoice identifier")),
    request_body = PaymentRequest,
    responses(
        (status = 200, description = "Payment recorded", body = PaymentReceiptResponse),
        (status = 400, description = "Invoice closed or amount out of range", body = ErrorSchema),
        (status = 403, description = "Forbidden", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema),
        (status = 409, description = "Concurrent payment changed the balance", body = ErrorSchema)
    ),
    tags = ["billing"],
    operation_id = "recordPayment",
    security(("AccessToken" = []))
)]
#[post("/billing/invoices/{invoice_id}/payments")]
pub async fn record_payment(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
    payload: web::Json<PaymentRequest>,
) -> ApiResult<web::Json<PaymentReceiptResponse>> {
    let id = invoice_id(&path)?;
    let request = NewPayment::try_from(payload.into_inner())?;
    let receipt = state
        .billing
        .record_payment(auth.actor(), id, request)
        .await?;
    Ok(web::Json(receipt.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/billing/invoices/{invoice_id}/payments",
    params(("invoice_id" = String, Path, description = "Invoice identifier")),
    responses(
        (status = 200, description = "Payments, oldest first", body = [PaymentResponse]),
        (status = 403, description = "Forbidden", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema)
    ),
    tags = ["billing"],
    operation_id = "listPayments",
    security(("AccessToken" = []))
)]
#[get("/billing/invoices/{invoice_id}/payments")]
pub async fn list_payments(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> ApiResult<web::Json<Vec<PaymentResponse>>> {
    let id = invoice_id(&path)?;
    let payments = state.billing.list_payments(auth.actor(), id).await?;
    Ok(web::Json(payments.into_iter().map(Into::into).collect()))
}

/// Cancel an unpaid invoice.
#[utoipa::path(
    post,
    path = "/api/v1/billing/invoices/{invoice_id}/cancel",
    params(("invoice_id" = String, Path, description = "Invoice identifier")),
    responses(
        (status = 200, description = "Cancelled invoice", body = InvoiceResponse),
        (status = 400, description = "Invoice already paid or cancelled", body = ErrorSchema),
        (status = 403, description = "Caller is not admin or staff", body = ErrorSchema),
        (status = 404, description = "Not found", body = ErrorSchema)
    ),
    tags = ["billing"],
    operation_id = "cancelInvoice",
    security(("AccessToken" = []))
)]
#[post("/billing/invoices/{invoice_id}/cancel")]
pub async fn cancel_invoice(
    state: web::Data<HttpState>,
    auth: Authenticated,
    path: web::Path<String>,
) -> ApiResult<web::Json<InvoiceResponse>> {
    let id = invoice_id(&path)?;
    let invoice = state.billing.cancel_invoice(auth.actor(), id).await?;
    Ok(web::Json(invoice.into()))
}
