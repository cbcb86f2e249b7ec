//! Invoicing and payment collection.
//!
//! Admin and staff issue and cancel invoices; patients see and pay their
//! own. Payments are applied with an optimistic check on the stored balance
//! so two concurrent payments can never overdraw an invoice.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use rand::Rng;
use rand::rngs::OsRng;
use tracing::info;
use uuid::Uuid;

use super::billing::{ITEM_DESCRIPTION_MAX, ITEM_DESCRIPTION_MIN, SERVICE_CODE_MAX};
use super::ports::{InvoiceRepository, UserRepository};
use super::{
    Actor, Error, Invoice, InvoiceItem, InvoiceStatus, Payment, PaymentMethod, PaymentRejection,
    Role, Settlement, TotalsError, compute_totals, invoice_number, line_total,
};

/// Line of a new invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvoiceItem {
    /// What was provided.
    pub description: String,
    /// Units billed.
    pub quantity: u32,
    /// Price per unit in cents.
    pub unit_price: i64,
    /// Internal tariff code.
    pub service_code: Option<String>,
}

/// Invoice issued to a patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvoice {
    /// Billed patient.
    pub patient_id: super::UserId,
    /// Related appointment.
    pub appointment_id: Option<Uuid>,
    /// At least one line.
    pub items: Vec<NewInvoiceItem>,
    /// Tax in cents.
    pub tax_amount: i64,
    /// Discount in cents.
    pub discount_amount: i64,
    /// Payment deadline.
    pub due_date: DateTime<Utc>,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// Payment submitted against an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    /// Amount in cents.
    pub amount: i64,
    /// How it was paid.
    pub payment_method: PaymentMethod,
    /// External reference.
    pub transaction_id: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// Recorded payment and the invoice state it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    /// Stored payment.
    pub payment: Payment,
    /// Invoice amounts after the payment.
    pub settlement: Settlement,
}

/// Billing service.
#[derive(Clone)]
pub struct BillingService {
    invoices: Arc<dyn InvoiceRepository>,
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
}

impl From<TotalsError> for Error {
    fn from(err: TotalsError) -> Self {
        Error::invalid_request(err.to_string())
    }
}

impl From<PaymentRejection> for Error {
    fn from(err: PaymentRejection) -> Self {
        Error::invalid_request(err.to_string())
    }
}

fn validate_item(item: &NewInvoiceItem) -> Result<(), Error> {
    let length = item.description.trim().chars().count();
    if !(ITEM_DESCRIPTION_MIN..=ITEM_DESCRIPTION_MAX).contains(&length) {
        return Err(Error::invalid_request(format!(
            "description must be between {ITEM_DESCRIPTION_MIN} and {ITEM_DESCRIPTION_MAX} characters"
        )));
    }
    if item.quantity == 0 {
        return Err(Error::invalid_request("quantity must be greater than 0"));
    }
    if item.unit_price <= 0 {
        return Err(Error::invalid_request("unitPrice must be greater than 0"));
    }
    if item
        .service_code
        .as_ref()
        .is_some_and(|code| code.chars().count() > SERVICE_CODE_MAX)
    {
        return Err(Error::invalid_request(format!(
            "serviceCode must be at most {SERVICE_CODE_MAX} characters"
        )));
    }
    Ok(())
}

fn require_billing(actor: &Actor) -> Result<(), Error> {
    actor.require_any(&[Role::Admin, Role::Staff])
}

impl BillingService {
    /// Create the service.
    pub fn new(
        invoices: Arc<dyn InvoiceRepository>,
        users: Arc<dyn UserRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            invoices,
            users,
            clock,
        }
    }

    async fn load_for(&self, actor: &Actor, id: Uuid) -> Result<Invoice, Error> {
        let invoice = self
            .invoices
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found("invoice not found"))?;
        if !actor.role.handles_billing() && invoice.patient_id != actor.user_id {
            return Err(Error::forbidden("not authorised to access this invoice"));
        }
        Ok(invoice)
    }

    /// Issue an invoice. Admin and staff only.
    pub async fn create_invoice(&self, actor: &Actor, request: NewInvoice) -> Result<Invoice, Error> {
        require_billing(actor)?;
        if request.items.is_empty() {
            return Err(Error::invalid_request("at least one item is required"));
        }
        request.items.iter().try_for_each(validate_item)?;
        if request.tax_amount < 0 || request.discount_amount < 0 {
            return Err(Error::invalid_request(
                "taxAmount and discountAmount must not be negative",
            ));
        }
        if self.users.find_by_id(&request.patient_id).await?.is_none() {
            return Err(Error::not_found("patient not found"));
        }
        let lines: Vec<(u32, i64)> = request
            .items
            .iter()
            .map(|item| (item.quantity, item.unit_price))
            .collect();
        let totals = compute_totals(&lines, request.tax_amount, request.discount_amount)?;

        let now = self.clock.utc();
        let id = Uuid::new_v4();
        let items = request
            .items
            .into_iter()
            .map(|item| {
                Ok(InvoiceItem {
                    id: Uuid::new_v4(),
                    invoice_id: id,
                    total_price: line_total(item.quantity, item.unit_price)?,
                    description: item.description.trim().to_owned(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    service_code: item.service_code,
                })
            })
            .collect::<Result<Vec<_>, TotalsError>>()?;
        let invoice = Invoice {
            id,
            invoice_number: invoice_number(now, OsRng.r#gen()),
            patient_id: request.patient_id,
            appointment_id: request.appointment_id,
            subtotal: totals.subtotal,
            tax_amount: request.tax_amount,
            discount_amount: request.discount_amount,
            total_amount: totals.total,
            amount_paid: 0,
            balance_due: totals.total,
            status: InvoiceStatus::Pending,
            issue_date: now,
            due_date: request.due_date,
            paid_date: None,
            notes: request.notes,
            items,
            created_at: now,
            updated_at: now,
        };
        self.invoices.insert(&invoice).await?;
        info!(invoice_id = %invoice.id, patient_id = %invoice.patient_id, total = invoice.total_amount, "invoice issued");
        Ok(invoice)
    }

    /// All invoices for billing roles, the caller's own otherwise.
    pub async fn my_invoices(
        &self,
        actor: &Actor,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<Invoice>, Error> {
        let patient = (!actor.role.handles_billing()).then_some(actor.user_id);
        Ok(self.invoices.list(patient, status).await?)
    }

    /// One invoice.
    pub async fn get_invoice(&self, actor: &Actor, id: Uuid) -> Result<Invoice, Error> {
        self.load_for(actor, id).await
    }

    /// Apply a payment to an open invoice.
    pub async fn record_payment(
        &self,
        actor: &Actor,
        id: Uuid,
        request: NewPayment,
    ) -> Result<PaymentReceipt, Error> {
        let invoice = self.load_for(actor, id).await?;
        let now = self.clock.utc();
        let settlement = invoice.settle(request.amount, now)?;
        let payment = Payment {
            id: Uuid::new_v4(),
            invoice_id: id,
            amount: request.amount,
            payment_method: request.payment_method,
            payment_date: now,
            transaction_id: request.transaction_id,
            notes: request.notes,
            processed_by: actor.user_id,
            created_at: now,
        };
        if !self.invoices.apply_payment(id, &settlement, &payment).await? {
            return Err(Error::conflict(
                "invoice changed while the payment was processed; retry",
            ));
        }
        info!(
            invoice_id = %id,
            payment_id = %payment.id,
            amount = payment.amount,
            status = %settlement.status,
            "payment recorded"
        );
        Ok(PaymentReceipt {
            payment,
            settlement,
        })
    }

    /// Payments against an invoice, oldest first.
    pub async fn list_payments(&self, actor: &Actor, id: Uuid) -> Result<Vec<Payment>, Error> {
        self.load_for(actor, id).await?;
        Ok(self.invoices.list_payments(id).await?)
    }

    /// Cancel an unpaid invoice. Admin and staff only.
    pub async fn cancel_invoice(&self, actor: &Actor, id: Uuid) -> Result<Invoice, Error> {
        require_billing(actor)?;
        let mut invoice = self.load_for(actor, id).await?;
        match invoice.status {
            InvoiceStatus::Paid => {
                return Err(Error::invalid_request("cannot cancel a paid invoice"));
            }
            InvoiceStatus::Cancelled => {
                return Err(Error::invalid_request("invoice is already cancelled"));
            }
            _ => {}
        }
        let now = self.clock.utc();
        if !self.invoices.cancel(id, now).await? {
            return Err(Error::conflict(
                "invoice was settled or cancelled concurrently; reload it",
            ));
        }
        invoice.status = InvoiceStatus::Cancelled;
        invoice.updated_at = now;
        info!(invoice_id = %id, "invoice cancelled");
        Ok(invoice)
    }
}

#[cfg(test)]
#[path = "billing_service_tests.rs"]
mod tests;
