//! PostgreSQL-backed `InvoiceRepository` implementation using Diesel ORM.
//!
//! Payments update the invoice with a `balance_due = expected` guard and
//! insert the payment row in the same transaction; a zero-row update rolls
//! back and reports the lost race to the service.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ports::{InvoiceRepository, PersistenceError};
use crate::domain::{
    Invoice, InvoiceItem, InvoiceStatus, Payment, Settlement, UserId,
};

use super::diesel_helpers::{
    collect_rows, map_diesel_error, map_pool_error, parse_column, to_i32, to_u32,
};
use super::models::{InvoiceItemRow, InvoiceRow, PaymentRow, SettlementUpdate};
use super::pool::DbPool;
use super::schema::{invoice_items, invoices, payments};

/// Diesel-backed implementation of the `InvoiceRepository` port.
#[derive(Clone)]
pub struct DieselInvoiceRepository {
    pool: DbPool,
}

impl DieselInvoiceRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_item(row: InvoiceItemRow) -> Result<InvoiceItem, PersistenceError> {
    Ok(InvoiceItem {
        id: row.id,
        invoice_id: row.invoice_id,
        description: row.description,
        quantity: to_u32(row.quantity, "quantity")?,
        unit_price: row.unit_price,
        total_price: row.total_price,
        service_code: row.service_code,
    })
}

fn item_to_row(position: usize, item: &InvoiceItem) -> Result<InvoiceItemRow, PersistenceError> {
    Ok(InvoiceItemRow {
        id: item.id,
        invoice_id: item.invoice_id,
        position: i32::try_from(position)
            .map_err(|_| PersistenceError::query("too many invoice items"))?,
        description: item.description.clone(),
        quantity: to_i32(item.quantity, "quantity")?,
        unit_price: item.unit_price,
        total_price: item.total_price,
        service_code: item.service_code.clone(),
    })
}

fn assemble(row: InvoiceRow, items: Vec<InvoiceItemRow>) -> Result<Invoice, PersistenceError> {
    Ok(Invoice {
        id: row.id,
        invoice_number: row.invoice_number,
        patient_id: UserId::from_uuid(row.patient_id),
        appointment_id: row.appointment_id,
        subtotal: row.subtotal,
        tax_amount: row.tax_amount,
        discount_amount: row.discount_amount,
        total_amount: row.total_amount,
        amount_paid: row.amount_paid,
        balance_due: row.balance_due,
        status: parse_column(&row.status, "invoice status")?,
        issue_date: row.issue_date,
        due_date: row.due_date,
        paid_date: row.paid_date,
        notes: row.notes,
        items: collect_rows(items.into_iter().map(row_to_item))?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn invoice_to_row(invoice: &Invoice) -> InvoiceRow {
    InvoiceRow {
        id: invoice.id,
        invoice_number: invoice.invoice_number.clone(),
        patient_id: *invoice.patient_id.as_uuid(),
        appointment_id: invoice.appointment_id,
        subtotal: invoice.subtotal,
        tax_amount: invoice.tax_amount,
        discount_amount: invoice.discount_amount,
        total_amount: invoice.total_amount,
        amount_paid: invoice.amount_paid,
        balance_due: invoice.balance_due,
        status: invoice.status.as_str().to_owned(),
        issue_date: invoice.issue_date,
        due_date: invoice.due_date,
        paid_date: invoice.paid_date,
        notes: invoice.notes.clone(),
        created_at: invoice.created_at,
        updated_at: invoice.updated_at,
    }
}

fn row_to_payment(row: PaymentRow) -> Result<Payment, PersistenceError> {
    Ok(Payment {
        id: row.id,
        invoice_id: row.invoice_id,
        amount: row.amount,
        payment_method: parse_column(&row.payment_method, "payment method")?,
        payment_date: row.payment_date,
        transaction_id: row.transaction_id,
        notes: row.notes,
        processed_by: UserId::from_uuid(row.processed_by),
        created_at: row.created_at,
    })
}

fn payment_to_row(payment: &Payment) -> PaymentRow {
    PaymentRow {
        id: payment.id,
        invoice_id: payment.invoice_id,
        amount: payment.amount,
        payment_method: payment.payment_method.as_str().to_owned(),
        payment_date: payment.payment_date,
        transaction_id: payment.transaction_id.clone(),
        notes: payment.notes.clone(),
        processed_by: *payment.processed_by.as_uuid(),
        created_at: payment.created_at,
    }
}

async fn load_items(
    conn: &mut AsyncPgConnection,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<InvoiceItemRow>>, PersistenceError> {
    let rows: Vec<InvoiceItemRow> = invoice_items::table
        .filter(invoice_items::invoice_id.eq_any(ids))
        .select(InvoiceItemRow::as_select())
        .order_by((invoice_items::invoice_id, invoice_items::position))
        .load(conn)
        .await
        .map_err(map_diesel_error)?;
    let mut grouped: HashMap<Uuid, Vec<InvoiceItemRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.invoice_id).or_default().push(row);
    }
    Ok(grouped)
}

#[async_trait]
impl InvoiceRepository for DieselInvoiceRepository {
    async fn insert(&self, invoice: &Invoice) -> Result<(), PersistenceError> {
        let header = invoice_to_row(invoice);
        let lines = collect_rows(
            invoice
                .items
                .iter()
                .enumerate()
                .map(|(position, item)| item_to_row(position, item)),
        )?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                diesel::insert_into(invoices::table)
                    .values(&header)
                    .execute(conn)
                    .await?;
                diesel::insert_into(invoice_items::table)
                    .values(&lines)
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<InvoiceRow> = invoices::table
            .filter(invoices::id.eq(id))
            .select(InvoiceRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut items = load_items(&mut conn, &[id]).await?;
        assemble(row, items.remove(&id).unwrap_or_default()).map(Some)
    }

    async fn list(
        &self,
        patient: Option<UserId>,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<Invoice>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let mut query = invoices::table.into_boxed();
        if let Some(patient) = patient {
            query = query.filter(invoices::patient_id.eq(*patient.as_uuid()));
        }
        if let Some(status) = status {
            query = query.filter(invoices::status.eq(status.as_str()));
        }
        let rows: Vec<InvoiceRow> = query
            .select(InvoiceRow::as_select())
            .order_by(invoices::created_at.desc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut items = load_items(&mut conn, &ids).await?;
        collect_rows(rows.into_iter().map(|row| {
            let lines = items.remove(&row.id).unwrap_or_default();
            assemble(row, lines)
        }))
    }

    async fn apply_payment(
        &self,
        invoice_id: Uuid,
        settlement: &Settlement,
        payment: &Payment,
    ) -> Result<bool, PersistenceError> {
        let expected = settlement.expected_balance;
        let changes = SettlementUpdate {
            amount_paid: settlement.amount_paid,
            balance_due: settlement.balance_due,
            status: settlement.status.as_str(),
            paid_date: settlement.paid_date,
            updated_at: payment.created_at,
        };
        let payment_row = payment_to_row(payment);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                let updated = diesel::update(
                    invoices::table.filter(
                        invoices::id
                            .eq(invoice_id)
                            .and(invoices::balance_due.eq(expected))
                            .and(invoices::status.ne(InvoiceStatus::Paid.as_str()))
                            .and(invoices::status.ne(InvoiceStatus::Cancelled.as_str())),
                    ),
                )
                .set(&changes)
                .execute(conn)
                .await?;
                if updated == 0 {
                    return Ok(false);
                }
                diesel::insert_into(payments::table)
                    .values(&payment_row)
                    .execute(conn)
                    .await?;
                Ok(true)
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }

    async fn list_payments(&self, invoice_id: Uuid) -> Result<Vec<Payment>, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<PaymentRow> = payments::table
            .filter(payments::invoice_id.eq(invoice_id))
            .select(PaymentRow::as_select())
            .order_by(payments::payment_date.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        collect_rows(rows.into_iter().map(row_to_payment))
    }

    async fn cancel(
        &self,
        id: Uuid,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(
            invoices::table.filter(
                invoices::id
                    .eq(id)
                    .and(invoices::status.ne(InvoiceStatus::Paid.as_str()))
                    .and(invoices::status.ne(InvoiceStatus::Cancelled.as_str())),
            ),
        )
        .set((
            invoices::status.eq(InvoiceStatus::Cancelled.as_str()),
            invoices::updated_at.eq(updated_at),
        ))
        .execute(&mut conn)
        .await
        .map(|updated| updated > 0)
        .map_err(map_diesel_error)
    }
}
