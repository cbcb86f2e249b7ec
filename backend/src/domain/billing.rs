//! Invoices and payments.
//!
//! Amounts are integer minor units (cents). All arithmetic is checked so an
//! overflow surfaces as a validation failure rather than a wrapped total.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

/// Minimum line description length.
pub const ITEM_DESCRIPTION_MIN: usize = 5;
/// Maximum line description length.
pub const ITEM_DESCRIPTION_MAX: usize = 255;
/// Maximum service code length.
pub const SERVICE_CODE_MAX: usize = 50;

/// Lifecycle of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Not yet issued.
    Draft,
    /// Issued, nothing paid.
    Pending,
    /// Settled in full.
    Paid,
    /// Some payments received.
    PartiallyPaid,
    /// Past due date with a balance.
    Overdue,
    /// Withdrawn.
    Cancelled,
}

impl InvoiceStatus {
    /// Stable storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::PartiallyPaid => "partially_paid",
            Self::Overdue => "overdue",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether payments can still be recorded.
    pub const fn accepts_payments(self) -> bool {
        !matches!(self, Self::Paid | Self::Cancelled)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown enum string read from storage or a query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownBillingValue {
    /// Enum being parsed.
    pub kind: &'static str,
    /// Offending value.
    pub value: String,
}

impl FromStr for InvoiceStatus {
    type Err = UnknownBillingValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "partially_paid" => Ok(Self::PartiallyPaid),
            "overdue" => Ok(Self::Overdue),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownBillingValue {
                kind: "invoice status",
                value: other.to_owned(),
            }),
        }
    }
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash at the desk.
    Cash,
    /// Credit card.
    CreditCard,
    /// Debit card.
    DebitCard,
    /// Insurance claim.
    Insurance,
    /// Bank transfer.
    BankTransfer,
    /// Online checkout.
    Online,
}

impl PaymentMethod {
    /// Stable storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::CreditCard => "credit_card",
            Self::DebitCard => "debit_card",
            Self::Insurance => "insurance",
            Self::BankTransfer => "bank_transfer",
            Self::Online => "online",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownBillingValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "cash" => Ok(Self::Cash),
            "credit_card" => Ok(Self::CreditCard),
            "debit_card" => Ok(Self::DebitCard),
            "insurance" => Ok(Self::Insurance),
            "bank_transfer" => Ok(Self::BankTransfer),
            "online" => Ok(Self::Online),
            other => Err(UnknownBillingValue {
                kind: "payment method",
                value: other.to_owned(),
            }),
        }
    }
}

/// Billable line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceItem {
    /// Identifier.
    pub id: Uuid,
    /// Owning invoice.
    pub invoice_id: Uuid,
    /// Line description.
    pub description: String,
    /// Units billed.
    pub quantity: u32,
    /// Price per unit in cents.
    pub unit_price: i64,
    /// `quantity * unit_price`.
    pub total_price: i64,
    /// Optional billing code.
    pub service_code: Option<String>,
}

/// Invoice issued to a patient.
///
/// ## Invariants
/// - `balance_due == total_amount - amount_paid` at all times.
/// - `amount_paid` never exceeds `total_amount`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    /// Identifier.
    pub id: Uuid,
    /// Human-readable number `INV-YYYYmmdd-XXXXXX`.
    pub invoice_number: String,
    /// Billed patient.
    pub patient_id: UserId,
    /// Originating appointment, if any.
    pub appointment_id: Option<Uuid>,
    /// Sum of line totals.
    pub subtotal: i64,
    /// Tax added.
    pub tax_amount: i64,
    /// Discount subtracted.
    pub discount_amount: i64,
    /// `subtotal + tax - discount`.
    pub total_amount: i64,
    /// Payments received.
    pub amount_paid: i64,
    /// Outstanding balance.
    pub balance_due: i64,
    /// Current status.
    pub status: InvoiceStatus,
    /// Issue timestamp.
    pub issue_date: DateTime<Utc>,
    /// Payment deadline.
    pub due_date: DateTime<Utc>,
    /// When the balance reached zero.
    pub paid_date: Option<DateTime<Utc>>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Line items.
    pub items: Vec<InvoiceItem>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Payment recorded against an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    /// Identifier.
    pub id: Uuid,
    /// Paid invoice.
    pub invoice_id: Uuid,
    /// Amount in cents.
    pub amount: i64,
    /// Method used.
    pub payment_method: PaymentMethod,
    /// Payment timestamp.
    pub payment_date: DateTime<Utc>,
    /// External transaction reference.
    pub transaction_id: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Recording user.
    pub processed_by: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Invoice totals derived from its lines and adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceTotals {
    /// Sum of line totals.
    pub subtotal: i64,
    /// Final amount owed.
    pub total: i64,
}

/// Reasons totals cannot be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TotalsError {
    /// Arithmetic overflowed `i64`.
    #[error("invoice amounts are too large")]
    Overflow,
    /// The discount exceeds subtotal plus tax.
    #[error("total amount must not be negative")]
    NegativeTotal,
}

/// Line total for `quantity` units at `unit_price`.
pub fn line_total(quantity: u32, unit_price: i64) -> Result<i64, TotalsError> {
    unit_price
        .checked_mul(i64::from(quantity))
        .ok_or(TotalsError::Overflow)
}

/// Compute subtotal and total.
///
/// # Examples
/// ```
/// use medisecure::domain::compute_totals;
///
/// let totals = compute_totals(&[(2, 1_500), (1, 4_000)], 700, 1_000).unwrap();
/// assert_eq!(totals.subtotal, 7_000);
/// assert_eq!(totals.total, 6_700);
/// ```
pub fn compute_totals(
    lines: &[(u32, i64)],
    tax_amount: i64,
    discount_amount: i64,
) -> Result<InvoiceTotals, TotalsError> {
    let subtotal = lines.iter().try_fold(0_i64, |acc, &(quantity, price)| {
        acc.checked_add(line_total(quantity, price)?)
            .ok_or(TotalsError::Overflow)
    })?;
    let total = subtotal
        .checked_add(tax_amount)
        .and_then(|value| value.checked_sub(discount_amount))
        .ok_or(TotalsError::Overflow)?;
    if total < 0 {
        return Err(TotalsError::NegativeTotal);
    }
    Ok(InvoiceTotals { subtotal, total })
}

/// Invoice state after a payment is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    /// Balance the invoice must still have for the update to apply.
    pub expected_balance: i64,
    /// New `amount_paid`.
    pub amount_paid: i64,
    /// New `balance_due`.
    pub balance_due: i64,
    /// New status.
    pub status: InvoiceStatus,
    /// Set when the balance reaches zero.
    pub paid_date: Option<DateTime<Utc>>,
}

/// Reasons a payment cannot be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PaymentRejection {
    /// The invoice is paid or cancelled.
    #[error("invoice is {0} and cannot accept payments")]
    Closed(InvoiceStatus),
    /// The amount is zero or negative.
    #[error("payment amount must be positive")]
    NonPositive,
    /// The amount exceeds the balance.
    #[error("payment exceeds balance due")]
    ExceedsBalance,
}

impl Invoice {
    /// Compute the settlement for a payment of `amount` at `now`.
    ///
    /// # Errors
    /// Returns a [`PaymentRejection`] when the payment is not acceptable.
    pub fn settle(&self, amount: i64, now: DateTime<Utc>) -> Result<Settlement, PaymentRejection> {
        if !self.status.accepts_payments() {
            return Err(PaymentRejection::Closed(self.status));
        }
        if amount <= 0 {
            return Err(PaymentRejection::NonPositive);
        }
        if amount > self.balance_due {
            return Err(PaymentRejection::ExceedsBalance);
        }
        let balance_due = self.balance_due - amount;
        let amount_paid = self.total_amount - balance_due;
        let (status, paid_date) = if balance_due == 0 {
            (InvoiceStatus::Paid, Some(now))
        } else {
            (InvoiceStatus::PartiallyPaid, None)
        };
        Ok(Settlement {
            expected_balance: self.balance_due,
            amount_paid,
            balance_due,
            status,
            paid_date,
        })
    }
}

/// Build an invoice number from the issue date and a 6-hex-digit suffix.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use medisecure::domain::invoice_number;
///
/// let issued = Utc.with_ymd_and_hms(2031, 5, 6, 7, 8, 9).unwrap();
/// assert_eq!(invoice_number(issued, 0x0a1b2c), "INV-20310506-0A1B2C");
/// ```
pub fn invoice_number(issued: DateTime<Utc>, suffix: u32) -> String {
    format!("INV-{}-{:06X}", issued.format("%Y%m%d"), suffix & 0x00ff_ffff)
}
