//! Tests for invoicing and payments.

use std::sync::Arc;

use chrono::TimeDelta;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ports::MockInvoiceRepository;
use crate::domain::{Email, ErrorCode, FullName, User, UserId};
use crate::outbound::memory::{InMemoryInvoiceRepository, InMemoryUserRepository};
use crate::test_support::{MutableClock, fixture_now};

struct Harness {
    service: BillingService,
    users: Arc<InMemoryUserRepository>,
    patient: Actor,
    staff: Actor,
}

async fn add(users: &InMemoryUserRepository, email: &str, role: Role) -> Actor {
    let user = User::register(
        Email::parse(email).expect("email"),
        FullName::new("Someone").expect("name"),
        role,
        fixture_now(),
    );
    users.insert(&user, "hash").await.expect("insert");
    Actor {
        user_id: user.id,
        role,
    }
}

fn item(quantity: u32, unit_price: i64) -> NewInvoiceItem {
    NewInvoiceItem {
        description: "General consultation".into(),
        quantity,
        unit_price,
        service_code: Some("GC-01".into()),
    }
}

fn invoice_for(patient: &Actor, items: Vec<NewInvoiceItem>, tax: i64, discount: i64) -> NewInvoice {
    NewInvoice {
        patient_id: patient.user_id,
        appointment_id: None,
        items,
        tax_amount: tax,
        discount_amount: discount,
        due_date: fixture_now() + TimeDelta::days(30),
        notes: None,
    }
}

fn payment(amount: i64) -> NewPayment {
    NewPayment {
        amount,
        payment_method: PaymentMethod::CreditCard,
        transaction_id: Some("txn-1".into()),
        notes: None,
    }
}

#[fixture]
async fn harness() -> Harness {
    let clock = Arc::new(MutableClock::new(fixture_now()));
    let users = Arc::new(InMemoryUserRepository::default());
    let patient = add(&users, "pat@example.com", Role::Patient).await;
    let staff = add(&users, "staff@example.com", Role::Staff).await;
    Harness {
        service: BillingService::new(
            Arc::new(InMemoryInvoiceRepository::default()),
            users.clone(),
            clock,
        ),
        users,
        patient,
        staff,
    }
}

impl Harness {
    async fn issue(&self, items: Vec<NewInvoiceItem>, tax: i64, discount: i64) -> Invoice {
        self.service
            .create_invoice(&self.staff, invoice_for(&self.patient, items, tax, discount))
            .await
            .expect("issued")
    }
}

#[rstest]
#[tokio::test]
async fn totals_include_tax_and_discount(#[future] harness: Harness) {
    let harness = harness.await;
    let invoice = harness
        .issue(vec![item(2, 5_000), item(1, 2_550)], 1_000, 500)
        .await;

    assert_eq!(invoice.subtotal, 12_550);
    assert_eq!(invoice.total_amount, 13_050);
    assert_eq!(invoice.balance_due, invoice.total_amount);
    assert_eq!(invoice.amount_paid, 0);
    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert_eq!(invoice.items[0].total_price, 10_000);
    assert!(invoice.invoice_number.starts_with("INV-20310310-"));
}

#[rstest]
#[tokio::test]
async fn patients_cannot_issue(#[future] harness: Harness) {
    let harness = harness.await;
    let err = harness
        .service
        .create_invoice(
            &harness.patient,
            invoice_for(&harness.patient, vec![item(1, 100)], 0, 0),
        )
        .await
        .expect_err("patient");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[rstest]
#[case(vec![], 0, 0)]
#[case(vec![item(0, 100)], 0, 0)]
#[case(vec![item(1, 0)], 0, 0)]
#[case(vec![NewInvoiceItem { description: "Lab".into(), ..item(1, 100) }], 0, 0)]
#[case(vec![item(1, 100)], 0, 101)]
#[case(vec![item(1, 100)], -1, 0)]
#[tokio::test]
async fn invalid_invoices_are_rejected(
    #[future] harness: Harness,
    #[case] items: Vec<NewInvoiceItem>,
    #[case] tax: i64,
    #[case] discount: i64,
) {
    let harness = harness.await;
    let err = harness
        .service
        .create_invoice(&harness.staff, invoice_for(&harness.patient, items, tax, discount))
        .await
        .expect_err("invalid");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn unknown_patients_are_not_found(#[future] harness: Harness) {
    let harness = harness.await;
    let ghost = Actor {
        user_id: UserId::random(),
        role: Role::Patient,
    };
    let err = harness
        .service
        .create_invoice(&harness.staff, invoice_for(&ghost, vec![item(1, 100)], 0, 0))
        .await
        .expect_err("ghost");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn partial_then_full_payment_settles(#[future] harness: Harness) {
    let harness = harness.await;
    let invoice = harness.issue(vec![item(1, 10_000)], 0, 0).await;

    let first = harness
        .service
        .record_payment(&harness.patient, invoice.id, payment(4_000))
        .await
        .expect("partial");
    assert_eq!(first.settlement.status, InvoiceStatus::PartiallyPaid);
    assert_eq!(first.settlement.balance_due, 6_000);

    let second = harness
        .service
        .record_payment(&harness.staff, invoice.id, payment(6_000))
        .await
        .expect("settle");
    assert_eq!(second.settlement.status, InvoiceStatus::Paid);
    assert_eq!(second.settlement.paid_date, Some(fixture_now()));

    let stored = harness
        .service
        .get_invoice(&harness.patient, invoice.id)
        .await
        .expect("invoice");
    assert_eq!(stored.amount_paid + stored.balance_due, stored.total_amount);
    assert_eq!(stored.balance_due, 0);
    let payments = harness
        .service
        .list_payments(&harness.patient, invoice.id)
        .await
        .expect("payments");
    assert_eq!(payments.len(), 2);

    let err = harness
        .service
        .record_payment(&harness.patient, invoice.id, payment(1))
        .await
        .expect_err("paid");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[case(0)]
#[case(-50)]
#[case(10_001)]
#[tokio::test]
async fn payments_must_fit_the_balance(#[future] harness: Harness, #[case] amount: i64) {
    let harness = harness.await;
    let invoice = harness.issue(vec![item(1, 10_000)], 0, 0).await;
    let err = harness
        .service
        .record_payment(&harness.patient, invoice.id, payment(amount))
        .await
        .expect_err("rejected");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn other_patients_cannot_see_or_pay(#[future] harness: Harness) {
    let harness = harness.await;
    let invoice = harness.issue(vec![item(1, 10_000)], 0, 0).await;
    let other = add(&harness.users, "other@example.com", Role::Patient).await;

    let err = harness
        .service
        .get_invoice(&other, invoice.id)
        .await
        .expect_err("other");
    assert_eq!(err.code(), ErrorCode::Forbidden);
    let err = harness
        .service
        .record_payment(&other, invoice.id, payment(100))
        .await
        .expect_err("other");
    assert_eq!(err.code(), ErrorCode::Forbidden);
    assert!(
        harness
            .service
            .my_invoices(&other, None)
            .await
            .expect("list")
            .is_empty()
    );
    assert_eq!(
        harness
            .service
            .my_invoices(&harness.staff, Some(InvoiceStatus::Pending))
            .await
            .expect("list")
            .len(),
        1
    );
}

#[rstest]
#[tokio::test]
async fn cancelled_invoices_refuse_payments(#[future] harness: Harness) {
    let harness = harness.await;
    let invoice = harness.issue(vec![item(1, 10_000)], 0, 0).await;
    let cancelled = harness
        .service
        .cancel_invoice(&harness.staff, invoice.id)
        .await
        .expect("cancelled");
    assert_eq!(cancelled.status, InvoiceStatus::Cancelled);

    let err = harness
        .service
        .record_payment(&harness.patient, invoice.id, payment(100))
        .await
        .expect_err("cancelled");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    let err = harness
        .service
        .cancel_invoice(&harness.patient, invoice.id)
        .await
        .expect_err("patient");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn paid_invoices_cannot_be_cancelled(#[future] harness: Harness) {
    let harness = harness.await;
    let invoice = harness.issue(vec![item(1, 500)], 0, 0).await;
    harness
        .service
        .record_payment(&harness.patient, invoice.id, payment(500))
        .await
        .expect("paid");
    let err = harness
        .service
        .cancel_invoice(&harness.staff, invoice.id)
        .await
        .expect_err("paid");
    assert_eq!(err.message(), "cannot cancel a paid invoice");
}

fn pending_invoice(patient_id: UserId) -> Invoice {
    Invoice {
        id: Uuid::new_v4(),
        invoice_number: invoice_number(fixture_now(), 1),
        patient_id,
        appointment_id: None,
        subtotal: 1_000,
        tax_amount: 0,
        discount_amount: 0,
        total_amount: 1_000,
        amount_paid: 0,
        balance_due: 1_000,
        status: InvoiceStatus::Pending,
        issue_date: fixture_now(),
        due_date: fixture_now(),
        paid_date: None,
        notes: None,
        items: Vec::new(),
        created_at: fixture_now(),
        updated_at: fixture_now(),
    }
}

fn mocked_service(invoices: MockInvoiceRepository) -> BillingService {
    BillingService::new(
        Arc::new(invoices),
        Arc::new(InMemoryUserRepository::default()),
        Arc::new(MutableClock::new(fixture_now())),
    )
}

#[tokio::test]
async fn lost_balance_races_conflict() {
    let patient_id = UserId::random();
    let invoice = pending_invoice(patient_id);
    let mut invoices = MockInvoiceRepository::new();
    invoices
        .expect_find_by_id()
        .times(1)
        .return_once(move |_| Ok(Some(invoice)));
    invoices
        .expect_apply_payment()
        .withf(|_, settlement, _| settlement.expected_balance == 1_000)
        .times(1)
        .return_once(|_, _, _| Ok(false));
    let service = mocked_service(invoices);
    let actor = Actor {
        user_id: patient_id,
        role: Role::Patient,
    };

    let err = service
        .record_payment(&actor, Uuid::new_v4(), payment(400))
        .await
        .expect_err("race lost");
    assert_eq!(err.code(), ErrorCode::Conflict);
}

#[tokio::test]
async fn cancelling_an_invoice_settled_meanwhile_conflicts() {
    let invoice = pending_invoice(UserId::random());
    let mut invoices = MockInvoiceRepository::new();
    invoices
        .expect_find_by_id()
        .times(1)
        .return_once(move |_| Ok(Some(invoice)));
    invoices
        .expect_cancel()
        .times(1)
        .return_once(|_, _| Ok(false));
    let service = mocked_service(invoices);
    let actor = Actor {
        user_id: UserId::random(),
        role: Role::Staff,
    };

    let err = service
        .cancel_invoice(&actor, Uuid::new_v4())
        .await
        .expect_err("race lost");
    assert_eq!(err.code(), ErrorCode::Conflict);
}
