//! End-to-end HTTP journeys through the full middleware stack.
//!
//! The app is assembled the way the server does it (audit inside trace,
//! every `/api/v1` route) over in-memory adapters, and driven with cookies
//! the way a browser would.

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::{App, test as actix_test};
use medisecure::domain::{AuditAction, AuditStatus, Role, TRACE_ID_HEADER};
use medisecure::inbound::http::configure;
use medisecure::inbound::http::cookies::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use medisecure::test_support::http::{TEST_PASSWORD, TestHarness, bearer, send_json};
use medisecure::{Audit, Trace};
use rstest::{fixture, rstest};
use serde_json::{Value, json};

#[fixture]
fn harness() -> TestHarness {
    TestHarness::new()
}

fn cookie_value(response: &ServiceResponse, name: &str) -> Option<String> {
    response
        .response()
        .cookies()
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_owned())
}

#[rstest]
#[actix_web::test]
async fn a_new_patient_signs_up_logs_in_and_books(harness: TestHarness) {
    let (doctor, _) = harness
        .seed_with_token("house@example.com", Role::Doctor)
        .await;
    let app = actix_test::init_service(
        App::new()
            .app_data(harness.data())
            .wrap(Audit)
            .wrap(Trace)
            .configure(configure),
    )
    .await;

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/signup")
        .set_json(json!({
            "email": "grace@example.com",
            "password": TEST_PASSWORD,
            "fullName": "Grace Hopper",
        }))
        .to_request();
    let (status, _) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);

    let code = harness
        .mailer
        .last_code_for("grace@example.com")
        .expect("verification code mailed");
    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/verify-email")
        .set_json(json!({"email": "grace@example.com", "code": code}))
        .to_request();
    let (status, user) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["role"], "patient");

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({
            "email": "grace@example.com",
            "password": TEST_PASSWORD,
            "deviceFingerprint": "grace-laptop",
        }))
        .to_request();
    let response = actix_test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(TRACE_ID_HEADER));
    let access = cookie_value(&response, ACCESS_TOKEN_COOKIE).expect("access cookie");
    let refresh = cookie_value(&response, REFRESH_TOKEN_COOKIE).expect("refresh cookie");

    let request = actix_test::TestRequest::get()
        .uri("/api/v1/users/me")
        .cookie(Cookie::new(ACCESS_TOKEN_COOKIE, access.clone()))
        .to_request();
    let (status, me) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "grace@example.com");

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/appointments")
        .cookie(Cookie::new(ACCESS_TOKEN_COOKIE, access.clone()))
        .set_json(json!({
            "doctorId": doctor.id.to_string(),
            "appointmentDate": "2031-03-12T10:00:00Z",
            "reason": "Annual check-up",
        }))
        .to_request();
    let (status, appointment) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(appointment["status"], "scheduled");

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/logout")
        .cookie(Cookie::new(REFRESH_TOKEN_COOKIE, refresh.clone()))
        .to_request();
    let (status, _) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/refresh")
        .cookie(Cookie::new(REFRESH_TOKEN_COOKIE, refresh))
        .to_request();
    let (status, _) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let actions: Vec<(AuditAction, AuditStatus)> = harness
        .audit_logs
        .entries()
        .into_iter()
        .map(|entry| (entry.action, entry.status))
        .collect();
    assert_eq!(
        actions,
        vec![
            (AuditAction::Signup, AuditStatus::Success),
            (AuditAction::Verification, AuditStatus::Success),
            (AuditAction::Login, AuditStatus::Success),
            (AuditAction::Read, AuditStatus::Success),
            (AuditAction::Create, AuditStatus::Success),
            (AuditAction::Logout, AuditStatus::Success),
            (AuditAction::Create, AuditStatus::Failure),
        ]
    );
}

#[rstest]
#[actix_web::test]
async fn care_team_messages_and_bills_a_patient(harness: TestHarness) {
    let (patient, patient_token) = harness
        .seed_with_token("grace@example.com", Role::Patient)
        .await;
    let (_, doctor_token) = harness
        .seed_with_token("house@example.com", Role::Doctor)
        .await;
    let (_, admin_token) = harness
        .seed_with_token("admin@example.com", Role::Admin)
        .await;
    let app = actix_test::init_service(
        App::new()
            .app_data(harness.data())
            .wrap(Audit)
            .wrap(Trace)
            .configure(configure),
    )
    .await;

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/messages")
        .insert_header(bearer(&doctor_token))
        .set_json(json!({
            "recipientId": patient.id.to_string(),
            "subject": "Results",
            "content": "Your bloods came back normal.",
        }))
        .to_request();
    let (status, _) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);

    let request = actix_test::TestRequest::get()
        .uri("/api/v1/messages/inbox")
        .insert_header(bearer(&patient_token))
        .to_request();
    let (status, inbox) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inbox["unreadCount"], 1);
    assert_eq!(inbox["messages"][0]["content"], "Your bloods came back normal.");

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/billing/invoices")
        .insert_header(bearer(&admin_token))
        .set_json(json!({
            "patientId": patient.id.to_string(),
            "items": [{"description": "Blood panel", "quantity": 1, "unitPrice": 6000}],
            "dueDate": "2031-04-10T00:00:00Z",
        }))
        .to_request();
    let (status, invoice) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    let invoice_id = invoice["id"].as_str().expect("invoice id").to_owned();

    let request = actix_test::TestRequest::post()
        .uri(&format!("/api/v1/billing/invoices/{invoice_id}/payments"))
        .insert_header(bearer(&patient_token))
        .set_json(json!({"amount": 6000, "paymentMethod": "credit_card"}))
        .to_request();
    let (status, receipt) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["invoiceStatus"], "paid");
    assert_eq!(receipt["balanceDue"], 0);

    let request = actix_test::TestRequest::get()
        .uri(&format!("/api/v1/admin/audit-logs/user/{}", patient.id))
        .insert_header(bearer(&admin_token))
        .to_request();
    let (status, page) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let resources: Vec<&str> = page["items"]
        .as_array()
        .expect("items")
        .iter()
        .filter_map(|entry: &Value| entry["resource"].as_str())
        .collect();
    assert!(resources.contains(&"messages"));
    assert!(resources.contains(&"billing"));
}
