//! Tests for the self-service account handlers.

use super::*;
use crate::domain::{DeviceContext, LoginCredentials, LoginOutcome};
use crate::inbound::http::configure;
use crate::test_support::http::{TEST_PASSWORD, TestHarness, bearer, send_json};
use actix_web::http::StatusCode;
use actix_web::{App, test as actix_test};
use rstest::rstest;
use serde_json::json;

#[rstest]
#[actix_web::test]
async fn get_me_returns_the_caller() {
    let harness = TestHarness::new();
    let (user, token) = harness
        .seed_with_token("ada@example.com", Role::Patient)
        .await;
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;

    let (status, body) = send_json(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/users/me")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user.id.to_string());
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["role"], "patient");
    assert_eq!(body["isVerified"], true);
}

#[rstest]
#[actix_web::test]
async fn changing_email_requires_reverification() {
    let harness = TestHarness::new();
    let (_, token) = harness
        .seed_with_token("ada@example.com", Role::Patient)
        .await;
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;

    let (status, body) = send_json(
        &app,
        actix_test::TestRequest::put()
            .uri("/api/v1/users/me")
            .insert_header(bearer(&token))
            .set_json(json!({"email": "Ada.King@Example.com", "fullName": "Ada King"}))
            .to_request(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "ada.king@example.com");
    assert_eq!(body["fullName"], "Ada King");
    assert_eq!(body["isVerified"], false);
}

#[rstest]
#[case::taken("grace@example.com", StatusCode::CONFLICT)]
#[case::malformed("not-an-email", StatusCode::BAD_REQUEST)]
#[actix_web::test]
async fn email_changes_are_validated(#[case] email: &str, #[case] expected: StatusCode) {
    let harness = TestHarness::new();
    let (_, token) = harness
        .seed_with_token("ada@example.com", Role::Patient)
        .await;
    harness
        .seed_user("grace@example.com", "Grace Hopper", Role::Doctor)
        .await;
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;

    let (status, body) = send_json(
        &app,
        actix_test::TestRequest::put()
            .uri("/api/v1/users/me")
            .insert_header(bearer(&token))
            .set_json(json!({"email": email}))
            .to_request(),
    )
    .await;

    assert_eq!(status, expected);
    if expected == StatusCode::BAD_REQUEST {
        assert_eq!(body["details"]["field"], "email");
    }
}

#[rstest]
#[actix_web::test]
async fn deleted_accounts_lose_access() {
    let harness = TestHarness::new();
    let (_, token) = harness
        .seed_with_token("ada@example.com", Role::Patient)
        .await;
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::delete()
            .uri("/api/v1/users/me")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .response()
            .cookies()
            .any(|c| c.name() == "access_token" && c.value().is_empty())
    );

    let (status, _) = send_json(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/users/me")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[rstest]
#[actix_web::test]
async fn devices_are_listed_masked_and_removable() {
    let harness = TestHarness::new();
    let (_, token) = harness
        .seed_with_token("ada@example.com", Role::Patient)
        .await;
    let credentials =
        LoginCredentials::try_from_parts("ada@example.com", TEST_PASSWORD).expect("valid creds");
    let context = DeviceContext {
        fingerprint: Some("0123456789abcdef-laptop".into()),
        device_name: Some("Laptop".into()),
        ..DeviceContext::default()
    };
    let outcome = harness
        .state
        .auth
        .login(&credentials, &context)
        .await
        .expect("first device is trusted");
    assert!(matches!(outcome, LoginOutcome::Authenticated { .. }));
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;

    let (status, body) = send_json(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/users/me/devices")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let devices = body.as_array().expect("array");
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0]["deviceFingerprint"], "0123456789abcdef...");
    assert_eq!(devices[0]["deviceName"], "Laptop");
    let device_id = devices[0]["id"].as_str().expect("id").to_owned();

    let (status, _) = send_json(
        &app,
        actix_test::TestRequest::delete()
            .uri(&format!("/api/v1/users/me/devices/{}", Uuid::new_v4()))
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(
        &app,
        actix_test::TestRequest::delete()
            .uri(&format!("/api/v1/users/me/devices/{device_id}"))
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[rstest]
#[actix_web::test]
async fn malformed_device_ids_are_rejected() {
    let harness = TestHarness::new();
    let (_, token) = harness
        .seed_with_token("ada@example.com", Role::Patient)
        .await;
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;

    let (status, body) = send_json(
        &app,
        actix_test::TestRequest::delete()
            .uri("/api/v1/users/me/devices/laptop")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["code"], "invalid_uuid");
}

#[rstest]
#[case::wrong_current("Wrong-Horse-42", "Brand-New-Pass-9", StatusCode::UNAUTHORIZED)]
#[case::reuse(TEST_PASSWORD, TEST_PASSWORD, StatusCode::BAD_REQUEST)]
#[case::weak(TEST_PASSWORD, "short", StatusCode::BAD_REQUEST)]
#[case::accepted(TEST_PASSWORD, "Brand-New-Pass-9", StatusCode::OK)]
#[actix_web::test]
async fn change_password_outcomes(
    #[case] current: &str,
    #[case] new: &str,
    #[case] expected: StatusCode,
) {
    let harness = TestHarness::new();
    let (_, token) = harness
        .seed_with_token("ada@example.com", Role::Patient)
        .await;
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;

    let (status, _) = send_json(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/v1/users/me/change-password")
            .insert_header(bearer(&token))
            .set_json(ChangePasswordRequest {
                current_password: current.into(),
                new_password: new.into(),
            })
            .to_request(),
    )
    .await;

    assert_eq!(status, expected);
}

#[rstest]
#[actix_web::test]
async fn profile_is_created_then_merged() {
    let harness = TestHarness::new();
    let (user, token) = harness
        .seed_with_token("ada@example.com", Role::Patient)
        .await;
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;

    let (status, _) = send_json(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/users/me/profile")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send_json(
        &app,
        actix_test::TestRequest::put()
            .uri("/api/v1/users/me/profile")
            .insert_header(bearer(&token))
            .set_json(json!({"firstName": "Ada", "insuranceNumber": "INS-1", "bloodType": "O+"}))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userId"], user.id.to_string());
    assert_eq!(body["firstName"], "Ada");

    let (_, body) = send_json(
        &app,
        actix_test::TestRequest::put()
            .uri("/api/v1/users/me/profile")
            .insert_header(bearer(&token))
            .set_json(json!({"phone": "+44 20 7946 0000"}))
            .to_request(),
    )
    .await;
    assert_eq!(body["firstName"], "Ada");
    assert_eq!(body["insuranceNumber"], "INS-1");
    assert_eq!(body["phone"], "+44 20 7946 0000");

    let (status, body) = send_json(
        &app,
        actix_test::TestRequest::get()
            .uri("/api/v1/users/me/profile")
            .insert_header(bearer(&token))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bloodType"], "O+");
}

#[rstest]
#[actix_web::test]
async fn oversized_blood_type_is_rejected() {
    let harness = TestHarness::new();
    let (_, token) = harness
        .seed_with_token("ada@example.com", Role::Patient)
        .await;
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;

    let (status, _) = send_json(
        &app,
        actix_test::TestRequest::put()
            .uri("/api/v1/users/me/profile")
            .insert_header(bearer(&token))
            .set_json(json!({"bloodType": "definitely-too-long"}))
            .to_request(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[rstest]
#[actix_web::test]
async fn anonymous_callers_are_rejected() {
    let harness = TestHarness::new();
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;

    let request = actix_test::TestRequest::get()
        .uri("/api/v1/users/me")
        .to_request();
    let (status, body) = send_json(&app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}
