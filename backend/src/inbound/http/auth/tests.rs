//! Tests for the authentication handlers.

use super::*;
use crate::domain::ports::UserRepository;
use crate::inbound::http::configure;
use crate::inbound::http::cookies::{ACCESS_TOKEN_COOKIE, REFRESH_COOKIE_PATH};
use crate::test_support::http::{TEST_PASSWORD, TestHarness, bearer, send_json};
use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::{App, test as actix_test};
use rstest::rstest;
use serde_json::{Value, json};

fn cookie_named(response: &ServiceResponse, name: &str) -> Option<Cookie<'static>> {
    response
        .response()
        .cookies()
        .find(|cookie| cookie.name() == name)
        .map(Cookie::into_owned)
}

fn login_body(fingerprint: &str) -> Value {
    json!({
        "email": "ada@example.com",
        "password": TEST_PASSWORD,
        "deviceFingerprint": fingerprint,
        "deviceName": "Laptop",
    })
}

#[rstest]
#[actix_web::test]
async fn signup_then_verify_creates_a_verified_account() {
    let harness = TestHarness::new();
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/signup")
        .set_json(json!({
            "email": "Ada@Example.com",
            "password": "Analytical-Engine-1",
            "fullName": "Ada Lovelace",
            "role": "doctor",
        }))
        .to_request();
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "ada@example.com");

    let code = harness
        .mailer
        .last_code_for("ada@example.com")
        .expect("verification code mailed");
    let wrong = if code == "000000" { "111111" } else { "000000" };
    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/verify-email")
        .set_json(json!({"email": "ada@example.com", "code": wrong}))
        .to_request();
    let (status, _) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/verify-email")
        .set_json(json!({"email": "ada@example.com", "code": code}))
        .to_request();
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "doctor");
    assert_eq!(body["isVerified"], true);
    assert_eq!(body["isActive"], true);
}

#[rstest]
#[case::bad_role(json!({"email": "ada@example.com", "password": "Analytical-Engine-1", "fullName": "Ada", "role": "wizard"}), "role")]
#[case::bad_email(json!({"email": "nope", "password": "Analytical-Engine-1", "fullName": "Ada"}), "email")]
#[case::short_password(json!({"email": "ada@example.com", "password": "short", "fullName": "Ada"}), "password")]
#[case::blank_name(json!({"email": "ada@example.com", "password": "Analytical-Engine-1", "fullName": "  "}), "fullName")]
#[actix_web::test]
async fn signup_validation_names_the_field(#[case] payload: Value, #[case] field: &str) {
    let harness = TestHarness::new();
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/signup")
        .set_json(payload)
        .to_request();
    let (status, body) = send_json(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");
    assert_eq!(body["details"]["field"], field);
    assert!(harness.mailer.sent().is_empty());
}

#[rstest]
#[actix_web::test]
async fn signup_rejects_registered_and_pending_emails() {
    let harness = TestHarness::new();
    harness
        .seed_user("grace@example.com", "Grace Hopper", Role::Doctor)
        .await;
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;
    let signup_request = |email: &str| {
        actix_test::TestRequest::post()
            .uri("/api/v1/auth/signup")
            .set_json(json!({"email": email, "password": "Analytical-Engine-1", "fullName": "Someone"}))
            .to_request()
    };

    let (status, _) = send_json(&app, signup_request("grace@example.com")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(&app, signup_request("ada@example.com")).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send_json(&app, signup_request("ada@example.com")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["message"]
            .as_str()
            .is_some_and(|message| message.contains("pending"))
    );
}

#[rstest]
#[actix_web::test]
async fn resend_requires_a_pending_registration() {
    let harness = TestHarness::new();
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/resend-verification")
        .set_json(json!({"email": "ada@example.com"}))
        .to_request();
    let (status, _) = send_json(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[rstest]
#[actix_web::test]
async fn first_login_sets_both_cookies() {
    let harness = TestHarness::new();
    harness
        .seed_user("ada@example.com", "Ada Lovelace", Role::Patient)
        .await;
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(login_body("laptop-fingerprint"))
        .to_request();
    let response = actix_test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let access = cookie_named(&response, ACCESS_TOKEN_COOKIE).expect("access cookie");
    assert_eq!(access.http_only(), Some(true));
    assert_eq!(access.same_site(), Some(SameSite::Lax));
    assert_eq!(access.path(), Some("/"));
    let refresh_cookie = cookie_named(&response, REFRESH_TOKEN_COOKIE).expect("refresh cookie");
    assert_eq!(refresh_cookie.same_site(), Some(SameSite::Strict));
    assert_eq!(refresh_cookie.path(), Some(REFRESH_COOKIE_PATH));

    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body["requiresVerification"], false);
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert!(body["user"]["lastLogin"].is_string());
}

#[rstest]
#[actix_web::test]
async fn unknown_devices_must_be_verified() {
    let harness = TestHarness::new();
    harness
        .seed_user("ada@example.com", "Ada Lovelace", Role::Patient)
        .await;
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;
    let login_request = |fingerprint: &str| {
        actix_test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(login_body(fingerprint))
            .to_request()
    };
    let (status, _) = send_json(&app, login_request("laptop-fingerprint")).await;
    assert_eq!(status, StatusCode::OK);

    let response = actix_test::call_service(&app, login_request("phone-fingerprint")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(cookie_named(&response, ACCESS_TOKEN_COOKIE).is_none());
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body["requiresVerification"], true);
    let device_id = body["deviceId"].as_str().expect("device id").to_owned();
    let code = harness
        .mailer
        .last_code_for("ada@example.com")
        .expect("device code mailed");

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/verify-device")
        .set_json(json!({"email": "ada@example.com", "deviceId": device_id, "code": code}))
        .to_request();
    let response = actix_test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(cookie_named(&response, ACCESS_TOKEN_COOKIE).is_some());

    let (status, body) = send_json(&app, login_request("phone-fingerprint")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requiresVerification"], false);
}

#[rstest]
#[case::wrong_password(json!({"email": "ada@example.com", "password": "Wrong-Horse-42"}), StatusCode::UNAUTHORIZED)]
#[case::unknown_email(json!({"email": "nobody@example.com", "password": TEST_PASSWORD}), StatusCode::UNAUTHORIZED)]
#[case::empty_password(json!({"email": "ada@example.com", "password": ""}), StatusCode::BAD_REQUEST)]
#[actix_web::test]
async fn login_failures(#[case] payload: Value, #[case] expected: StatusCode) {
    let harness = TestHarness::new();
    harness
        .seed_user("ada@example.com", "Ada Lovelace", Role::Patient)
        .await;
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(payload)
        .to_request();
    let (status, body) = send_json(&app, request).await;

    assert_eq!(status, expected);
    if expected == StatusCode::UNAUTHORIZED {
        assert_eq!(body["message"], "invalid credentials");
    } else {
        assert_eq!(body["details"]["code"], "empty_password");
    }
}

#[rstest]
#[actix_web::test]
async fn refresh_renews_the_access_cookie_until_logout() {
    let harness = TestHarness::new();
    harness
        .seed_user("ada@example.com", "Ada Lovelace", Role::Patient)
        .await;
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;
    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(login_body("laptop-fingerprint"))
        .to_request();
    let response = actix_test::call_service(&app, request).await;
    let refresh_cookie = cookie_named(&response, REFRESH_TOKEN_COOKIE).expect("refresh cookie");
    let refresh_cookie = Cookie::new(REFRESH_TOKEN_COOKIE, refresh_cookie.value().to_owned());

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/refresh")
        .cookie(refresh_cookie.clone())
        .to_request();
    let response = actix_test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let access = cookie_named(&response, ACCESS_TOKEN_COOKIE).expect("new access cookie");
    assert!(!access.value().is_empty());

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/logout")
        .cookie(refresh_cookie.clone())
        .to_request();
    let response = actix_test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = cookie_named(&response, REFRESH_TOKEN_COOKIE).expect("refresh cleared");
    assert!(cleared.value().is_empty());

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/refresh")
        .cookie(refresh_cookie)
        .to_request();
    let (status, _) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[rstest]
#[actix_web::test]
async fn refresh_without_a_cookie_is_unauthorised() {
    let harness = TestHarness::new();
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/refresh")
        .to_request();
    let (status, body) = send_json(&app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "missing refresh token");
}

#[rstest]
#[actix_web::test]
async fn refresh_for_a_disabled_account_clears_cookies() {
    let harness = TestHarness::new();
    let mut user = harness
        .seed_user("ada@example.com", "Ada Lovelace", Role::Patient)
        .await;
    let refresh_cookie = harness
        .state
        .auth
        .refresh_tokens()
        .issue(&user.id)
        .await
        .expect("refresh token issued");
    user.is_active = false;
    harness.users.update(&user).await.expect("user updated");
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/refresh")
        .cookie(Cookie::new(REFRESH_TOKEN_COOKIE, refresh_cookie))
        .to_request();
    let response = actix_test::call_service(&app, request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cleared = cookie_named(&response, ACCESS_TOKEN_COOKIE).expect("access cleared");
    assert!(cleared.value().is_empty());
    assert!(cookie_named(&response, REFRESH_TOKEN_COOKIE).is_some());
}

#[rstest]
#[actix_web::test]
async fn me_returns_the_signed_in_user() {
    let harness = TestHarness::new();
    let (user, token) = harness
        .seed_with_token("ada@example.com", Role::Staff)
        .await;
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;

    let request = actix_test::TestRequest::get()
        .uri("/api/v1/auth/me")
        .insert_header(bearer(&token))
        .to_request();
    let (status, body) = send_json(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user.id.to_string());
    assert_eq!(body["role"], "staff");
}

#[rstest]
#[actix_web::test]
async fn forgot_password_does_not_reveal_accounts() {
    let harness = TestHarness::new();
    harness
        .seed_user("ada@example.com", "Ada Lovelace", Role::Patient)
        .await;
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;
    let forgot = |email: &str| {
        actix_test::TestRequest::post()
            .uri("/api/v1/auth/forgot-password")
            .set_json(json!({"email": email}))
            .to_request()
    };

    let (unknown_status, unknown_body) = send_json(&app, forgot("nobody@example.com")).await;
    assert!(harness.mailer.sent().is_empty());
    let (known_status, known_body) = send_json(&app, forgot("ada@example.com")).await;

    assert_eq!(unknown_status, StatusCode::OK);
    assert_eq!(known_status, StatusCode::OK);
    assert_eq!(unknown_body, known_body);
    assert_eq!(harness.mailer.sent().len(), 1);
}

#[rstest]
#[actix_web::test]
async fn reset_password_replaces_the_credential() {
    let harness = TestHarness::new();
    harness
        .seed_user("ada@example.com", "Ada Lovelace", Role::Patient)
        .await;
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;
    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/forgot-password")
        .set_json(json!({"email": "ada@example.com"}))
        .to_request();
    send_json(&app, request).await;
    let code = harness
        .mailer
        .last_code_for("ada@example.com")
        .expect("reset code mailed");

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/reset-password")
        .set_json(json!({"email": "ada@example.com", "code": code, "newPassword": "Difference-Engine-2"}))
        .to_request();
    let (status, _) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({"email": "ada@example.com", "password": "Difference-Engine-2"}))
        .to_request();
    let (status, _) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[rstest]
#[actix_web::test]
async fn reset_password_rejects_bad_codes() {
    let harness = TestHarness::new();
    harness
        .seed_user("ada@example.com", "Ada Lovelace", Role::Patient)
        .await;
    let app = actix_test::init_service(App::new().app_data(harness.data()).configure(configure))
        .await;

    let request = actix_test::TestRequest::post()
        .uri("/api/v1/auth/reset-password")
        .set_json(json!({"email": "ada@example.com", "code": "123456", "newPassword": "Difference-Engine-2"}))
        .to_request();
    let (status, _) = send_json(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
