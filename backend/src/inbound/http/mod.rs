//! HTTP inbound adapter exposing REST endpoints.
//!
//! Every versioned route is registered through [`configure`] so the server
//! and handler tests mount exactly the same surface.

pub mod admin;
pub mod appointments;
pub mod auth;
pub mod billing;
pub mod cookies;
pub mod error;
pub mod health;
pub mod messages;
pub mod page;
pub mod prescriptions;
pub mod schemas;
pub mod security_config;
pub mod session;
pub mod state;
pub mod users;
pub mod validation;

pub use error::ApiResult;

use actix_web::web;

use self::error::{json_error_handler, path_error_handler, query_error_handler};

/// Mount the `/api/v1` scope and the extractor error handlers.
///
/// Literal segments such as `/appointments/my` are registered ahead of the
/// `{id}` routes they would otherwise be captured by.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .app_data(web::PathConfig::default().error_handler(path_error_handler))
        .service(
            web::scope("/api/v1")
                .service(auth::signup)
                .service(auth::verify_email)
                .service(auth::resend_verification)
                .service(auth::login)
                .service(auth::verify_device)
                .service(auth::me)
                .service(auth::refresh)
                .service(auth::logout)
                .service(auth::forgot_password)
                .service(auth::reset_password)
                .service(users::get_me)
                .service(users::update_me)
                .service(users::delete_me)
                .service(users::list_devices)
                .service(users::remove_device)
                .service(users::change_password)
                .service(users::get_profile)
                .service(users::upsert_profile)
                .service(admin::list_users)
                .service(admin::get_user)
                .service(admin::update_role)
                .service(admin::delete_user)
                .service(admin::list_audit_logs)
                .service(admin::user_audit_logs)
                .service(admin::stats)
                .service(appointments::create_appointment)
                .service(appointments::my_appointments)
                .service(appointments::doctor_schedule)
                .service(appointments::get_appointment)
                .service(appointments::update_appointment)
                .service(appointments::cancel_appointment)
                .service(prescriptions::create_prescription)
                .service(prescriptions::my_prescriptions)
                .service(prescriptions::get_prescription)
                .service(prescriptions::cancel_prescription)
                .service(prescriptions::request_refill)
                .service(messages::send_message)
                .service(messages::inbox)
                .service(messages::sent_messages)
                .service(messages::get_message)
                .service(messages::mark_read)
                .service(messages::delete_message)
                .service(billing::create_invoice)
                .service(billing::my_invoices)
                .service(billing::get_invoice)
                .service(billing::record_payment)
                .service(billing::list_payments)
                .service(billing::cancel_invoice),
        );
}
