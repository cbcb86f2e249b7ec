//! Audit middleware recording one event per versioned API request.
//!
//! Requests outside [`API_PREFIX`] (health probes, docs, the root banner)
//! pass through untouched. The acting user is resolved from the access
//! token the request carried. Failing to write the audit row is logged and
//! never changes the response.

use std::task::{Context, Poll};

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::USER_AGENT;
use actix_web::{Error, web};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::audit::API_PREFIX;
use crate::domain::{
    AuditAction, AuditLog, AuditResource, AuditStatus, UserId, truncate_user_agent,
};
use crate::inbound::http::session::access_token;
use crate::inbound::http::state::HttpState;

/// Request facts captured before the handler consumes the request.
struct PendingAudit {
    method: String,
    path: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    user_id: Option<UserId>,
}

impl PendingAudit {
    // The caller is resolved up front so requests that deactivate it are
    // still attributed.
    fn capture(req: &ServiceRequest, state: &HttpState) -> Self {
        let ip_address = req
            .connection_info()
            .realip_remote_addr()
            .map(str::to_owned);
        let user_id = access_token(req.request())
            .and_then(|token| state.auth.token_subject(&token));
        Self {
            method: req.method().as_str().to_owned(),
            path: req.path().to_owned(),
            ip_address,
            user_agent: req
                .headers()
                .get(USER_AGENT)
                .and_then(|value| value.to_str().ok())
                .map(truncate_user_agent),
            user_id,
        }
    }

    async fn record(self, state: &HttpState, status_code: u16) {
        let AuditResource {
            resource,
            resource_id,
        } = AuditResource::from_path(&self.path);
        let entry = AuditLog {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            action: AuditAction::classify(&self.method, &self.path),
            resource,
            resource_id,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            details: Some(json!({
                "method": self.method,
                "path": self.path,
                "statusCode": status_code,
            })),
            status: AuditStatus::from_status_code(status_code),
            created_at: state.clock.utc(),
        };
        match state.audit_logs.record(&entry).await {
            Ok(()) => debug!(action = %entry.action, status = entry.status.as_str(), "audit event recorded"),
            Err(error) => warn!(%error, action = %entry.action, "failed to record audit event"),
        }
    }
}

/// Audit middleware; needs [`HttpState`] registered as app data.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use medisecure::middleware::Audit;
///
/// let app = App::new().wrap(Audit);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Audit;

impl<S, B> Transform<S, ServiceRequest> for Audit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuditMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuditMiddleware { service }))
    }
}

/// Service wrapper produced by [`Audit`].
pub struct AuditMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuditMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let audited = req.path().starts_with(API_PREFIX);
        let state = req.app_data::<web::Data<HttpState>>().cloned();
        let pending = state
            .as_ref()
            .filter(|_| audited)
            .map(|state| PendingAudit::capture(&req, state));
        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            if let (Some(pending), Some(state)) = (pending, state) {
                pending.record(&state, res.status().as_u16()).await;
            }
            Ok(res)
        })
    }
}
