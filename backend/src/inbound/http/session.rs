//! Request authentication helpers.
//!
//! Handlers take an [`Authenticated`] argument to require a valid access
//! token. The token is read from the `access_token` cookie first, then from
//! an `Authorization: Bearer` header.

use actix_web::http::header::AUTHORIZATION;
use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use futures_util::future::LocalBoxFuture;

use crate::domain::{Actor, Error};

use super::cookies::ACCESS_TOKEN_COOKIE;
use super::state::HttpState;

/// Raw access token carried by the request, if any.
pub(crate) fn access_token(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(ACCESS_TOKEN_COOKIE) {
        let value = cookie.value();
        if !value.is_empty() {
            return Some(value.to_owned());
        }
    }
    bearer_token(req)
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let header = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_owned())
}

/// Authenticated caller resolved from the access token.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Actor);

impl Authenticated {
    /// The resolved principal.
    pub fn actor(&self) -> &Actor {
        &self.0
    }
}

impl FromRequest for Authenticated {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = access_token(req);
        let state = req.app_data::<web::Data<HttpState>>().cloned();
        Box::pin(async move {
            let state =
                state.ok_or_else(|| Error::internal("HTTP state is not registered"))?;
            let token = token.ok_or_else(|| Error::unauthorized("not authenticated"))?;
            state.auth.authenticate(&token).await.map(Authenticated)
        })
    }
}
