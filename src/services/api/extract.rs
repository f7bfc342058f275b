//! Request metadata extraction
//!
//! Identity headers are set by the upstream auth proxy after it has
//! validated the session; they are trusted as-is here.

use crate::error::Error;
use crate::monitoring::{Actor, CaptureMeta};
use crate::utils::{CorrelationId, CorrelationSpanExt};
use axum::async_trait;
use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Span;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const ROUTE_HEADER: &str = "x-route";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// First hop of `x-forwarded-for`
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    header(headers, FORWARDED_FOR_HEADER)
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

pub fn capture_meta(headers: &HeaderMap) -> CaptureMeta {
    CaptureMeta {
        client_ip: client_ip(headers),
        route: header(headers, ROUTE_HEADER).map(str::to_string),
        request_id: header(headers, REQUEST_ID_HEADER).map(str::to_string),
        user_id: header(headers, ACTOR_ID_HEADER).map(str::to_string),
    }
}

/// Caller identity from the proxy headers
pub struct RequestActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for RequestActor
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(&parts.headers, ACTOR_ID_HEADER)
            .ok_or_else(|| Error::Forbidden("missing actor identity".to_string()))?;
        let is_admin = header(&parts.headers, ACTOR_ROLE_HEADER)
            .map(|role| role.eq_ignore_ascii_case("admin"))
            .unwrap_or(false);

        Ok(RequestActor(Actor {
            id: id.to_string(),
            is_admin,
        }))
    }
}

impl RequestActor {
    /// The actor, or `Forbidden` unless it holds the admin role
    pub fn require_admin(self) -> Result<Actor, Error> {
        if self.0.is_admin {
            Ok(self.0)
        } else {
            Err(Error::Forbidden(format!("{} is not an admin", self.0.id)))
        }
    }
}

/// Assign a correlation id to every request and echo it on the response
pub async fn assign_request_id(mut request: Request, next: Next) -> Response {
    let id = CorrelationId::from_header(header(request.headers(), REQUEST_ID_HEADER));
    let value = HeaderValue::from_str(id.as_str()).ok();
    if let Some(value) = &value {
        request
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value.clone());
    }
    request.extensions_mut().insert(id);

    let mut response = next.run(request).await;
    if let Some(value) = value {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

pub fn request_span(request: &Request) -> Span {
    let span = tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = tracing::field::Empty,
    );
    match request.extensions().get::<CorrelationId>() {
        Some(id) => span.with_correlation(id),
        None => span,
    }
}
