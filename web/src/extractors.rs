//! Custom Axum extractors.
//!
//! - `FlowSessionId`: identifies the caller's session (cookie or header)
//! - `AnalyticsContext`: per-request analytics flags set by upstream middleware
//! - `FormParams`: submitted step parameters (form-encoded or JSON body)
//!
//! # Examples
//!
//! ```ignore
//! use waypoint_web::extractors::{AnalyticsContext, FlowSessionId};
//!
//! async fn handler(session_id: FlowSessionId, context: AnalyticsContext) -> String {
//!     tracing::info!(session_id = %session_id.0, irs_reproofing = context.irs_reproofing, "Processing request");
//!     session_id.0.to_string()
//! }
//! ```

use crate::error::AppError;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    Form, Json,
};
use serde_json::{Map, Value};
use waypoint_core::SessionId;

/// Cookie carrying the session identifier.
pub const SESSION_COOKIE: &str = "waypoint_session";

/// Header carrying the session identifier, for non-browser clients.
pub const SESSION_HEADER: &str = "X-Session-ID";

/// The caller's session identifier.
///
/// Read from the `waypoint_session` cookie, falling back to the
/// `X-Session-ID` header. Rejects with 401 when neither is present:
/// establishing the session is the job of the surrounding application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSessionId(pub SessionId);

#[async_trait]
impl<S> FromRequestParts<S> for FlowSessionId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_session_id(&parts.headers)
            .map(|id| Self(SessionId::new(id)))
            .ok_or_else(|| AppError::unauthorized("Missing session"))
    }
}

/// Find the session id in the cookie header, then in `X-Session-ID`.
fn extract_session_id(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|id| !id.is_empty());

    from_cookie
        .or_else(|| {
            headers
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|id| !id.is_empty())
        })
        .map(str::to_string)
}

/// Analytics flags attached to the request by upstream middleware.
///
/// Insert it as a request extension; absent means all flags off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyticsContext {
    /// Whether the user is re-proofing for the IRS
    pub irs_reproofing: bool,
}

#[async_trait]
impl<S> FromRequestParts<S> for AnalyticsContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().copied().unwrap_or_default())
    }
}

/// Parameters submitted with a step.
///
/// Accepts `application/json` objects and `application/x-www-form-urlencoded`
/// bodies; any other content type yields no parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormParams(pub Map<String, Value>);

#[async_trait]
impl<S> FromRequest<S> for FormParams
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.starts_with("application/json") {
            let Json(params) = Json::<Map<String, Value>>::from_request(req, state)
                .await
                .map_err(|e| AppError::bad_request(e.body_text()))?;
            return Ok(Self(params));
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| AppError::bad_request(e.body_text()))?;
            return Ok(Self(
                pairs
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect(),
            ));
        }

        Ok(Self::default())
    }
}
