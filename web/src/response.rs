//! Outcome of one adapter action.

use crate::error::AppError;
use crate::render::StepRenderer;
use axum::{
    response::{IntoResponse, Redirect, Response},
    Json,
};
use http::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};
use waypoint_core::FlowSession;

/// A step page to render.
///
/// `locals` are safe to hand to the client. The flow session holds working
/// data captured by earlier steps and is only available to server-side
/// renderers; it is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    /// Step being rendered
    pub step: String,
    /// Template name, `{view_namespace}/{step}`
    pub template: String,
    /// Template locals
    pub locals: Map<String, Value>,
    /// Flow state at render time
    #[serde(skip)]
    pub flow_session: FlowSession,
}

impl StepView {
    /// Error message carried in the locals, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.locals.get("error_message").and_then(Value::as_str)
    }
}

/// What the adapter decided to answer with.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowResponse {
    /// Send the browser elsewhere.
    Redirect {
        /// Target URL
        location: String,
    },
    /// Render a step page.
    Render(StepView),
    /// Answer with a JSON body recorded by a step.
    Json {
        /// HTTP status code
        status: u16,
        /// Response body
        body: Value,
    },
}

impl FlowResponse {
    /// Redirect to `location`.
    #[must_use]
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect {
            location: location.into(),
        }
    }

    /// Redirect target, if this is a redirect.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Redirect { location } => Some(location),
            Self::Render(_) | Self::Json { .. } => None,
        }
    }

    /// Rendered view, if this is a render.
    #[must_use]
    pub const fn view(&self) -> Option<&StepView> {
        match self {
            Self::Render(view) => Some(view),
            Self::Redirect { .. } | Self::Json { .. } => None,
        }
    }

    /// Convert into an HTTP response.
    ///
    /// Redirects use `303 See Other` so a POST is followed by a GET.
    ///
    /// # Errors
    ///
    /// Returns error if the renderer fails or a step recorded an invalid
    /// status code.
    pub fn into_http(self, renderer: &dyn StepRenderer) -> Result<Response, AppError> {
        match self {
            Self::Redirect { location } => Ok(Redirect::to(&location).into_response()),
            Self::Render(view) => renderer.render(&view),
            Self::Json { status, body } => {
                let status = StatusCode::from_u16(status)
                    .map_err(|e| AppError::internal("Invalid status code").with_source(e.into()))?;
                Ok((status, Json(body)).into_response())
            }
        }
    }
}
