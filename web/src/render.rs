//! View rendering seam.
//!
//! The adapter decides *what* to render; a [`StepRenderer`] decides how.
//! Applications plug their template engine in here.

use crate::error::AppError;
use crate::response::StepView;
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Turns a [`StepView`] into an HTTP response.
pub trait StepRenderer: Send + Sync {
    /// Render `view`.
    ///
    /// # Errors
    ///
    /// Returns error if the template cannot be rendered.
    fn render(&self, view: &StepView) -> Result<Response, AppError>;
}

/// Renders the view as a JSON document `{ step, template, locals }`.
///
/// Useful for API clients and single-page front ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStepRenderer;

impl StepRenderer for JsonStepRenderer {
    fn render(&self, view: &StepView) -> Result<Response, AppError> {
        Ok(Json(json!({
            "step": view.step,
            "template": view.template,
            "locals": view.locals,
        }))
        .into_response())
    }
}
