//! The step handler protocol.
//!
//! A [`StepHandler`] implements validation and business logic for one page
//! (or one page-less action) of a flow. Handlers are stateless values stored
//! in a [`FlowDefinition`]; per request they are bound to the running flow
//! through a [`StepContext`], which is what the handler reads and mutates.
//!
//! Execution always goes through [`base_call`]:
//!
//! ```text
//! form_submit() ──invalid──► error_message set, response returned, call() skipped
//!      │
//!    valid
//!      ▼
//!   call() ──► create_response(form_result, call_result)
//! ```

use crate::analytics::AnalyticsEvent;
use crate::error::{FlowError, Result};
use crate::flow::{FlowDefinition, JsonResponse, NextStep, Overrides};
use crate::form_response::FormResponse;
use crate::session::{FlowSession, HandlerType};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;

/// Request parameters submitted with a step.
pub type Params = Map<String, Value>;

/// Response type returned by an external proofing vendor.
///
/// Vendor responses are acceptable results of [`StepHandler::call`] and are
/// merged into the step's response like a [`FormResponse`].
pub trait VendorResponse: fmt::Debug + Send + Sync {
    /// Whether the vendor reported success.
    fn is_success(&self) -> bool;

    /// `(field, message)` pairs reported by the vendor.
    fn errors(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Extra analytics data reported by the vendor.
    fn extra(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Convert into a [`FormResponse`] for merging.
    fn to_form_response(&self) -> FormResponse {
        let mut response = FormResponse::new(self.is_success());
        for (field, message) in self.errors() {
            response.add_error(field, message);
        }
        for (key, value) in self.extra() {
            response = response.with_extra(key, value);
        }
        response
    }
}

/// What a step's business logic returned.
#[derive(Debug)]
pub enum CallResult {
    /// Nothing to report.
    Empty,
    /// A form-style response.
    Form(FormResponse),
    /// A vendor response.
    Vendor(Box<dyn VendorResponse>),
    /// Any other value; ignored by the merge.
    Other(Value),
}

impl CallResult {
    fn into_form_response(self) -> Option<FormResponse> {
        match self {
            Self::Form(response) => Some(response),
            Self::Vendor(response) => Some(response.to_form_response()),
            Self::Empty | Self::Other(_) => None,
        }
    }
}

impl From<FormResponse> for CallResult {
    fn from(response: FormResponse) -> Self {
        Self::Form(response)
    }
}

/// Whether `result` is a response type the merge understands.
#[must_use]
pub const fn acceptable_response_object(result: &CallResult) -> bool {
    matches!(result, CallResult::Form(_) | CallResult::Vendor(_))
}

/// Merge the business-logic result into the validation result.
///
/// Unacceptable results leave `form_result` untouched.
#[must_use]
pub fn create_response(form_result: FormResponse, call_result: CallResult) -> FormResponse {
    match call_result.into_form_response() {
        Some(response) => form_result.merge(response),
        None => form_result,
    }
}

/// Validation and business logic for one step.
///
/// `handler_type` is the identity completion is recorded under and must stay
/// stable across deploys.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Stable identity of this handler type.
    fn handler_type(&self) -> HandlerType;

    /// Validation-only hook. Must not have side effects.
    ///
    /// The default accepts everything.
    fn form_submit(&self, _step: &StepContext<'_>) -> FormResponse {
        FormResponse::success()
    }

    /// The step's business logic. Only runs after `form_submit` succeeded.
    ///
    /// # Errors
    ///
    /// Any error is propagated to the caller of the flow unchanged.
    async fn call(&self, step: &mut StepContext<'_>) -> anyhow::Result<CallResult>;

    /// Supplemental template locals for this step's page.
    fn extra_view_variables(&self, _step: &StepContext<'_>) -> Map<String, Value> {
        Map::new()
    }

    /// Event emitted when the step's page is shown.
    fn analytics_visited_event(&self, step: &str) -> AnalyticsEvent {
        AnalyticsEvent::StepVisited {
            step: step.to_string(),
        }
    }

    /// Event emitted when the step is submitted.
    fn analytics_submitted_event(&self, step: &str) -> AnalyticsEvent {
        AnalyticsEvent::StepSubmitted {
            step: step.to_string(),
        }
    }

    /// Event emitted when this handler runs as an optional show step.
    fn analytics_optional_submitted_event(&self, step: &str) -> AnalyticsEvent {
        AnalyticsEvent::OptionalStepSubmitted {
            step: step.to_string(),
        }
    }
}

/// A handler bound to the running flow for one execution.
pub struct StepContext<'a> {
    step_name: &'a str,
    handler_type: HandlerType,
    definition: &'a FlowDefinition,
    session: &'a mut FlowSession,
    params: &'a Params,
    overrides: &'a mut Overrides,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(
        step_name: &'a str,
        handler_type: HandlerType,
        definition: &'a FlowDefinition,
        session: &'a mut FlowSession,
        params: &'a Params,
        overrides: &'a mut Overrides,
    ) -> Self {
        Self {
            step_name,
            handler_type,
            definition,
            session,
            params,
            overrides,
        }
    }

    /// Name the handler was invoked under.
    #[must_use]
    pub const fn step_name(&self) -> &str {
        self.step_name
    }

    /// Identity of the bound handler.
    #[must_use]
    pub const fn handler_type(&self) -> &HandlerType {
        &self.handler_type
    }

    /// The flow's session state.
    #[must_use]
    pub fn flow_session(&self) -> &FlowSession {
        &*self.session
    }

    /// Mutable access to the flow's session state.
    pub fn flow_session_mut(&mut self) -> &mut FlowSession {
        &mut *self.session
    }

    /// All submitted parameters.
    #[must_use]
    pub const fn params(&self) -> &Params {
        self.params
    }

    /// One submitted parameter as a string, if present.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    /// Mark this step complete.
    pub fn mark_complete(&mut self) {
        self.session.mark_complete(self.handler_type.clone());
    }

    /// Mark this step incomplete.
    pub fn mark_incomplete(&mut self) {
        self.session.mark_incomplete(&self.handler_type);
    }

    /// Mark another step of the flow complete.
    ///
    /// Returns `false` (and records nothing) when `step` is not part of the flow.
    pub fn mark_step_complete(&mut self, step: &str) -> bool {
        match self.definition.handler_type_of(step) {
            Some(handler_type) => {
                self.session.mark_complete(handler_type);
                true
            }
            None => {
                tracing::warn!(step, from = self.step_name, "cannot mark unknown step complete");
                false
            }
        }
    }

    /// Mark another step of the flow incomplete.
    ///
    /// Returns `false` when `step` is not part of the flow.
    pub fn mark_step_incomplete(&mut self, step: &str) -> bool {
        match self.definition.handler_type_of(step) {
            Some(handler_type) => {
                self.session.mark_incomplete(&handler_type);
                true
            }
            None => {
                tracing::warn!(step, from = self.step_name, "cannot mark unknown step incomplete");
                false
            }
        }
    }

    /// Send the user to `target` once this request finishes.
    ///
    /// See [`NextStep::parse`] for how step names and URLs are told apart.
    pub fn redirect_to(&mut self, target: &str) {
        self.overrides.redirect = Some(NextStep::parse(target));
    }

    /// Answer this request with `body` instead of a page or redirect.
    pub fn render_json(&mut self, body: Value, status: u16) {
        self.overrides.json = Some(JsonResponse { body, status });
    }
}

impl fmt::Debug for StepContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("step_name", &self.step_name)
            .field("handler_type", &self.handler_type)
            .field("flow", &self.definition.name())
            .finish_non_exhaustive()
    }
}

/// Run `handler`: validate, then (only when valid) execute business logic.
///
/// On invalid input the first error message is stored in the flow session and
/// the validation response is returned as-is.
///
/// # Errors
///
/// Returns [`FlowError::Step`] if the handler's `call` fails.
pub async fn base_call(handler: &dyn StepHandler, step: &mut StepContext<'_>) -> Result<FormResponse> {
    let form_result = handler.form_submit(step);
    if !form_result.is_success() {
        let message = form_result.first_error_message(None).map(str::to_string);
        tracing::debug!(step = step.step_name, error = ?message, "step validation failed");
        step.session.set_error_message(message);
        return Ok(form_result);
    }

    let call_result = handler.call(step).await.map_err(|source| FlowError::Step {
        step: step.step_name.to_string(),
        source,
    })?;
    Ok(create_response(form_result, call_result))
}
