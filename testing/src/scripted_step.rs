//! A configurable step handler with call spies.
//!
//! # Example
//!
//! ```
//! use waypoint_testing::ScriptedStep;
//!
//! let ssn = ScriptedStep::new("SsnStep").invalid("ssn", "bad value");
//! let calls = ssn.call_counter();
//! // ... build a flow with `ssn`, submit it ...
//! assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
//! ```

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use waypoint_core::{AnalyticsEvent, CallResult, FormResponse, HandlerType, StepContext, StepHandler};

/// Step handler whose validation and business logic are scripted.
///
/// By default it validates successfully and marks itself complete.
#[derive(Debug, Clone)]
pub struct ScriptedStep {
    handler_type: HandlerType,
    validation_errors: Vec<(String, String)>,
    completes_self: bool,
    completes: Vec<String>,
    uncompletes: Vec<String>,
    stores: Vec<(String, Value)>,
    result: Option<FormResponse>,
    redirect: Option<String>,
    json: Option<(Value, u16)>,
    failure: Option<String>,
    view_variables: Map<String, Value>,
    submitted_event: Option<String>,
    form_submits: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedStep {
    /// Step identified as `handler_type` that completes itself.
    #[must_use]
    pub fn new(handler_type: &str) -> Self {
        Self {
            handler_type: HandlerType::new(handler_type),
            validation_errors: Vec::new(),
            completes_self: true,
            completes: Vec::new(),
            uncompletes: Vec::new(),
            stores: Vec::new(),
            result: None,
            redirect: None,
            json: None,
            failure: None,
            view_variables: Map::new(),
            submitted_event: None,
            form_submits: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail validation with `message` on `field`.
    #[must_use]
    pub fn invalid(mut self, field: &str, message: &str) -> Self {
        self.validation_errors.push((field.to_string(), message.to_string()));
        self
    }

    /// Do not mark this step complete when called.
    #[must_use]
    pub const fn leaves_incomplete(mut self) -> Self {
        self.completes_self = false;
        self
    }

    /// Mark the step named `step` complete when called.
    #[must_use]
    pub fn completes(mut self, step: &str) -> Self {
        self.completes.push(step.to_string());
        self
    }

    /// Mark the step named `step` incomplete when called.
    #[must_use]
    pub fn uncompletes(mut self, step: &str) -> Self {
        self.uncompletes.push(step.to_string());
        self
    }

    /// Store a working value when called.
    #[must_use]
    pub fn stores(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.stores.push((key.to_string(), value.into()));
        self
    }

    /// Return `result` from business logic. A failed result also keeps the
    /// step incomplete.
    #[must_use]
    pub fn returns(mut self, result: FormResponse) -> Self {
        self.result = Some(result);
        self
    }

    /// Redirect to `target` when called.
    #[must_use]
    pub fn redirects_to(mut self, target: &str) -> Self {
        self.redirect = Some(target.to_string());
        self
    }

    /// Answer with a JSON body when called.
    #[must_use]
    pub fn renders_json(mut self, body: Value, status: u16) -> Self {
        self.json = Some((body, status));
        self
    }

    /// Fail business logic with `message`.
    #[must_use]
    pub fn fails(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Add a template local.
    #[must_use]
    pub fn with_view_variable(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.view_variables.insert(key.to_string(), value.into());
        self
    }

    /// Report submissions under a custom event name.
    #[must_use]
    pub fn with_submitted_event(mut self, name: &str) -> Self {
        self.submitted_event = Some(name.to_string());
        self
    }

    /// Spy counting business-logic invocations. Shared by clones.
    #[must_use]
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Spy counting validation invocations. Shared by clones.
    #[must_use]
    pub fn form_submit_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.form_submits)
    }

    /// Business-logic invocations so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StepHandler for ScriptedStep {
    fn handler_type(&self) -> HandlerType {
        self.handler_type.clone()
    }

    fn form_submit(&self, _step: &StepContext<'_>) -> FormResponse {
        self.form_submits.fetch_add(1, Ordering::SeqCst);
        self.validation_errors
            .iter()
            .fold(FormResponse::new(self.validation_errors.is_empty()), |response, (field, message)| {
                response.with_error(field.as_str(), message.as_str())
            })
    }

    async fn call(&self, step: &mut StepContext<'_>) -> anyhow::Result<CallResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.failure {
            anyhow::bail!("{message}");
        }

        for (key, value) in &self.stores {
            step.flow_session_mut().insert(key.as_str(), value)?;
        }
        for name in &self.completes {
            step.mark_step_complete(name);
        }
        for name in &self.uncompletes {
            step.mark_step_incomplete(name);
        }
        if self.completes_self && self.result.as_ref().is_none_or(FormResponse::is_success) {
            step.mark_complete();
        }
        if let Some(target) = &self.redirect {
            step.redirect_to(target);
        }
        if let Some((body, status)) = &self.json {
            step.render_json(body.clone(), *status);
        }

        Ok(self.result.clone().map_or(CallResult::Empty, CallResult::Form))
    }

    fn extra_view_variables(&self, _step: &StepContext<'_>) -> Map<String, Value> {
        self.view_variables.clone()
    }

    fn analytics_submitted_event(&self, step: &str) -> AnalyticsEvent {
        self.submitted_event.as_ref().map_or_else(
            || AnalyticsEvent::StepSubmitted { step: step.to_string() },
            |name| AnalyticsEvent::Named(name.clone()),
        )
    }
}
