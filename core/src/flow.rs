//! Flows: ordered step catalogs and next-step resolution.
//!
//! A [`FlowDefinition`] is built once at startup and shared. A [`Flow`] wraps
//! one definition together with the [`FlowSession`] loaded for the current
//! request; it is created per request and discarded afterwards.

use crate::error::{FlowError, Result};
use crate::form_response::FormResponse;
use crate::session::{FlowSession, HandlerType};
use crate::step::{base_call, Params, StepContext, StepHandler};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A named step bound to its handler.
#[derive(Clone)]
pub struct StepDefinition {
    name: String,
    handler: Arc<dyn StepHandler>,
}

impl StepDefinition {
    /// Step name, unique within its flow.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The handler executing this step.
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn StepHandler> {
        &self.handler
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("name", &self.name)
            .field("handler_type", &self.handler.handler_type())
            .finish()
    }
}

/// Steps shown by the progress indicator, and which page maps onto which.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepIndicatorSteps {
    steps: Vec<String>,
    aliases: BTreeMap<String, String>,
}

impl StepIndicatorSteps {
    /// Indicator with the given entries, in display order.
    #[must_use]
    pub fn new<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            steps: steps.into_iter().map(Into::into).collect(),
            aliases: BTreeMap::new(),
        }
    }

    /// Show `entry` as current while `step` is rendered.
    #[must_use]
    pub fn with_alias(mut self, step: impl Into<String>, entry: impl Into<String>) -> Self {
        self.aliases.insert(step.into(), entry.into());
        self
    }

    /// Indicator entries in display order.
    #[must_use]
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// Indicator entry that is current while `step` is rendered.
    #[must_use]
    pub fn current_for(&self, step: &str) -> Option<&str> {
        self.aliases
            .get(step)
            .map(String::as_str)
            .or_else(|| self.steps.iter().find(|s| *s == step).map(String::as_str))
    }
}

/// Immutable description of a flow.
///
/// Holds two catalogs: `steps` are rendered pages, in order; `actions` are
/// handler-only operations posted from other pages. Optional show steps are
/// precondition probes keyed by the step they guard.
pub struct FlowDefinition {
    name: String,
    steps: Vec<StepDefinition>,
    actions: Vec<StepDefinition>,
    optional_show_steps: BTreeMap<String, Arc<dyn StepHandler>>,
    step_indicator: Option<StepIndicatorSteps>,
}

impl FlowDefinition {
    /// Start building a flow named `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> FlowDefinitionBuilder {
        FlowDefinitionBuilder {
            name: name.into(),
            steps: Vec::new(),
            actions: Vec::new(),
            optional_show_steps: BTreeMap::new(),
            step_indicator: None,
        }
    }

    /// Flow name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Page steps in declared order.
    #[must_use]
    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    /// Page-less actions.
    #[must_use]
    pub fn actions(&self) -> &[StepDefinition] {
        &self.actions
    }

    /// Step indicator configuration, if the flow has one.
    #[must_use]
    pub const fn step_indicator(&self) -> Option<&StepIndicatorSteps> {
        self.step_indicator.as_ref()
    }

    /// Whether `name` is a page step (not an action).
    #[must_use]
    pub fn is_step(&self, name: &str) -> bool {
        self.steps.iter().any(|s| s.name == name)
    }

    /// Handler for `name`, looked up in steps first, then actions.
    #[must_use]
    pub fn handler_for(&self, name: &str) -> Option<&Arc<dyn StepHandler>> {
        self.steps
            .iter()
            .chain(self.actions.iter())
            .find(|s| s.name == name)
            .map(|s| &s.handler)
    }

    /// Handler identity for `name`.
    #[must_use]
    pub fn handler_type_of(&self, name: &str) -> Option<HandlerType> {
        self.handler_for(name).map(|h| h.handler_type())
    }

    /// Precondition probe guarding `step`, if declared.
    #[must_use]
    pub fn optional_show_step(&self, step: &str) -> Option<&Arc<dyn StepHandler>> {
        self.optional_show_steps.get(step)
    }

    /// First page step whose handler type is not complete in `session`.
    #[must_use]
    pub fn first_incomplete_step(&self, session: &FlowSession) -> Option<&str> {
        self.steps
            .iter()
            .find(|s| !session.is_complete(&s.handler.handler_type()))
            .map(|s| s.name.as_str())
    }
}

impl fmt::Debug for FlowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowDefinition")
            .field("name", &self.name)
            .field("steps", &self.steps)
            .field("actions", &self.actions)
            .field("optional_show_steps", &self.optional_show_steps.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Builder for [`FlowDefinition`].
pub struct FlowDefinitionBuilder {
    name: String,
    steps: Vec<StepDefinition>,
    actions: Vec<StepDefinition>,
    optional_show_steps: BTreeMap<String, Arc<dyn StepHandler>>,
    step_indicator: Option<StepIndicatorSteps>,
}

impl FlowDefinitionBuilder {
    /// Append a page step.
    #[must_use]
    pub fn step(mut self, name: impl Into<String>, handler: impl StepHandler + 'static) -> Self {
        self.steps.push(StepDefinition {
            name: name.into(),
            handler: Arc::new(handler),
        });
        self
    }

    /// Append a page step with a shared handler.
    #[must_use]
    pub fn step_arc(mut self, name: impl Into<String>, handler: Arc<dyn StepHandler>) -> Self {
        self.steps.push(StepDefinition {
            name: name.into(),
            handler,
        });
        self
    }

    /// Add a page-less action.
    #[must_use]
    pub fn action(mut self, name: impl Into<String>, handler: impl StepHandler + 'static) -> Self {
        self.actions.push(StepDefinition {
            name: name.into(),
            handler: Arc::new(handler),
        });
        self
    }

    /// Add a page-less action with a shared handler.
    #[must_use]
    pub fn action_arc(mut self, name: impl Into<String>, handler: Arc<dyn StepHandler>) -> Self {
        self.actions.push(StepDefinition {
            name: name.into(),
            handler,
        });
        self
    }

    /// Guard `step` with a precondition probe run on every GET of it.
    ///
    /// The probe must be idempotent.
    #[must_use]
    pub fn optional_show_step(mut self, step: impl Into<String>, probe: impl StepHandler + 'static) -> Self {
        self.optional_show_steps.insert(step.into(), Arc::new(probe));
        self
    }

    /// Guard `step` with a shared precondition probe.
    #[must_use]
    pub fn optional_show_step_arc(mut self, step: impl Into<String>, probe: Arc<dyn StepHandler>) -> Self {
        self.optional_show_steps.insert(step.into(), probe);
        self
    }

    /// Configure the progress indicator.
    #[must_use]
    pub fn step_indicator(mut self, indicator: StepIndicatorSteps) -> Self {
        self.step_indicator = Some(indicator);
        self
    }

    /// Finish the definition.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::DuplicateStep`] if a name appears twice across
    /// steps and actions.
    pub fn build(self) -> Result<FlowDefinition> {
        let mut seen = std::collections::BTreeSet::new();
        for step in self.steps.iter().chain(self.actions.iter()) {
            if !seen.insert(step.name.as_str()) {
                return Err(FlowError::DuplicateStep(step.name.clone()));
            }
        }

        Ok(FlowDefinition {
            name: self.name,
            steps: self.steps,
            actions: self.actions,
            optional_show_steps: self.optional_show_steps,
            step_indicator: self.step_indicator,
        })
    }
}

/// Where the user should go next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    /// A step of the flow, by name.
    Step(String),
    /// A raw URL, possibly external.
    Url(String),
}

impl NextStep {
    /// Classify a redirect target: anything containing `:` is a URL.
    ///
    /// # Examples
    ///
    /// ```
    /// # use waypoint_core::NextStep;
    /// assert_eq!(NextStep::parse("ssn"), NextStep::Step("ssn".into()));
    /// assert_eq!(
    ///     NextStep::parse("https://example.com/cancel"),
    ///     NextStep::Url("https://example.com/cancel".into())
    /// );
    /// ```
    #[must_use]
    pub fn parse(target: &str) -> Self {
        if target.contains(':') {
            Self::Url(target.to_string())
        } else {
            Self::Step(target.to_string())
        }
    }

    /// Whether this resolves to the step named `step`.
    #[must_use]
    pub fn is_step(&self, step: &str) -> bool {
        matches!(self, Self::Step(name) if name == step)
    }
}

impl fmt::Display for NextStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step(name) => f.write_str(name),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// A JSON body a step asked to answer with.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonResponse {
    /// Response body
    pub body: Value,
    /// HTTP status code
    pub status: u16,
}

/// Response overrides recorded by steps during one request.
#[derive(Debug, Clone, Default)]
pub(crate) struct Overrides {
    pub(crate) redirect: Option<NextStep>,
    pub(crate) json: Option<JsonResponse>,
}

/// A flow definition bound to one request's session state.
pub struct Flow {
    definition: Arc<FlowDefinition>,
    session: FlowSession,
    params: Params,
    overrides: Overrides,
}

impl Flow {
    /// Bind `definition` to `session` for one request.
    #[must_use]
    pub fn new(definition: Arc<FlowDefinition>, session: FlowSession, params: Params) -> Self {
        Self {
            definition,
            session,
            params,
            overrides: Overrides::default(),
        }
    }

    /// The flow definition.
    #[must_use]
    pub fn definition(&self) -> &FlowDefinition {
        &self.definition
    }

    /// Session state as mutated so far.
    #[must_use]
    pub const fn flow_session(&self) -> &FlowSession {
        &self.session
    }

    /// Mutable session state.
    pub fn flow_session_mut(&mut self) -> &mut FlowSession {
        &mut self.session
    }

    /// Give back the session state for persistence.
    #[must_use]
    pub fn into_session(self) -> FlowSession {
        self.session
    }

    /// Resolve where the user belongs now.
    ///
    /// A pending redirect wins. Otherwise this is the first page step whose
    /// handler type is not complete, or `None` when the flow is finished.
    #[must_use]
    pub fn next_step(&self) -> Option<NextStep> {
        if let Some(redirect) = &self.overrides.redirect {
            return Some(redirect.clone());
        }
        self.definition
            .first_incomplete_step(&self.session)
            .map(|name| NextStep::Step(name.to_string()))
    }

    /// Handler registered for `step` in either catalog.
    #[must_use]
    pub fn step_handler(&self, step: &str) -> Option<&Arc<dyn StepHandler>> {
        self.definition.handler_for(step)
    }

    /// Execute the step or action named `step`.
    ///
    /// Clears the session's error message first. Unknown names yield the
    /// failed response `"Unhandled step {step}"` rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Step`] if the step's business logic fails.
    pub async fn handle(&mut self, step: &str) -> Result<FormResponse> {
        self.session.clear_error_message();

        let Some(handler) = self.definition.handler_for(step).cloned() else {
            tracing::warn!(flow = self.definition.name(), step, "unhandled step");
            return Ok(FormResponse::unhandled_step(step));
        };

        tracing::debug!(flow = self.definition.name(), step, "handling step");
        let mut context = StepContext::new(
            step,
            handler.handler_type(),
            &self.definition,
            &mut self.session,
            &self.params,
            &mut self.overrides,
        );
        base_call(handler.as_ref(), &mut context).await
    }

    /// Run the precondition probe guarding `step`, if one is declared.
    ///
    /// Returns `None` when `step` has no probe. Probes run on reads, so they
    /// must be idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Step`] if the probe's business logic fails.
    pub async fn probe_optional_step(&mut self, step: &str) -> Result<Option<FormResponse>> {
        let Some(probe) = self.definition.optional_show_step(step).cloned() else {
            return Ok(None);
        };

        tracing::debug!(flow = self.definition.name(), step, "probing optional show step");
        let mut context = StepContext::new(
            step,
            probe.handler_type(),
            &self.definition,
            &mut self.session,
            &self.params,
            &mut self.overrides,
        );
        base_call(probe.as_ref(), &mut context).await.map(Some)
    }

    /// Record a redirect that the next [`Flow::next_step`] resolves to.
    pub fn redirect_to(&mut self, target: &str) {
        self.overrides.redirect = Some(NextStep::parse(target));
    }

    /// Redirect recorded by a step during this request, if any.
    #[must_use]
    pub const fn pending_redirect(&self) -> Option<&NextStep> {
        self.overrides.redirect.as_ref()
    }

    /// Record a JSON answer that replaces render/redirect handling.
    pub fn render_json(&mut self, body: Value, status: u16) {
        self.overrides.json = Some(JsonResponse { body, status });
    }

    /// JSON answer recorded by a step, if any.
    #[must_use]
    pub const fn json_response(&self) -> Option<&JsonResponse> {
        self.overrides.json.as_ref()
    }

    /// Supplemental template locals for `step`; empty for unknown steps.
    #[must_use]
    pub fn extra_view_variables(&mut self, step: &str) -> Map<String, Value> {
        let Some(handler) = self.definition.handler_for(step).cloned() else {
            return Map::new();
        };
        let context = StepContext::new(
            step,
            handler.handler_type(),
            &self.definition,
            &mut self.session,
            &self.params,
            &mut self.overrides,
        );
        handler.extra_view_variables(&context)
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("definition", &self.definition.name())
            .field("session", &self.session)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::step::CallResult;
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl StepHandler for Named {
        fn handler_type(&self) -> HandlerType {
            HandlerType::new(self.0)
        }

        async fn call(&self, step: &mut StepContext<'_>) -> anyhow::Result<CallResult> {
            step.mark_complete();
            Ok(CallResult::Empty)
        }
    }

    fn definition() -> Arc<FlowDefinition> {
        Arc::new(
            FlowDefinition::builder("doc_auth")
                .step("welcome", Named("WelcomeStep"))
                .step("agreement", Named("AgreementStep"))
                .action("cancel", Named("CancelAction"))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = FlowDefinition::builder("doc_auth")
            .step("welcome", Named("WelcomeStep"))
            .action("welcome", Named("CancelAction"))
            .build();

        assert!(matches!(result, Err(FlowError::DuplicateStep(name)) if name == "welcome"));
    }

    #[test]
    fn test_redirect_override_wins() {
        let mut flow = Flow::new(definition(), FlowSession::new(), Params::new());
        assert_eq!(flow.next_step(), Some(NextStep::Step("welcome".into())));

        flow.redirect_to("https://sp.example.com/return");
        assert_eq!(flow.next_step(), Some(NextStep::Url("https://sp.example.com/return".into())));
    }

    #[test]
    fn test_step_indicator_aliases() {
        let indicator = StepIndicatorSteps::new(["getting_started", "verify_id"])
            .with_alias("welcome", "getting_started");

        assert_eq!(indicator.current_for("welcome"), Some("getting_started"));
        assert_eq!(indicator.current_for("verify_id"), Some("verify_id"));
        assert_eq!(indicator.current_for("ssn"), None);
    }

    #[tokio::test]
    async fn test_actions_are_handled_but_not_resolved() {
        let mut flow = Flow::new(definition(), FlowSession::new(), Params::new());

        let response = flow.handle("cancel").await.unwrap();

        assert!(response.is_success());
        assert!(flow.flow_session().is_complete(&HandlerType::new("CancelAction")));
        assert_eq!(flow.next_step(), Some(NextStep::Step("welcome".into())));
    }
}
