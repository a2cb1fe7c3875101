//! The HTTP adapter: binds a flow to the request/response cycle.
//!
//! # Actions
//!
//! | Action | Request | Outcome |
//! |---|---|---|
//! | [`FlowAdapter::index`] | `GET /` | redirect to the current step, or the final URL |
//! | [`FlowAdapter::show`] | `GET /:step` | render, skip via optional show step, or correct stale position |
//! | [`FlowAdapter::update`] | `POST /:step` | handle, then redirect, re-render with error, or answer JSON |
//! | [`FlowAdapter::reset`] | application | forget the persisted flow |
//!
//! Concurrent requests for one session are not serialized. Before rendering
//! a `show` and after a failed `update` the adapter re-resolves the current
//! step and redirects when the client's assumed position is stale.

use crate::config::FlowConfig;
use crate::response::{FlowResponse, StepView};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use waypoint_core::{
    dispatch, AnalyticsSink, Flow, FlowDefinition, FormResponse, NextStep, Params,
    PersistedFlow, Result, SessionId, SessionStore, StepAction, StepCounts, TracingAnalytics,
};

/// One inbound adapter request.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRequest {
    /// The caller's session
    pub session_id: SessionId,
    /// Submitted parameters
    pub params: Params,
    /// Whether the user is re-proofing for the IRS
    pub irs_reproofing: bool,
}

impl FlowRequest {
    /// Request for `session_id` with no parameters.
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            params: Params::new(),
            irs_reproofing: false,
        }
    }

    /// Attach submitted parameters.
    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Set the re-proofing flag.
    #[must_use]
    pub const fn with_irs_reproofing(mut self, irs_reproofing: bool) -> Self {
        self.irs_reproofing = irs_reproofing;
        self
    }
}

/// HTTP adapter for one flow.
///
/// # Type Parameters
///
/// - `S`: Session store holding the persisted flow
pub struct FlowAdapter<S> {
    definition: Arc<FlowDefinition>,
    config: FlowConfig,
    store: S,
    analytics: Arc<dyn AnalyticsSink>,
}

impl<S: SessionStore> FlowAdapter<S> {
    /// Create an adapter logging analytics through `tracing`.
    #[must_use]
    pub fn new(definition: Arc<FlowDefinition>, config: FlowConfig, store: S) -> Self {
        Self {
            definition,
            config,
            store,
            analytics: Arc::new(TracingAnalytics),
        }
    }

    /// Send analytics events to `analytics`.
    #[must_use]
    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = analytics;
        self
    }

    /// The flow definition.
    #[must_use]
    pub fn definition(&self) -> &FlowDefinition {
        &self.definition
    }

    /// The adapter configuration.
    #[must_use]
    pub const fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// The session store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Redirect to wherever the user belongs now.
    ///
    /// # Errors
    ///
    /// Returns error if the session store fails.
    pub async fn index(&self, request: FlowRequest) -> Result<FlowResponse> {
        let persisted = self.load(&request.session_id).await?;
        let flow = Flow::new(Arc::clone(&self.definition), persisted.session, request.params);

        let next = flow.next_step();
        tracing::debug!(flow = self.config.namespace(), next = ?next, "resolved current step");
        Ok(self.redirect_for(next.as_ref()))
    }

    /// Show `step`.
    ///
    /// Stale requests are redirected before anything is counted. An optional
    /// show step guarding `step` runs before rendering and redirects when it
    /// moved the flow past `step`.
    ///
    /// # Errors
    ///
    /// Returns error if the session store or the optional show step fails.
    pub async fn show(&self, request: FlowRequest, step: &str) -> Result<FlowResponse> {
        let PersistedFlow {
            session,
            mut step_counts,
        } = self.load(&request.session_id).await?;
        let mut flow = Flow::new(Arc::clone(&self.definition), session, request.params);

        let next = flow.next_step();
        if !next.as_ref().is_some_and(|n| n.is_step(step)) {
            return Ok(self.correct_stale_step(step, next.as_ref()));
        }

        step_counts.increment(step, StepAction::Show);
        metrics::counter!(
            "waypoint_step_visits_total",
            "flow" => self.config.namespace().to_string(),
            "step" => step.to_string()
        )
        .increment(1);

        let properties = self.analytics_properties(&flow, step, &step_counts, StepAction::Show, request.irs_reproofing);
        if let Some(handler) = self.definition.handler_for(step) {
            dispatch(
                self.analytics.as_ref(),
                self.config.analytics_id(),
                &handler.analytics_visited_event(step),
                &properties,
            );
        }

        let response = match self.probe_optional_step(&mut flow, step, properties).await? {
            Some(response) => response,
            None => FlowResponse::Render(self.step_view(&mut flow, step)),
        };

        self.save(&request.session_id, flow, step_counts).await?;
        Ok(response)
    }

    /// Submit `step`.
    ///
    /// Names in the steps catalog that are not the current step are
    /// redirected without being handled. Actions are always handled. Names
    /// in neither catalog answer like a failed submission but are not
    /// counted, reported or labelled in metrics.
    ///
    /// # Errors
    ///
    /// Returns error if the session store or the step's business logic
    /// fails. Step failures leave the persisted flow untouched.
    pub async fn update(&self, request: FlowRequest, step: &str) -> Result<FlowResponse> {
        let PersistedFlow {
            session,
            mut step_counts,
        } = self.load(&request.session_id).await?;
        let mut flow = Flow::new(Arc::clone(&self.definition), session, request.params);

        if self.definition.is_step(step) {
            let next = flow.next_step();
            if !next.as_ref().is_some_and(|n| n.is_step(step)) {
                return Ok(self.correct_stale_step(step, next.as_ref()));
            }
        }

        let result = flow.handle(step).await?;

        // Names outside both catalogs are neither counted nor reported
        if let Some(handler) = self.definition.handler_for(step) {
            step_counts.increment(step, StepAction::Update);
            metrics::counter!(
                "waypoint_step_submissions_total",
                "flow" => self.config.namespace().to_string(),
                "step" => step.to_string(),
                "success" => result.is_success().to_string()
            )
            .increment(1);

            let mut properties = result.to_h();
            properties.extend(self.analytics_properties(
                &flow,
                step,
                &step_counts,
                StepAction::Update,
                request.irs_reproofing,
            ));
            dispatch(
                self.analytics.as_ref(),
                self.config.analytics_id(),
                &handler.analytics_submitted_event(step),
                &properties,
            );
        }

        let response = self.render_update(&mut flow, step, &result);

        self.save(&request.session_id, flow, step_counts).await?;
        Ok(response)
    }

    /// Forget everything persisted for this flow in `session_id`.
    ///
    /// # Errors
    ///
    /// Returns error if the session store fails.
    pub async fn reset(&self, session_id: &SessionId) -> Result<()> {
        tracing::info!(flow = self.config.namespace(), session_id = %session_id, "resetting flow");
        self.store.clear(session_id, self.config.namespace()).await
    }

    fn render_update(&self, flow: &mut Flow, step: &str, result: &FormResponse) -> FlowResponse {
        if let Some(json) = flow.json_response() {
            tracing::debug!(flow = self.config.namespace(), step, status = json.status, "step answered with json");
            return FlowResponse::Json {
                status: json.status,
                body: json.body.clone(),
            };
        }

        if let Some(redirect) = flow.pending_redirect() {
            return self.redirect_for(Some(redirect));
        }

        let next = flow.next_step();
        let Some(NextStep::Step(next_step)) = &next else {
            tracing::info!(flow = self.config.namespace(), step, "flow finished");
            return self.redirect_for(next.as_ref());
        };

        if result.is_success() {
            tracing::info!(flow = self.config.namespace(), from = step, to = %next_step, "advancing");
            return self.redirect_for(next.as_ref());
        }

        if next_step != step {
            return self.correct_stale_step(step, next.as_ref());
        }

        let message = result
            .first_error_message(None)
            .map(str::to_string)
            .or_else(|| flow.flow_session().error_message().map(str::to_string));
        flow.flow_session_mut().set_error_message(message);
        FlowResponse::Render(self.step_view(flow, step))
    }

    async fn probe_optional_step(
        &self,
        flow: &mut Flow,
        step: &str,
        properties: Map<String, Value>,
    ) -> Result<Option<FlowResponse>> {
        let Some(probe) = self.definition.optional_show_step(step).cloned() else {
            return Ok(None);
        };
        let Some(result) = flow.probe_optional_step(step).await? else {
            return Ok(None);
        };

        let mut probe_properties = result.to_h();
        probe_properties.extend(properties);
        dispatch(
            self.analytics.as_ref(),
            self.config.analytics_id(),
            &probe.analytics_optional_submitted_event(step),
            &probe_properties,
        );

        if let Some(json) = flow.json_response() {
            return Ok(Some(FlowResponse::Json {
                status: json.status,
                body: json.body.clone(),
            }));
        }

        let next = flow.next_step();
        if next.as_ref().is_some_and(|n| n.is_step(step)) {
            return Ok(None);
        }

        tracing::info!(
            flow = self.config.namespace(),
            step,
            next = ?next,
            "optional show step satisfied, skipping page"
        );
        Ok(Some(self.redirect_for(next.as_ref())))
    }

    fn correct_stale_step(&self, requested: &str, next: Option<&NextStep>) -> FlowResponse {
        tracing::info!(
            flow = self.config.namespace(),
            requested,
            current = ?next,
            "stale step, redirecting to current step"
        );
        let current = match next {
            Some(NextStep::Step(step)) => step.clone(),
            Some(NextStep::Url(_)) => "url".to_string(),
            None => "final".to_string(),
        };
        metrics::counter!(
            "waypoint_stale_step_corrections_total",
            "flow" => self.config.namespace().to_string(),
            "current_step" => current
        )
        .increment(1);
        self.redirect_for(next)
    }

    fn redirect_for(&self, next: Option<&NextStep>) -> FlowResponse {
        match next {
            Some(NextStep::Step(step)) => FlowResponse::redirect(self.config.step_url(step)),
            Some(NextStep::Url(url)) => FlowResponse::redirect(url.clone()),
            None => FlowResponse::redirect(self.config.final_url()),
        }
    }

    fn analytics_properties(
        &self,
        flow: &Flow,
        step: &str,
        step_counts: &StepCounts,
        action: StepAction,
        irs_reproofing: bool,
    ) -> Map<String, Value> {
        let mut properties = Map::new();
        properties.insert(
            "flow_path".to_string(),
            flow.flow_session().flow_path().map_or(Value::Null, Value::from),
        );
        properties.insert("step".to_string(), Value::from(step));
        properties.insert("step_count".to_string(), Value::from(step_counts.get(step, action)));
        properties.insert("analytics_id".to_string(), Value::from(self.config.analytics_id()));
        properties.insert("irs_reproofing".to_string(), Value::Bool(irs_reproofing));
        properties
    }

    fn step_view(&self, flow: &mut Flow, step: &str) -> StepView {
        let template = self.config.template_for(step);

        let mut locals = Map::new();
        locals.insert("step".to_string(), Value::from(step));
        locals.insert("flow_namespace".to_string(), Value::from(self.config.namespace()));
        locals.insert("step_template".to_string(), Value::from(template.clone()));
        locals.insert(
            "error_message".to_string(),
            flow.flow_session().error_message().map_or(Value::Null, Value::from),
        );
        if let Some(indicator) = self.definition.step_indicator() {
            locals.insert(
                "step_indicator".to_string(),
                json!({
                    "steps": indicator.steps(),
                    "current_step": indicator.current_for(step),
                }),
            );
        }
        locals.extend(flow.extra_view_variables(step));

        StepView {
            step: step.to_string(),
            template,
            locals,
            flow_session: flow.flow_session().clone(),
        }
    }

    async fn load(&self, session_id: &SessionId) -> Result<PersistedFlow> {
        Ok(self
            .store
            .load(session_id, self.config.namespace())
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, session_id: &SessionId, flow: Flow, step_counts: StepCounts) -> Result<()> {
        let persisted = PersistedFlow {
            session: flow.into_session(),
            step_counts,
        };
        self.store.save(session_id, self.config.namespace(), &persisted).await
    }
}

impl<S> std::fmt::Debug for FlowAdapter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowAdapter")
            .field("definition", &self.definition.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
