//! Flow endpoints.
//!
//! Thin shells over [`FlowAdapter`](crate::FlowAdapter): extract the session
//! and parameters, run the adapter action, turn its outcome into HTTP.

use crate::error::AppError;
use crate::extractors::{AnalyticsContext, FlowSessionId, FormParams};
use crate::state::FlowState;
use crate::state_machine::FlowRequest;
use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use serde_json::Value;
use waypoint_core::{Params, SessionStore};

/// Redirect to the current step.
///
/// # Endpoint
///
/// ```text
/// GET /
/// ```
///
/// # Errors
///
/// Returns error if the session is missing or the session store fails.
pub async fn index<S>(
    State(state): State<FlowState<S>>,
    FlowSessionId(session_id): FlowSessionId,
    context: AnalyticsContext,
) -> Result<Response, AppError>
where
    S: SessionStore + 'static,
{
    let request = FlowRequest::new(session_id).with_irs_reproofing(context.irs_reproofing);
    let outcome = state.adapter().index(request).await?;
    outcome.into_http(state.renderer())
}

/// Show one step.
///
/// Query parameters are passed to the flow as step parameters.
///
/// # Endpoint
///
/// ```text
/// GET /:step
/// ```
///
/// # Errors
///
/// Returns error if the session is missing, the session store fails, or an
/// optional show step fails.
pub async fn show<S>(
    State(state): State<FlowState<S>>,
    Path(step): Path<String>,
    FlowSessionId(session_id): FlowSessionId,
    context: AnalyticsContext,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<Response, AppError>
where
    S: SessionStore + 'static,
{
    let params: Params = query.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
    let request = FlowRequest::new(session_id)
        .with_params(params)
        .with_irs_reproofing(context.irs_reproofing);

    let outcome = state.adapter().show(request, &step).await?;
    outcome.into_http(state.renderer())
}

/// Submit one step or action.
///
/// # Endpoint
///
/// ```text
/// POST /:step
/// PUT /:step
/// ```
///
/// # Errors
///
/// Returns error if the session is missing, the body is malformed, the
/// session store fails, or the step's business logic fails.
pub async fn update<S>(
    State(state): State<FlowState<S>>,
    Path(step): Path<String>,
    FlowSessionId(session_id): FlowSessionId,
    context: AnalyticsContext,
    FormParams(params): FormParams,
) -> Result<Response, AppError>
where
    S: SessionStore + 'static,
{
    let request = FlowRequest::new(session_id)
        .with_params(params)
        .with_irs_reproofing(context.irs_reproofing);

    let outcome = state.adapter().update(request, &step).await?;
    outcome.into_http(state.renderer())
}
