//! Flow router composition.

use crate::handlers;
use crate::state::FlowState;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use waypoint_core::SessionStore;

/// Create the router serving one flow.
///
/// # Routes
///
/// - `GET /` - Redirect to the current step
/// - `GET /:step` - Show a step
/// - `POST /:step`, `PUT /:step` - Submit a step or action
///
/// # Example
///
/// ```rust,ignore
/// let adapter = FlowAdapter::new(definition, FlowConfig::new("verify", "IdV"), store);
///
/// let app = Router::new().nest("/verify", flow_router(FlowState::new(adapter)));
/// ```
pub fn flow_router<S>(state: FlowState<S>) -> Router
where
    S: SessionStore + 'static,
{
    Router::new()
        .route("/", get(handlers::index::<S>))
        .route(
            "/:step",
            get(handlers::show::<S>)
                .post(handlers::update::<S>)
                .put(handlers::update::<S>),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
