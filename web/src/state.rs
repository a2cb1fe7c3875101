//! Router state for flow handlers.

use crate::render::{JsonStepRenderer, StepRenderer};
use crate::state_machine::FlowAdapter;
use std::sync::Arc;

/// State shared by the handlers of one flow router.
///
/// Cheap to clone: both members are reference counted.
///
/// # Examples
///
/// ```ignore
/// use waypoint_web::{FlowAdapter, FlowConfig, FlowState};
///
/// let adapter = FlowAdapter::new(definition, FlowConfig::new("doc_auth", "Doc Auth"), store);
/// let state = FlowState::new(adapter).with_renderer(Arc::new(MyTemplates::new()));
/// let app = waypoint_web::flow_router(state);
/// ```
pub struct FlowState<S> {
    adapter: Arc<FlowAdapter<S>>,
    renderer: Arc<dyn StepRenderer>,
}

impl<S> FlowState<S> {
    /// State rendering pages with [`JsonStepRenderer`].
    #[must_use]
    pub fn new(adapter: FlowAdapter<S>) -> Self {
        Self {
            adapter: Arc::new(adapter),
            renderer: Arc::new(JsonStepRenderer),
        }
    }

    /// Render pages with `renderer`.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn StepRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// The flow adapter.
    #[must_use]
    pub fn adapter(&self) -> &FlowAdapter<S> {
        &self.adapter
    }

    /// The page renderer.
    #[must_use]
    pub fn renderer(&self) -> &dyn StepRenderer {
        self.renderer.as_ref()
    }
}

impl<S> Clone for FlowState<S> {
    fn clone(&self) -> Self {
        Self {
            adapter: Arc::clone(&self.adapter),
            renderer: Arc::clone(&self.renderer),
        }
    }
}
