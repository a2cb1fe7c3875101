//! Per-flow adapter configuration.
//!
//! Configuration values are supplied by the application once per flow and
//! never change afterwards.

use std::fmt;
use std::sync::Arc;

/// Builds the URL of a step from its name.
pub type StepUrlBuilder = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Configuration binding one flow to the HTTP adapter.
#[derive(Clone)]
pub struct FlowConfig {
    /// Flow namespace (e.g., "doc_auth").
    ///
    /// Keys the persisted state and prefixes default URLs and templates.
    namespace: String,

    /// Flow type reported in logs (e.g., "idv").
    flow_type: String,

    /// Analytics id, lowercased as the event name prefix (e.g., "Doc Auth").
    analytics_id: String,

    /// Template namespace, when it differs from `namespace`.
    view_namespace: Option<String>,

    /// Step URL builder.
    ///
    /// Default: `/{namespace}/{step}`
    step_url: StepUrlBuilder,

    /// URL the user lands on once every step is complete.
    ///
    /// Default: `/`
    final_url: String,
}

impl FlowConfig {
    /// Create configuration for the flow mounted under `namespace`.
    ///
    /// # Arguments
    ///
    /// * `namespace` - Flow namespace (e.g., "doc_auth")
    /// * `analytics_id` - Analytics id (e.g., "Doc Auth")
    #[must_use]
    pub fn new(namespace: impl Into<String>, analytics_id: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let prefix = namespace.clone();
        Self {
            flow_type: namespace.clone(),
            namespace,
            analytics_id: analytics_id.into(),
            view_namespace: None,
            step_url: Arc::new(move |step| format!("/{prefix}/{step}")),
            final_url: "/".to_string(),
        }
    }

    /// Set the flow type.
    #[must_use]
    pub fn with_flow_type(mut self, flow_type: impl Into<String>) -> Self {
        self.flow_type = flow_type.into();
        self
    }

    /// Render templates from `view_namespace` instead of the flow namespace.
    #[must_use]
    pub fn with_view_namespace(mut self, view_namespace: impl Into<String>) -> Self {
        self.view_namespace = Some(view_namespace.into());
        self
    }

    /// Set the step URL builder.
    #[must_use]
    pub fn with_step_url(mut self, builder: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.step_url = Arc::new(builder);
        self
    }

    /// Set the terminal URL.
    #[must_use]
    pub fn with_final_url(mut self, url: impl Into<String>) -> Self {
        self.final_url = url.into();
        self
    }

    /// Flow namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Flow type.
    #[must_use]
    pub fn flow_type(&self) -> &str {
        &self.flow_type
    }

    /// Analytics id.
    #[must_use]
    pub fn analytics_id(&self) -> &str {
        &self.analytics_id
    }

    /// Template namespace, falling back to the flow namespace.
    #[must_use]
    pub fn view_namespace(&self) -> &str {
        self.view_namespace.as_deref().unwrap_or(&self.namespace)
    }

    /// URL of `step`.
    #[must_use]
    pub fn step_url(&self, step: &str) -> String {
        (self.step_url)(step)
    }

    /// Terminal URL.
    #[must_use]
    pub fn final_url(&self) -> &str {
        &self.final_url
    }

    /// Template name for `step`: `{view_namespace}/{step}`.
    #[must_use]
    pub fn template_for(&self, step: &str) -> String {
        format!("{}/{step}", self.view_namespace())
    }
}

impl fmt::Debug for FlowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowConfig")
            .field("namespace", &self.namespace)
            .field("flow_type", &self.flow_type)
            .field("analytics_id", &self.analytics_id)
            .field("view_namespace", &self.view_namespace)
            .field("final_url", &self.final_url)
            .finish_non_exhaustive()
    }
}
