//! Analytics event descriptors.
//!
//! Steps describe the events they want emitted as [`AnalyticsEvent`] values;
//! [`dispatch`] is the one place that turns a descriptor into a call on the
//! injected [`AnalyticsSink`].

use serde_json::{Map, Value};

/// What happened, as described by a step handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsEvent {
    /// A step page was shown.
    StepVisited {
        /// Step name
        step: String,
    },
    /// A step was submitted.
    StepSubmitted {
        /// Step name
        step: String,
    },
    /// An optional show step ran its precondition probe.
    OptionalStepSubmitted {
        /// Name of the guarded step
        step: String,
    },
    /// A handler-chosen event name, used verbatim.
    Named(String),
}

impl AnalyticsEvent {
    /// Resolve the event name for a flow with the given analytics id.
    ///
    /// # Examples
    ///
    /// ```
    /// # use waypoint_core::AnalyticsEvent;
    /// let event = AnalyticsEvent::StepVisited { step: "welcome".into() };
    /// assert_eq!(event.name("Doc Auth"), "doc auth welcome visited");
    ///
    /// let event = AnalyticsEvent::Named("IdV: consent checkbox toggled".into());
    /// assert_eq!(event.name("Doc Auth"), "IdV: consent checkbox toggled");
    /// ```
    #[must_use]
    pub fn name(&self, analytics_id: &str) -> String {
        let prefix = analytics_id.to_lowercase();
        match self {
            Self::StepVisited { step } => format!("{prefix} {step} visited"),
            Self::StepSubmitted { step } => format!("{prefix} {step} submitted"),
            Self::OptionalStepSubmitted { step } => format!("{prefix} optional {step} submitted"),
            Self::Named(name) => name.clone(),
        }
    }
}

/// Receiver of analytics events.
pub trait AnalyticsSink: Send + Sync {
    /// Record one event.
    fn track(&self, name: &str, event: &AnalyticsEvent, properties: &Map<String, Value>);
}

/// Emit `event` on `sink`.
pub fn dispatch(
    sink: &dyn AnalyticsSink,
    analytics_id: &str,
    event: &AnalyticsEvent,
    properties: &Map<String, Value>,
) {
    let name = event.name(analytics_id);
    sink.track(&name, event, properties);
}

/// Sink that writes every event to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    fn track(&self, name: &str, _event: &AnalyticsEvent, properties: &Map<String, Value>) {
        let properties = Value::Object(properties.clone());
        tracing::info!(
            event = %name,
            properties = %properties,
            "analytics event"
        );
    }
}
