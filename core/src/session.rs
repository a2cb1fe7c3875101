//! Session-persisted flow state.
//!
//! Everything in this module is plain `serde` data: the caller's session store
//! owns persistence, the engine only reads and mutates these values during a
//! request.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Working-data key holding the flow path (`standard`, `hybrid`, ...).
pub const FLOW_PATH_KEY: &str = "flow_path";

/// Stable identity of a step handler type.
///
/// Completion is recorded against this identity, not against the step name.
/// Rebinding a step name to a handler with a different identity therefore
/// leaves any completion recorded under the old identity orphaned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerType(String);

impl HandlerType {
    /// Create a handler identity.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The identity as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HandlerType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Identifier of the caller's session (typically a cookie value).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Create a session identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-flow completion map, error slot and working data.
///
/// Absence of a handler type in the completion map means "incomplete".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowSession {
    #[serde(default)]
    completed: BTreeMap<HandlerType, bool>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    data: Map<String, Value>,
}

impl FlowSession {
    /// Create an empty flow session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether steps handled by `handler_type` are complete.
    #[must_use]
    pub fn is_complete(&self, handler_type: &HandlerType) -> bool {
        self.completed.get(handler_type).copied().unwrap_or(false)
    }

    /// Record completion for `handler_type`.
    pub fn mark_complete(&mut self, handler_type: HandlerType) {
        self.completed.insert(handler_type, true);
    }

    /// Forget completion for `handler_type`.
    ///
    /// Removes the key entirely, so complete-then-incomplete is
    /// indistinguishable from never having been complete.
    pub fn mark_incomplete(&mut self, handler_type: &HandlerType) {
        self.completed.remove(handler_type);
    }

    /// The raw completion map.
    #[must_use]
    pub const fn completed(&self) -> &BTreeMap<HandlerType, bool> {
        &self.completed
    }

    /// Error message left by the last failed validation.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Replace the error message.
    pub fn set_error_message(&mut self, message: Option<String>) {
        self.error_message = message;
    }

    /// Clear the error message.
    pub fn clear_error_message(&mut self) {
        self.error_message = None;
    }

    /// Read a working value, decoding it into `T`.
    ///
    /// Returns `None` when the key is absent or holds an incompatible value.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Raw working value.
    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Store a working value.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Serialization`](crate::FlowError::Serialization)
    /// if `value` cannot be represented as JSON.
    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> Result<()> {
        self.data.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Remove a working value, returning it.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Whether a working value is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Flow path recorded by the steps, if any.
    #[must_use]
    pub fn flow_path(&self) -> Option<&str> {
        self.data.get(FLOW_PATH_KEY).and_then(Value::as_str)
    }
}

/// HTTP action a step counter is kept for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// GET of a step page
    Show,
    /// Submission of a step
    Update,
}

impl StepAction {
    /// Lowercase name used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Show => "show",
            Self::Update => "update",
        }
    }
}

/// Visit and submit counts for one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepActionCounts {
    /// Number of times the step was shown
    #[serde(default)]
    pub show: u64,
    /// Number of times the step was submitted
    #[serde(default)]
    pub update: u64,
}

/// Per-(step, action) counters for one flow.
///
/// Unknown steps count as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepCounts(BTreeMap<String, StepActionCounts>);

impl StepCounts {
    /// Create empty counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count for `(step, action)`.
    #[must_use]
    pub fn get(&self, step: &str, action: StepAction) -> u64 {
        self.0.get(step).map_or(0, |counts| match action {
            StepAction::Show => counts.show,
            StepAction::Update => counts.update,
        })
    }

    /// Increment the count for `(step, action)` and return the new value.
    pub fn increment(&mut self, step: &str, action: StepAction) -> u64 {
        let counts = self.0.entry(step.to_string()).or_default();
        let slot = match action {
            StepAction::Show => &mut counts.show,
            StepAction::Update => &mut counts.update,
        };
        *slot = slot.saturating_add(1);
        *slot
    }
}

/// Everything persisted for one flow in the caller's session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedFlow {
    /// Completion and working data
    #[serde(default)]
    pub session: FlowSession,
    /// Visit/submit counters
    #[serde(default)]
    pub step_counts: StepCounts,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_then_incomplete_removes_key() {
        let handler = HandlerType::new("ssn");
        let mut session = FlowSession::new();

        session.mark_complete(handler.clone());
        assert!(session.is_complete(&handler));

        session.mark_incomplete(&handler);
        assert!(!session.is_complete(&handler));
        assert_eq!(session, FlowSession::new());
    }

    #[test]
    fn test_working_data_roundtrip() {
        let mut session = FlowSession::new();
        session.insert("pii_from_doc", &vec!["Susan".to_string()]).unwrap();
        session.insert(FLOW_PATH_KEY, &"hybrid").unwrap();

        assert_eq!(session.get::<Vec<String>>("pii_from_doc"), Some(vec!["Susan".to_string()]));
        assert_eq!(session.get::<u32>("pii_from_doc"), None);
        assert_eq!(session.flow_path(), Some("hybrid"));

        assert!(session.remove("pii_from_doc").is_some());
        assert!(!session.contains("pii_from_doc"));
    }

    #[test]
    fn test_step_counts_default_to_zero() {
        let mut counts = StepCounts::new();
        assert_eq!(counts.get("welcome", StepAction::Show), 0);

        assert_eq!(counts.increment("welcome", StepAction::Show), 1);
        assert_eq!(counts.increment("welcome", StepAction::Show), 2);
        assert_eq!(counts.increment("welcome", StepAction::Update), 1);

        assert_eq!(counts.get("welcome", StepAction::Show), 2);
        assert_eq!(counts.get("agreement", StepAction::Update), 0);
    }

    #[test]
    fn test_persisted_flow_serializes_completion_by_handler_type() {
        let mut persisted = PersistedFlow::default();
        persisted.session.mark_complete(HandlerType::new("WelcomeStep"));

        let json = serde_json::to_value(&persisted).unwrap();
        assert_eq!(json["session"]["completed"]["WelcomeStep"], serde_json::json!(true));

        let back: PersistedFlow = serde_json::from_value(json).unwrap();
        assert_eq!(back, persisted);
    }
}
