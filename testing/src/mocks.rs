//! Mock collaborators for flow tests.
//!
//! - `InMemorySessionStore`: session store that JSON round-trips every save
//! - `RecordingAnalytics`: captures every analytics event
//! - `RecordingRenderer`: captures every rendered view

use axum::response::Response;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use waypoint_core::{AnalyticsEvent, AnalyticsSink, FlowError, PersistedFlow, Result, SessionId, SessionStore};
use waypoint_web::{AppError, JsonStepRenderer, StepRenderer, StepView};

type StoreKey = (SessionId, String);

fn lock_failed() -> FlowError {
    FlowError::SessionStore("Mutex lock failed".to_string())
}

/// In-memory session store.
///
/// Stores each flow as a JSON string, so anything that would not survive a
/// real session serializer fails here too.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    flows: Arc<Mutex<HashMap<StoreKey, String>>>,
    saves: Arc<AtomicUsize>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the persisted state of one flow (for testing).
    ///
    /// Does not count as a save.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned or `flow` cannot be serialized.
    pub fn seed(&self, session_id: &SessionId, namespace: &str, flow: &PersistedFlow) -> Result<()> {
        let json = serde_json::to_string(flow)?;
        self.flows
            .lock()
            .map_err(|_| lock_failed())?
            .insert((session_id.clone(), namespace.to_string()), json);
        Ok(())
    }

    /// Read the persisted state of one flow (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned or the stored JSON is invalid.
    pub fn get(&self, session_id: &SessionId, namespace: &str) -> Result<Option<PersistedFlow>> {
        let flows = self.flows.lock().map_err(|_| lock_failed())?;
        flows
            .get(&(session_id.clone(), namespace.to_string()))
            .map(|json| serde_json::from_str(json).map_err(FlowError::from))
            .transpose()
    }

    /// Number of stored flows (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.flows.lock().map_err(|_| lock_failed())?.len())
    }

    /// Whether nothing is stored (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of `save` calls so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self, session_id: &SessionId, namespace: &str) -> impl Future<Output = Result<Option<PersistedFlow>>> + Send {
        let result = self.get(session_id, namespace);
        async move { result }
    }

    fn save(
        &self,
        session_id: &SessionId,
        namespace: &str,
        flow: &PersistedFlow,
    ) -> impl Future<Output = Result<()>> + Send {
        let flows = Arc::clone(&self.flows);
        let saves = Arc::clone(&self.saves);
        let key = (session_id.clone(), namespace.to_string());
        let json = serde_json::to_string(flow);

        async move {
            let json = json?;
            flows.lock().map_err(|_| lock_failed())?.insert(key, json);
            saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn clear(&self, session_id: &SessionId, namespace: &str) -> impl Future<Output = Result<()>> + Send {
        let flows = Arc::clone(&self.flows);
        let key = (session_id.clone(), namespace.to_string());

        async move {
            flows.lock().map_err(|_| lock_failed())?.remove(&key);
            Ok(())
        }
    }
}

/// One captured analytics call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    /// Resolved event name
    pub name: String,
    /// Event descriptor
    pub event: AnalyticsEvent,
    /// Properties passed along
    pub properties: Map<String, Value>,
}

/// Analytics sink capturing every event.
#[derive(Debug, Clone, Default)]
pub struct RecordingAnalytics {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl RecordingAnalytics {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events captured so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Names of the events captured so far.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.name).collect()
    }

    /// Most recent event with `name`.
    #[must_use]
    pub fn last_named(&self, name: &str) -> Option<RecordedEvent> {
        self.events().into_iter().rev().find(|e| e.name == name)
    }
}

impl AnalyticsSink for RecordingAnalytics {
    fn track(&self, name: &str, event: &AnalyticsEvent, properties: &Map<String, Value>) {
        if let Ok(mut events) = self.events.lock() {
            events.push(RecordedEvent {
                name: name.to_string(),
                event: event.clone(),
                properties: properties.clone(),
            });
        }
    }
}

/// Renderer capturing every view, answering like [`JsonStepRenderer`].
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    views: Arc<Mutex<Vec<StepView>>>,
}

impl RecordingRenderer {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Views rendered so far, oldest first.
    #[must_use]
    pub fn views(&self) -> Vec<StepView> {
        self.views.lock().map(|views| views.clone()).unwrap_or_default()
    }

    /// Most recently rendered view.
    #[must_use]
    pub fn last_view(&self) -> Option<StepView> {
        self.views().pop()
    }
}

impl StepRenderer for RecordingRenderer {
    fn render(&self, view: &StepView) -> std::result::Result<Response, AppError> {
        self.views
            .lock()
            .map_err(|_| AppError::internal("Mutex lock failed"))?
            .push(view.clone());
        JsonStepRenderer.render(view)
    }
}
