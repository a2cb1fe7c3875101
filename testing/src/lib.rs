//! # Waypoint Testing
//!
//! Testing utilities for Waypoint flows.
//!
//! This crate provides:
//! - Mock collaborators: an in-memory session store, recording analytics
//!   sink and recording renderer
//! - `ScriptedStep`: a step handler scripted from tests, with call spies
//! - Property-based testing strategies for step catalogs
//!
//! ## Example
//!
//! ```ignore
//! use waypoint_testing::{InMemorySessionStore, RecordingAnalytics, ScriptedStep};
//!
//! #[tokio::test]
//! async fn test_welcome_advances() {
//!     let definition = FlowDefinition::builder("doc_auth")
//!         .step("welcome", ScriptedStep::new("WelcomeStep"))
//!         .step("ssn", ScriptedStep::new("SsnStep"))
//!         .build()?;
//!     let adapter = FlowAdapter::new(Arc::new(definition), config, InMemorySessionStore::new());
//!
//!     let response = adapter.update(request, "welcome").await?;
//!     assert_eq!(response.location(), Some("/doc_auth/ssn"));
//! }
//! ```

pub mod mocks;
pub mod scripted_step;
pub mod strategies;

pub use mocks::{InMemorySessionStore, RecordedEvent, RecordingAnalytics, RecordingRenderer};
pub use scripted_step::ScriptedStep;

/// Install a `tracing` subscriber writing to the test output.
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("waypoint_core=debug,waypoint_web=debug")),
        )
        .with_test_writer()
        .try_init();
}
