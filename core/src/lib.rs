//! # Waypoint Core
//!
//! A session-backed, step-based workflow engine for long multi-page
//! processes (document capture, identity resolution, account recovery).
//!
//! The engine resolves "which page comes next", enforces that steps are
//! visited in a legal order, tracks completion and instruments every
//! transition for analytics. It stays decoupled from what any individual
//! step actually does.
//!
//! ## Core Concepts
//!
//! - **FormResponse**: mergeable success/errors/extra outcome of validation and business logic
//! - **StepHandler**: validation (`form_submit`) plus business logic (`call`) for one page
//! - **FlowSession**: completion keyed by handler type, an error slot and working data
//! - **Flow**: an ordered step catalog bound to one request's session state
//! - **FlowPolicy**: optional graph-shaped resolver over declarative [`StepInfo`]
//!
//! HTTP integration lives in `waypoint-web`.
//!
//! ## Example
//!
//! ```
//! use waypoint_core::*;
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct Welcome;
//!
//! #[async_trait]
//! impl StepHandler for Welcome {
//!     fn handler_type(&self) -> HandlerType {
//!         HandlerType::new("WelcomeStep")
//!     }
//!
//!     async fn call(&self, step: &mut StepContext<'_>) -> anyhow::Result<CallResult> {
//!         step.mark_complete();
//!         Ok(CallResult::Empty)
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let definition = Arc::new(FlowDefinition::builder("doc_auth").step("welcome", Welcome).build()?);
//! let mut flow = Flow::new(definition, FlowSession::new(), Params::new());
//!
//! assert_eq!(flow.next_step(), Some(NextStep::Step("welcome".into())));
//! assert!(flow.handle("welcome").await?.is_success());
//! assert_eq!(flow.next_step(), None);
//! # Ok::<(), FlowError>(())
//! # }).unwrap();
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod analytics;
pub mod error;
pub mod flow;
pub mod form_response;
pub mod policy;
pub mod session;
pub mod step;
pub mod store;

pub use analytics::{dispatch, AnalyticsEvent, AnalyticsSink, TracingAnalytics};
pub use error::{FlowError, Result};
pub use flow::{Flow, FlowDefinition, FlowDefinitionBuilder, JsonResponse, NextStep, StepDefinition, StepIndicatorSteps};
pub use form_response::{FormResponse, MESSAGE_ERROR_KEY};
pub use policy::{FlowPolicy, NextLegalStep, Precondition, StepGraphPolicy, StepInfo, UndoStep};
pub use session::{
    FlowSession, HandlerType, PersistedFlow, SessionId, StepAction, StepActionCounts, StepCounts, FLOW_PATH_KEY,
};
pub use step::{acceptable_response_object, base_call, create_response, CallResult, Params, StepContext, StepHandler, VendorResponse};
pub use store::SessionStore;
