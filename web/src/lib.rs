//! Axum integration for Waypoint flows.
//!
//! This crate binds a [`FlowDefinition`](waypoint_core::FlowDefinition) to the
//! HTTP request/response cycle.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Axum shell (handlers)           │  ← cookies, forms, JSON
//! │  - session id / params extraction       │  ← 303 redirects
//! │  - FlowResponse → HTTP                  │  ← StepRenderer
//! ├─────────────────────────────────────────┤
//! │         FlowAdapter                     │
//! │  - index / show / update / reset        │  ← analytics, metrics
//! │  - stale-state correction               │  ← step counters
//! │  - optional show steps                  │
//! ├─────────────────────────────────────────┤
//! │         waypoint-core Flow              │  ← next step, handle
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives at a flow handler
//! 2. **Extract** session id, analytics context and parameters
//! 3. **Load** the persisted flow from the [`SessionStore`](waypoint_core::SessionStore)
//! 4. **Resolve** the current step; redirect if the client is stale
//! 5. **Handle** the step and emit analytics
//! 6. **Save** completion, working data and counters
//! 7. **Answer** with a redirect, a rendered page or a JSON body
//!
//! # Example
//!
//! ```ignore
//! use waypoint_web::{flow_router, FlowAdapter, FlowConfig, FlowState};
//!
//! let config = FlowConfig::new("verify", "IdV").with_final_url("/account");
//! let adapter = FlowAdapter::new(definition, config, store);
//!
//! let app = Router::new().nest("/verify", flow_router(FlowState::new(adapter)));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod render;
pub mod response;
pub mod router;
pub mod state;
pub mod state_machine;

pub use config::{FlowConfig, StepUrlBuilder};
pub use error::AppError;
pub use extractors::{AnalyticsContext, FlowSessionId, FormParams, SESSION_COOKIE, SESSION_HEADER};
pub use render::{JsonStepRenderer, StepRenderer};
pub use response::{FlowResponse, StepView};
pub use router::flow_router;
pub use state::FlowState;
pub use state_machine::{FlowAdapter, FlowRequest};
