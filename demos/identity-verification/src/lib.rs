//! Identity verification demo - a Waypoint flow served over HTTP
//!
//! The flow walks a user through four pages, with two page-less actions:
//!
//! ```text
//! welcome ──► document_capture ──► ssn ──► verify_wait ──► final URL
//!                                              ▲
//!                                  VerifyWaitProbe skips the page
//!                                  once the records check finished
//!
//! actions: cancel (redirects to the relying party)
//!          status (JSON answer for the wait page's poller)
//! ```
//!
//! Every route lives under `/verify`; sessions are identified by the
//! `waypoint_session` cookie or the `X-Session-ID` header.

pub mod config;
pub mod steps;

pub use config::DemoConfig;

use axum::Router;
use std::sync::Arc;
use steps::{
    CancelAction, DocumentCaptureStep, SsnStep, VerificationStatusAction, VerifyWaitProbe, VerifyWaitStep,
    WelcomeStep,
};
use waypoint_core::{FlowDefinition, Result, StepIndicatorSteps};
use waypoint_testing::InMemorySessionStore;
use waypoint_web::{flow_router, FlowAdapter, FlowConfig, FlowState};

/// Namespace the flow is mounted and persisted under.
pub const FLOW_NAMESPACE: &str = "verify";

/// Analytics id of the flow.
pub const ANALYTICS_ID: &str = "IdV";

/// Build the identity verification flow.
///
/// # Errors
///
/// Returns error if two steps or actions share a name.
pub fn identity_verification_flow(config: &DemoConfig) -> Result<FlowDefinition> {
    FlowDefinition::builder(FLOW_NAMESPACE)
        .step("welcome", WelcomeStep)
        .step("document_capture", DocumentCaptureStep)
        .step("ssn", SsnStep)
        .step("verify_wait", VerifyWaitStep)
        .action("cancel", CancelAction::new(config.cancel_url.clone()))
        .action("status", VerificationStatusAction)
        .optional_show_step("verify_wait", VerifyWaitProbe)
        .step_indicator(
            StepIndicatorSteps::new(["getting_started", "verify_id", "verify_info"])
                .with_alias("welcome", "getting_started")
                .with_alias("document_capture", "verify_id")
                .with_alias("ssn", "verify_info")
                .with_alias("verify_wait", "verify_info"),
        )
        .build()
}

/// Build the application router, mounting the flow under `/verify`.
///
/// Sessions are kept in memory and lost on restart.
///
/// # Errors
///
/// Returns error if the flow definition is invalid.
pub fn app(config: &DemoConfig) -> Result<Router> {
    let definition = identity_verification_flow(config)?;
    let flow_config = FlowConfig::new(FLOW_NAMESPACE, ANALYTICS_ID)
        .with_flow_type("idv")
        .with_final_url(config.final_url.clone());

    let adapter = FlowAdapter::new(Arc::new(definition), flow_config, InMemorySessionStore::new());

    Ok(Router::new().nest(&format!("/{FLOW_NAMESPACE}"), flow_router(FlowState::new(adapter))))
}
