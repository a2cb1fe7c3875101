//! Flow engine behaviour: next-step resolution, handling, completion.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect
#![allow(clippy::panic)]

use proptest::prelude::*;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use waypoint_core::{
    Flow, FlowDefinition, FlowError, FlowSession, HandlerType, NextStep, Params, MESSAGE_ERROR_KEY,
};
use waypoint_testing::strategies::steps_with_completion;
use waypoint_testing::ScriptedStep;

fn three_step_flow() -> Arc<FlowDefinition> {
    Arc::new(
        FlowDefinition::builder("doc_auth")
            .step("a", ScriptedStep::new("AStep"))
            .step("b", ScriptedStep::new("BStep"))
            .step("c", ScriptedStep::new("CStep"))
            .build()
            .unwrap(),
    )
}

fn step(name: &str) -> Option<NextStep> {
    Some(NextStep::Step(name.to_string()))
}

proptest! {
    #[test]
    fn test_next_step_is_first_incomplete((names, completed) in steps_with_completion(8)) {
        let definition = names
            .iter()
            .fold(FlowDefinition::builder("generated"), |builder, name| {
                builder.step(name.as_str(), ScriptedStep::new(name))
            })
            .build()
            .unwrap();

        let mut session = FlowSession::new();
        for index in &completed {
            session.mark_complete(HandlerType::new(names[*index].as_str()));
        }

        let flow = Flow::new(Arc::new(definition), session, Params::new());
        let expected = names
            .iter()
            .enumerate()
            .find(|(i, _)| !completed.contains(i))
            .map(|(_, name)| NextStep::Step(name.clone()));

        prop_assert_eq!(flow.next_step(), expected);
    }

    #[test]
    fn test_unknown_step_never_errors((names, completed) in steps_with_completion(5)) {
        prop_assume!(!names.iter().any(|n| n == "nonexistent"));

        let definition = names
            .iter()
            .fold(FlowDefinition::builder("generated"), |builder, name| {
                builder.step(name.as_str(), ScriptedStep::new(name))
            })
            .build()
            .unwrap();
        let mut session = FlowSession::new();
        for index in &completed {
            session.mark_complete(HandlerType::new(names[*index].as_str()));
        }
        let before = session.completed().clone();

        let mut flow = Flow::new(Arc::new(definition), session, Params::new());
        let response = tokio_test::block_on(flow.handle("nonexistent")).unwrap();

        prop_assert!(!response.is_success());
        prop_assert_eq!(
            response.first_error_message(Some(MESSAGE_ERROR_KEY)),
            Some("Unhandled step nonexistent")
        );
        prop_assert_eq!(flow.flow_session().completed(), &before);
    }
}

#[tokio::test]
async fn test_scenario_a_three_step_progression() {
    let mut flow = Flow::new(three_step_flow(), FlowSession::new(), Params::new());
    assert_eq!(flow.next_step(), step("a"));

    flow.flow_session_mut().mark_complete(HandlerType::new("AStep"));
    assert_eq!(flow.next_step(), step("b"));

    assert!(flow.handle("b").await.unwrap().is_success());
    assert!(flow.handle("c").await.unwrap().is_success());
    assert_eq!(flow.next_step(), None);
}

#[tokio::test]
async fn test_invalid_form_skips_business_logic() {
    let b = ScriptedStep::new("BStep").invalid("base", "bad value").stores("touched", true);
    let calls = b.call_counter();
    let definition = Arc::new(
        FlowDefinition::builder("doc_auth")
            .step("a", ScriptedStep::new("AStep"))
            .step("b", b)
            .build()
            .unwrap(),
    );
    let mut session = FlowSession::new();
    session.mark_complete(HandlerType::new("AStep"));
    let mut flow = Flow::new(definition, session, Params::new());

    let response = flow.handle("b").await.unwrap();

    assert!(!response.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(flow.flow_session().error_message(), Some("bad value"));
    assert!(!flow.flow_session().is_complete(&HandlerType::new("BStep")));
    assert!(!flow.flow_session().contains("touched"));
    assert_eq!(flow.next_step(), step("b"));
}

#[tokio::test]
async fn test_handle_clears_previous_error_message() {
    let mut session = FlowSession::new();
    session.set_error_message(Some("stale".into()));
    let mut flow = Flow::new(three_step_flow(), session, Params::new());

    flow.handle("a").await.unwrap();

    assert_eq!(flow.flow_session().error_message(), None);
}

#[tokio::test]
async fn test_step_can_mark_other_steps() {
    let definition = Arc::new(
        FlowDefinition::builder("doc_auth")
            .step("a", ScriptedStep::new("AStep").completes("b"))
            .step("b", ScriptedStep::new("BStep"))
            .step("c", ScriptedStep::new("CStep").uncompletes("b").leaves_incomplete())
            .build()
            .unwrap(),
    );
    let mut flow = Flow::new(definition, FlowSession::new(), Params::new());

    flow.handle("a").await.unwrap();
    assert_eq!(flow.next_step(), step("c"));

    flow.handle("c").await.unwrap();
    assert_eq!(flow.next_step(), step("b"));
    assert!(!flow.flow_session().completed().contains_key(&HandlerType::new("BStep")));
}

#[tokio::test]
async fn test_marking_unknown_step_records_nothing() {
    let definition = Arc::new(
        FlowDefinition::builder("doc_auth")
            .step("a", ScriptedStep::new("AStep").completes("nonexistent"))
            .build()
            .unwrap(),
    );
    let mut flow = Flow::new(definition, FlowSession::new(), Params::new());

    flow.handle("a").await.unwrap();

    assert_eq!(flow.flow_session().completed().len(), 1);
}

#[tokio::test]
async fn test_business_logic_errors_propagate() {
    let definition = Arc::new(
        FlowDefinition::builder("doc_auth")
            .step("document_capture", ScriptedStep::new("DocumentCaptureStep").fails("vendor timeout"))
            .build()
            .unwrap(),
    );
    let mut flow = Flow::new(definition, FlowSession::new(), Params::new());

    let err = flow.handle("document_capture").await.unwrap_err();

    assert!(err.is_step_failure());
    match err {
        FlowError::Step { step, source } => {
            assert_eq!(step, "document_capture");
            assert_eq!(source.to_string(), "vendor timeout");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_redirect_override_takes_precedence() {
    let definition = Arc::new(
        FlowDefinition::builder("doc_auth")
            .step("a", ScriptedStep::new("AStep").leaves_incomplete().redirects_to("https://sp.example.com/cancel"))
            .step("b", ScriptedStep::new("BStep"))
            .build()
            .unwrap(),
    );
    let mut flow = Flow::new(definition, FlowSession::new(), Params::new());

    flow.handle("a").await.unwrap();

    assert_eq!(flow.next_step(), Some(NextStep::Url("https://sp.example.com/cancel".into())));
}

#[tokio::test]
async fn test_json_override_is_recorded() {
    let definition = Arc::new(
        FlowDefinition::builder("doc_auth")
            .step("a", ScriptedStep::new("AStep"))
            .action("status", ScriptedStep::new("StatusAction").renders_json(json!({ "ready": false }), 202))
            .build()
            .unwrap(),
    );
    let mut flow = Flow::new(definition, FlowSession::new(), Params::new());

    flow.handle("status").await.unwrap();

    let json = flow.json_response().unwrap();
    assert_eq!(json.status, 202);
    assert_eq!(json.body, json!({ "ready": false }));
}

#[tokio::test]
async fn test_call_result_is_merged() {
    let definition = Arc::new(
        FlowDefinition::builder("doc_auth")
            .step(
                "a",
                ScriptedStep::new("AStep").returns(
                    waypoint_core::FormResponse::failure()
                        .with_error("front", "glare")
                        .with_extra("vendor", "acuant"),
                ),
            )
            .build()
            .unwrap(),
    );
    let mut flow = Flow::new(definition, FlowSession::new(), Params::new());

    let response = flow.handle("a").await.unwrap();

    assert!(!response.is_success());
    assert_eq!(response.first_error_message(None), Some("glare"));
    assert_eq!(response.extra().get("vendor"), Some(&json!("acuant")));
    assert_eq!(flow.next_step(), step("a"));
}

#[tokio::test]
async fn test_extra_view_variables() {
    let definition = Arc::new(
        FlowDefinition::builder("doc_auth")
            .step("a", ScriptedStep::new("AStep").with_view_variable("sp_name", "Example Agency"))
            .build()
            .unwrap(),
    );
    let mut flow = Flow::new(definition, FlowSession::new(), Params::new());

    assert_eq!(flow.extra_view_variables("a").get("sp_name"), Some(&json!("Example Agency")));
    assert!(flow.extra_view_variables("nonexistent").is_empty());
}

#[tokio::test]
async fn test_optional_show_step_probe() {
    let probe = ScriptedStep::new("VerifyWaitProbe").completes("verify_wait").leaves_incomplete();
    let probe_calls = probe.call_counter();
    let definition = Arc::new(
        FlowDefinition::builder("doc_auth")
            .step("verify_wait", ScriptedStep::new("VerifyWaitStep"))
            .step("phone", ScriptedStep::new("PhoneStep"))
            .optional_show_step("verify_wait", probe)
            .build()
            .unwrap(),
    );
    let mut flow = Flow::new(definition, FlowSession::new(), Params::new());

    assert!(flow.probe_optional_step("phone").await.unwrap().is_none());
    assert_eq!(probe_calls.load(Ordering::SeqCst), 0);

    let result = flow.probe_optional_step("verify_wait").await.unwrap().unwrap();
    assert!(result.is_success());
    assert_eq!(probe_calls.load(Ordering::SeqCst), 1);
    assert_eq!(flow.next_step(), step("phone"));
}

// Completion is recorded against the handler type. Rebinding a step name to
// a different handler type orphans what was recorded under the old one.
#[tokio::test]
async fn test_rebinding_step_to_new_handler_type_orphans_completion() {
    let before = three_step_flow();
    let mut flow = Flow::new(before, FlowSession::new(), Params::new());
    flow.handle("a").await.unwrap();
    assert_eq!(flow.next_step(), step("b"));
    let session = flow.into_session();

    let after = Arc::new(
        FlowDefinition::builder("doc_auth")
            .step("a", ScriptedStep::new("ARedesignedStep"))
            .step("b", ScriptedStep::new("BStep"))
            .step("c", ScriptedStep::new("CStep"))
            .build()
            .unwrap(),
    );
    let flow = Flow::new(after, session, Params::new());

    assert_eq!(flow.next_step(), step("a"));
    assert!(flow.flow_session().is_complete(&HandlerType::new("AStep")));
}

#[tokio::test]
async fn test_shared_handler_type_completes_both_steps() {
    let definition = Arc::new(
        FlowDefinition::builder("doc_auth")
            .step("front", ScriptedStep::new("UploadStep"))
            .step("back", ScriptedStep::new("UploadStep"))
            .step("ssn", ScriptedStep::new("SsnStep"))
            .build()
            .unwrap(),
    );
    let mut flow = Flow::new(definition, FlowSession::new(), Params::new());

    flow.handle("front").await.unwrap();

    assert_eq!(flow.next_step(), step("ssn"));
}
