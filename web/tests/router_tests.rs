//! HTTP surface of the flow router.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use waypoint_core::{FlowDefinition, HandlerType, SessionId, StepAction};
use waypoint_testing::{init_test_tracing, InMemorySessionStore, RecordingAnalytics, RecordingRenderer, ScriptedStep};
use waypoint_web::{
    flow_router, AnalyticsContext, FlowAdapter, FlowConfig, FlowState, SESSION_COOKIE, SESSION_HEADER,
};

const NS: &str = "doc_auth";

struct App {
    router: Router,
    store: InMemorySessionStore,
    analytics: RecordingAnalytics,
    renderer: RecordingRenderer,
}

fn app(definition: FlowDefinition) -> App {
    init_test_tracing();
    let store = InMemorySessionStore::new();
    let analytics = RecordingAnalytics::new();
    let renderer = RecordingRenderer::new();

    let adapter = FlowAdapter::new(
        Arc::new(definition),
        FlowConfig::new(NS, "Doc Auth").with_final_url("/verify/done"),
        store.clone(),
    )
    .with_analytics(Arc::new(analytics.clone()));
    let state = FlowState::new(adapter).with_renderer(Arc::new(renderer.clone()));

    App {
        router: flow_router(state),
        store,
        analytics,
        renderer,
    }
}

fn welcome_then_ssn() -> FlowDefinition {
    FlowDefinition::builder(NS)
        .step("welcome", ScriptedStep::new("WelcomeStep"))
        .step("ssn", ScriptedStep::new("SsnStep").invalid("ssn", "Enter a nine digit SSN"))
        .action(
            "status",
            ScriptedStep::new("StatusAction")
                .leaves_incomplete()
                .renders_json(json!({ "state": "pending" }), 202),
        )
        .build()
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, format!("{SESSION_COOKIE}=abc"))
        .body(Body::empty())
        .unwrap()
}

fn post_form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::COOKIE, format!("{SESSION_COOKIE}=abc"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn location(response: &Response) -> &str {
    response.headers().get(header::LOCATION).unwrap().to_str().unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_missing_session_is_unauthorized() {
    let app = app(welcome_then_ssn());

    let request = Request::builder().uri("/welcome").body(Body::empty()).unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.store.is_empty().unwrap());
}

#[tokio::test]
async fn test_index_redirects_with_see_other() {
    let app = app(welcome_then_ssn());

    let response = app.router.oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/doc_auth/welcome");
}

#[tokio::test]
async fn test_show_renders_through_renderer() {
    let app = app(welcome_then_ssn());

    let response = app.router.oneshot(get("/welcome")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["template"], json!("doc_auth/welcome"));
    assert_eq!(app.renderer.last_view().unwrap().step, "welcome");
}

#[tokio::test]
async fn test_session_header_fallback() {
    let app = app(welcome_then_ssn());

    let request = Request::builder()
        .uri("/welcome")
        .header(SESSION_HEADER, "from-header")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let persisted = app.store.get(&SessionId::new("from-header"), NS).unwrap().unwrap();
    assert_eq!(persisted.step_counts.get("welcome", StepAction::Show), 1);
}

#[tokio::test]
async fn test_post_advances_and_redirects() {
    let app = app(welcome_then_ssn());

    let response = app.router.oneshot(post_form("/welcome", "")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/doc_auth/ssn");
    let persisted = app.store.get(&SessionId::new("abc"), NS).unwrap().unwrap();
    assert!(persisted.session.is_complete(&HandlerType::new("WelcomeStep")));
}

#[tokio::test]
async fn test_invalid_submission_renders_error() {
    let app = app(welcome_then_ssn());
    app.router.clone().oneshot(post_form("/welcome", "")).await.unwrap();

    let response = app.router.oneshot(post_form("/ssn", "ssn=123")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["locals"]["error_message"], json!("Enter a nine digit SSN"));
}

#[tokio::test]
async fn test_stale_get_is_redirected() {
    let app = app(welcome_then_ssn());

    let response = app.router.oneshot(get("/ssn")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/doc_auth/welcome");
    assert!(app.renderer.views().is_empty());
}

#[tokio::test]
async fn test_action_answers_json() {
    let app = app(welcome_then_ssn());

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/status")
        .header(SESSION_HEADER, "abc")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"poll":"1"}"#))
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(json_body(response).await, json!({ "state": "pending" }));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = app(welcome_then_ssn());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/welcome")
        .header(SESSION_HEADER, "abc")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.store.save_count(), 0);
}

#[tokio::test]
async fn test_step_failure_is_bad_gateway() {
    let definition = FlowDefinition::builder(NS)
        .step("document_capture", ScriptedStep::new("DocumentCaptureStep").fails("vendor timeout"))
        .build()
        .unwrap();
    let app = app(definition);

    let response = app.router.oneshot(post_form("/document_capture", "")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["code"], json!("STEP_FAILED"));
}

#[tokio::test]
async fn test_analytics_context_extension() {
    let app = app(welcome_then_ssn());

    let request = Request::builder()
        .uri("/welcome")
        .header(SESSION_HEADER, "abc")
        .extension(AnalyticsContext { irs_reproofing: true })
        .body(Body::empty())
        .unwrap();
    app.router.oneshot(request).await.unwrap();

    let visited = app.analytics.last_named("doc auth welcome visited").unwrap();
    assert_eq!(visited.properties["irs_reproofing"], json!(true));
}

#[tokio::test]
async fn test_rendered_page_omits_working_data() {
    init_test_tracing();
    let definition = FlowDefinition::builder(NS)
        .step("a", ScriptedStep::new("AStep").stores("pii_from_doc", "Susan Smith 1980-01-01"))
        .step("b", ScriptedStep::new("BStep"))
        .build()
        .unwrap();
    let adapter = FlowAdapter::new(Arc::new(definition), FlowConfig::new(NS, "Doc Auth"), InMemorySessionStore::new());
    let router = flow_router(FlowState::new(adapter));

    router.clone().oneshot(post_form("/a", "")).await.unwrap();
    let response = router.oneshot(get("/b")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(!body.contains("Susan Smith"), "working data leaked: {body}");
    assert!(!body.contains("flow_session"));
}

#[tokio::test]
async fn test_renderer_still_sees_flow_session() {
    let definition = FlowDefinition::builder(NS)
        .step("a", ScriptedStep::new("AStep").stores("pii_from_doc", "Susan Smith"))
        .step("b", ScriptedStep::new("BStep"))
        .build()
        .unwrap();
    let app = app(definition);

    app.router.clone().oneshot(post_form("/a", "")).await.unwrap();
    app.router.oneshot(get("/b")).await.unwrap();

    let view = app.renderer.last_view().unwrap();
    assert_eq!(view.flow_session.get::<String>("pii_from_doc"), Some("Susan Smith".to_string()));
}
