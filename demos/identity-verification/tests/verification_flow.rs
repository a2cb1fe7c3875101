//! End-to-end walk through the identity verification flow.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use identity_verification::{app, DemoConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

const SESSION: &str = "X-Session-ID";

fn router() -> Router {
    app(&DemoConfig::default()).unwrap()
}

async fn get(router: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .uri(uri)
        .header(SESSION, "walkthrough")
        .body(Body::empty())
        .unwrap();
    router.clone().oneshot(request).await.unwrap()
}

async fn post(router: &Router, uri: &str, form: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(SESSION, "walkthrough")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap();
    router.clone().oneshot(request).await.unwrap()
}

fn location(response: &Response) -> String {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    response.headers().get(header::LOCATION).unwrap().to_str().unwrap().to_string()
}

async fn body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn error_message(response: Response) -> Value {
    assert_eq!(response.status(), StatusCode::OK);
    body(response).await["locals"]["error_message"].clone()
}

#[tokio::test]
async fn test_full_walkthrough() {
    let router = router();

    assert_eq!(location(&get(&router, "/verify").await), "/verify/welcome");

    let welcome = get(&router, "/verify/welcome").await;
    let locals = body(welcome).await["locals"].clone();
    assert_eq!(locals["sp_name"], json!("Example Agency"));
    assert_eq!(locals["step_indicator"]["current_step"], json!("getting_started"));

    assert_eq!(
        error_message(post(&router, "/verify/welcome", "").await).await,
        json!("You must agree to continue")
    );
    assert_eq!(
        location(&post(&router, "/verify/welcome", "ial2_consent_given=true").await),
        "/verify/document_capture"
    );

    assert_eq!(
        error_message(post(&router, "/verify/document_capture", "front=glare&back=id-back").await).await,
        json!("We couldn't read your ID. Try taking a new picture.")
    );
    assert_eq!(
        location(&post(&router, "/verify/document_capture", "front=id-front&back=id-back").await),
        "/verify/ssn"
    );

    assert_eq!(
        error_message(post(&router, "/verify/ssn", "ssn=123").await).await,
        json!("Enter a nine-digit Social Security number")
    );
    assert_eq!(
        location(&post(&router, "/verify/ssn", "ssn=123-45-6789").await),
        "/verify/verify_wait"
    );

    // First poll: the records check is still running
    let wait = get(&router, "/verify/verify_wait").await;
    assert_eq!(wait.status(), StatusCode::OK);

    let status = post(&router, "/verify/status", "").await;
    assert_eq!(status.status(), StatusCode::ACCEPTED);
    assert_eq!(body(status).await, json!({ "state": "pending", "polls": 1 }));

    // Second poll finishes the check and skips the page
    assert_eq!(location(&get(&router, "/verify/verify_wait").await), "/account");
    assert_eq!(location(&get(&router, "/verify").await), "/account");

    let status = post(&router, "/verify/status", "").await;
    assert_eq!(status.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_going_back_is_redirected_forward() {
    let router = router();
    post(&router, "/verify/welcome", "ial2_consent_given=true").await;

    assert_eq!(location(&get(&router, "/verify/welcome").await), "/verify/document_capture");
    assert_eq!(location(&get(&router, "/verify/ssn").await), "/verify/document_capture");
}

#[tokio::test]
async fn test_cancel_returns_to_relying_party_and_restarts() {
    let router = router();
    post(&router, "/verify/welcome", "ial2_consent_given=true").await;

    let cancel = post(&router, "/verify/cancel", "").await;
    assert_eq!(location(&cancel), DemoConfig::default().cancel_url);

    assert_eq!(location(&get(&router, "/verify").await), "/verify/welcome");
}
