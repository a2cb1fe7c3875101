//! Step handlers of the identity verification flow.
//!
//! Document checks and record verification are simulated; the handlers show
//! how real ones would read parameters, record working data, and steer the
//! flow.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use waypoint_core::{
    AnalyticsEvent, CallResult, FormResponse, HandlerType, StepContext, StepHandler, VendorResponse, FLOW_PATH_KEY,
};

/// Working-data key: the document images were accepted.
pub const DOCUMENT_ACCEPTED_KEY: &str = "document_accepted";
/// Working-data key: last four digits of the submitted SSN.
pub const SSN_LAST4_KEY: &str = "ssn_last4";
/// Working-data key: how often the verification status was polled.
pub const VERIFICATION_POLLS_KEY: &str = "verification_polls";
/// Working-data key: the records check came back clean.
pub const VERIFIED_KEY: &str = "verified";

/// Polls after which the simulated records check completes.
pub const POLLS_UNTIL_VERIFIED: u64 = 2;

/// Landing page; accepting it starts the flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct WelcomeStep;

#[async_trait]
impl StepHandler for WelcomeStep {
    fn handler_type(&self) -> HandlerType {
        HandlerType::new("WelcomeStep")
    }

    fn form_submit(&self, step: &StepContext<'_>) -> FormResponse {
        if step.param("ial2_consent_given") == Some("true") {
            FormResponse::success()
        } else {
            FormResponse::failure().with_error("ial2_consent_given", "You must agree to continue")
        }
    }

    async fn call(&self, step: &mut StepContext<'_>) -> anyhow::Result<CallResult> {
        step.flow_session_mut().insert(FLOW_PATH_KEY, &"standard")?;
        step.mark_complete();
        Ok(CallResult::Empty)
    }

    fn extra_view_variables(&self, _step: &StepContext<'_>) -> Map<String, Value> {
        let mut locals = Map::new();
        locals.insert("sp_name".to_string(), json!("Example Agency"));
        locals
    }
}

/// Outcome of the simulated document authentication vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentAuthResult {
    glare_on: Option<&'static str>,
}

impl DocumentAuthResult {
    /// Inspect the submitted image references. An image named `glare` fails.
    #[must_use]
    pub fn inspect(front: &str, back: &str) -> Self {
        let glare_on = if front == "glare" {
            Some("front")
        } else if back == "glare" {
            Some("back")
        } else {
            None
        };
        Self { glare_on }
    }
}

impl VendorResponse for DocumentAuthResult {
    fn is_success(&self) -> bool {
        self.glare_on.is_none()
    }

    fn errors(&self) -> Vec<(String, String)> {
        self.glare_on
            .map(|side| vec![(side.to_string(), "We couldn't read your ID. Try taking a new picture.".to_string())])
            .unwrap_or_default()
    }

    fn extra(&self) -> Map<String, Value> {
        let mut extra = Map::new();
        extra.insert("vendor".to_string(), json!("mock_doc_auth"));
        extra
    }
}

/// Front and back images of a state ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentCaptureStep;

#[async_trait]
impl StepHandler for DocumentCaptureStep {
    fn handler_type(&self) -> HandlerType {
        HandlerType::new("DocumentCaptureStep")
    }

    fn form_submit(&self, step: &StepContext<'_>) -> FormResponse {
        let missing: Vec<&str> = ["front", "back"]
            .into_iter()
            .filter(|side| step.param(side).is_none_or(str::is_empty))
            .collect();
        missing
            .iter()
            .fold(FormResponse::new(missing.is_empty()), |response, side| {
                response.with_error(*side, format!("Add the {side} of your ID"))
            })
    }

    async fn call(&self, step: &mut StepContext<'_>) -> anyhow::Result<CallResult> {
        let result = DocumentAuthResult::inspect(
            step.param("front").unwrap_or_default(),
            step.param("back").unwrap_or_default(),
        );

        if result.is_success() {
            step.flow_session_mut().insert(DOCUMENT_ACCEPTED_KEY, &true)?;
            step.mark_complete();
        } else {
            tracing::info!(step = step.step_name(), "document rejected by vendor");
        }
        Ok(CallResult::Vendor(Box::new(result)))
    }

    fn analytics_submitted_event(&self, _step: &str) -> AnalyticsEvent {
        AnalyticsEvent::Named("IdV: doc auth image upload vendor submitted".to_string())
    }
}

/// Social Security number entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct SsnStep;

impl SsnStep {
    fn digits(step: &StepContext<'_>) -> Option<String> {
        let digits: String = step
            .param("ssn")?
            .chars()
            .filter(|c| !matches!(c, '-' | ' '))
            .collect();
        (digits.len() == 9 && digits.chars().all(|c| c.is_ascii_digit())).then_some(digits)
    }
}

#[async_trait]
impl StepHandler for SsnStep {
    fn handler_type(&self) -> HandlerType {
        HandlerType::new("SsnStep")
    }

    fn form_submit(&self, step: &StepContext<'_>) -> FormResponse {
        if Self::digits(step).is_some() {
            FormResponse::success()
        } else {
            FormResponse::failure()
                .with_error("ssn", "Enter a nine-digit Social Security number")
                .with_error_detail("ssn", "invalid")
        }
    }

    async fn call(&self, step: &mut StepContext<'_>) -> anyhow::Result<CallResult> {
        let digits = Self::digits(step).unwrap_or_default();
        let last4 = digits.get(5..).unwrap_or_default().to_string();

        let session = step.flow_session_mut();
        session.insert(SSN_LAST4_KEY, &last4)?;
        session.insert(VERIFICATION_POLLS_KEY, &0_u64)?;
        session.remove(VERIFIED_KEY);
        step.mark_complete();
        Ok(CallResult::Empty)
    }
}

/// Interstitial shown while the records check runs.
///
/// Submitting it only succeeds once the check has finished.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyWaitStep;

#[async_trait]
impl StepHandler for VerifyWaitStep {
    fn handler_type(&self) -> HandlerType {
        HandlerType::new("VerifyWaitStep")
    }

    async fn call(&self, step: &mut StepContext<'_>) -> anyhow::Result<CallResult> {
        if step.flow_session().get::<bool>(VERIFIED_KEY).unwrap_or(false) {
            step.mark_complete();
            return Ok(CallResult::Empty);
        }
        Ok(CallResult::Form(
            FormResponse::failure().with_error("base", "We are still verifying your information"),
        ))
    }
}

/// Optional show step guarding `verify_wait`: polls the records check and
/// skips the interstitial once it is done.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyWaitProbe;

#[async_trait]
impl StepHandler for VerifyWaitProbe {
    fn handler_type(&self) -> HandlerType {
        HandlerType::new("VerifyWaitProbe")
    }

    async fn call(&self, step: &mut StepContext<'_>) -> anyhow::Result<CallResult> {
        let session = step.flow_session_mut();
        let polls = session.get::<u64>(VERIFICATION_POLLS_KEY).unwrap_or(0).saturating_add(1);
        session.insert(VERIFICATION_POLLS_KEY, &polls)?;

        if polls < POLLS_UNTIL_VERIFIED {
            return Ok(CallResult::Form(FormResponse::success().with_extra("polls", polls)));
        }

        session.insert(VERIFIED_KEY, &true)?;
        step.mark_step_complete("verify_wait");
        Ok(CallResult::Form(
            FormResponse::success().with_extra("polls", polls).with_extra("verified", true),
        ))
    }
}

/// Leave the flow and go back to the relying party.
#[derive(Debug, Clone)]
pub struct CancelAction {
    return_url: String,
}

impl CancelAction {
    /// Cancel to `return_url`.
    #[must_use]
    pub fn new(return_url: impl Into<String>) -> Self {
        Self {
            return_url: return_url.into(),
        }
    }
}

#[async_trait]
impl StepHandler for CancelAction {
    fn handler_type(&self) -> HandlerType {
        HandlerType::new("CancelAction")
    }

    async fn call(&self, step: &mut StepContext<'_>) -> anyhow::Result<CallResult> {
        for step_name in ["welcome", "document_capture", "ssn", "verify_wait"] {
            step.mark_step_incomplete(step_name);
        }
        let session = step.flow_session_mut();
        for key in [DOCUMENT_ACCEPTED_KEY, SSN_LAST4_KEY, VERIFICATION_POLLS_KEY, VERIFIED_KEY] {
            session.remove(key);
        }
        step.redirect_to(&self.return_url);
        Ok(CallResult::Empty)
    }
}

/// JSON status endpoint polled by the wait page.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerificationStatusAction;

#[async_trait]
impl StepHandler for VerificationStatusAction {
    fn handler_type(&self) -> HandlerType {
        HandlerType::new("VerificationStatusAction")
    }

    async fn call(&self, step: &mut StepContext<'_>) -> anyhow::Result<CallResult> {
        let session = step.flow_session();
        let verified = session.get::<bool>(VERIFIED_KEY).unwrap_or(false);
        let polls = session.get::<u64>(VERIFICATION_POLLS_KEY).unwrap_or(0);

        let (state, status) = if verified { ("verified", 200) } else { ("pending", 202) };
        step.render_json(json!({ "state": state, "polls": polls }), status);
        Ok(CallResult::Empty)
    }
}
