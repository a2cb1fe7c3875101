//! Error types for flow execution and persistence.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Failures the engine surfaces to its caller.
///
/// Recoverable user-facing conditions (validation failures, unknown step
/// names, stale client state) are *not* errors: they travel as failed
/// [`FormResponse`](crate::FormResponse) values or as redirects. This enum
/// only carries conditions the wrapping error layer has to deal with.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Step business logic failed.
    ///
    /// The engine never retries or swallows these.
    #[error("step `{step}` failed: {source}")]
    Step {
        /// Name of the step whose `call` failed
        step: String,
        /// Underlying failure reported by the step
        #[source]
        source: anyhow::Error,
    },

    /// A flow definition declared the same name twice.
    #[error("duplicate step name `{0}` in flow definition")]
    DuplicateStep(String),

    /// The caller-supplied session store failed.
    #[error("session store error: {0}")]
    SessionStore(String),

    /// Flow state could not be encoded or decoded.
    #[error("failed to serialize flow state: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlowError {
    /// Returns `true` if the failure originated in step business logic.
    ///
    /// # Examples
    ///
    /// ```
    /// # use waypoint_core::FlowError;
    /// let err = FlowError::Step { step: "ssn".into(), source: anyhow::anyhow!("vendor down") };
    /// assert!(err.is_step_failure());
    /// assert!(!FlowError::DuplicateStep("ssn".into()).is_step_failure());
    /// ```
    #[must_use]
    pub const fn is_step_failure(&self) -> bool {
        matches!(self, Self::Step { .. })
    }
}
