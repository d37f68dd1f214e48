//! Domain and transport error types.
//!
//! `ApiError` is defined here (not in `appraise-client`) so callers can
//! downcast the `anyhow::Error` coming out of an [`crate::traits::EvaluationApi`]
//! and classify failures without string matching.

use thiserror::Error;

use crate::lifecycle::WorkflowState;

/// Reason length bounds for signing with observation, in characters.
pub const OBSERVATION_REASON_MIN: usize = 50;
pub const OBSERVATION_REASON_MAX: usize = 500;

/// Errors produced by the evaluation domain itself.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A transition's precondition does not hold for the instance's
    /// current state. Duplicate invocations land here too.
    #[error("transition '{transition}' not allowed in state {state:?}")]
    InvalidTransition {
        transition: &'static str,
        state: WorkflowState,
    },

    /// The instance is signed; no further writes are accepted.
    #[error("evaluation {0} is finalized and can no longer be modified")]
    Finalized(u64),

    /// The instance has no structure snapshot, so it cannot be scored.
    #[error("evaluation {0} has no structure snapshot")]
    MissingSnapshot(u64),

    /// The two instances being compared do not share a structure.
    #[error("evaluations {auto_id} and {supervisor_id} do not share a structure snapshot")]
    SnapshotMismatch { auto_id: u64, supervisor_id: u64 },

    /// An answer refers to an indicator absent from the snapshot.
    #[error("indicator {0} does not exist in the structure snapshot")]
    UnknownIndicator(u64),

    /// Observation reason outside the [50, 500] character window.
    #[error(
        "observation reason must be between {OBSERVATION_REASON_MIN} and \
         {OBSERVATION_REASON_MAX} characters (got {0})"
    )]
    ReasonLength(usize),

    /// An answer autosave for this instance is still outstanding; the
    /// finalize/sign transition must wait for it.
    #[error("an answer autosave for evaluation {0} is still in flight")]
    AutosavePending(u64),
}

/// Errors from the remote evaluation API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the transition because the expected prior
    /// state does not hold (precondition failure, duplicate call).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authentication failed and the token refresh did not recover it.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The instance, template, or assignment detail was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ApiError {
    /// Returns `true` when the failure is a precondition conflict, i.e.
    /// the operation must not be blindly retried.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict(_))
    }

    /// Returns `true` if retrying without operator intervention is
    /// pointless (bad credentials, missing resource, conflict).
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ApiError::Conflict(_) | ApiError::AuthenticationFailed(_) | ApiError::NotFound(_)
        )
    }
}

/// Validate an observation reason against the character window.
pub fn validate_observation_reason(reason: &str) -> Result<(), EvalError> {
    let len = reason.trim().chars().count();
    if (OBSERVATION_REASON_MIN..=OBSERVATION_REASON_MAX).contains(&len) {
        Ok(())
    } else {
        Err(EvalError::ReasonLength(len))
    }
}
