//! Lifecycle transition orchestration.
//!
//! One method per named transition, client-side pre-flight validation,
//! the composite feedback-and-close operation with explicit partial
//! success, and the autosave sequencing gate: no finalize or signature
//! call may be issued while an answer autosave for the same instance is
//! still outstanding.
//!
//! No transition is retried automatically — the calls are not proven
//! idempotent, and the server rejects duplicates with a conflict.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tracing::instrument;

use appraise_core::error::{validate_observation_reason, EvalError};
use appraise_core::instance::Instance;
use appraise_core::model::Answer;
use appraise_core::traits::EvaluationApi;

/// Outcome of the composite feedback-then-close transition.
///
/// The two remote mutations are not wrapped in a server transaction; if
/// the close fails after the feedback succeeded, the caller gets both
/// outcomes and can retry just the remaining half.
#[derive(Debug)]
pub enum FeedbackAndCloseOutcome {
    /// Both steps succeeded.
    Closed(Instance),
    /// Feedback was recorded but the close failed; the instance carries
    /// the state after step one only.
    FeedbackOnly {
        instance: Instance,
        close_error: anyhow::Error,
    },
}

/// Orchestrates lifecycle transitions against an [`EvaluationApi`].
pub struct FlowActions {
    api: Arc<dyn EvaluationApi>,
    /// Outstanding answer autosaves per instance id.
    saves_in_flight: Mutex<HashMap<u64, u32>>,
}

impl FlowActions {
    pub fn new(api: Arc<dyn EvaluationApi>) -> Self {
        Self {
            api,
            saves_in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn ensure_no_save_in_flight(&self, instance_id: u64) -> Result<(), EvalError> {
        if self
            .saves_in_flight
            .lock()
            .unwrap()
            .get(&instance_id)
            .is_some_and(|&n| n > 0)
        {
            return Err(EvalError::AutosavePending(instance_id));
        }
        Ok(())
    }

    /// Autosave the answer set. Registers itself as in flight for the
    /// duration of the call so a concurrent finalize is refused.
    #[instrument(skip(self, answers), fields(instance_id))]
    pub async fn save_answers(
        &self,
        instance_id: u64,
        answers: &[Answer],
    ) -> anyhow::Result<Instance> {
        let _guard = SaveGuard::new(&self.saves_in_flight, instance_id);
        self.api.save_answers(instance_id, answers).await
    }

    /// Mark the evaluation completed, replacing the instance. Refused
    /// while an autosave for the same instance is outstanding.
    #[instrument(skip(self, instance), fields(instance_id = instance.id))]
    pub async fn finalize_answers(&self, instance: &Instance) -> anyhow::Result<Instance> {
        self.ensure_no_save_in_flight(instance.id)?;
        let mut next = instance.clone();
        next.completed = true;
        self.api.replace_instance(&next).await
    }

    #[instrument(skip(self))]
    pub async fn mark_meeting_held(
        &self,
        instance_id: u64,
        meeting_date: NaiveDate,
    ) -> anyhow::Result<Instance> {
        self.api.mark_meeting_held(instance_id, meeting_date).await
    }

    #[instrument(skip(self, text))]
    pub async fn complete_feedback(
        &self,
        instance_id: u64,
        text: &str,
    ) -> anyhow::Result<Instance> {
        self.api.complete_feedback(instance_id, text).await
    }

    #[instrument(skip(self))]
    pub async fn close_for_signature(&self, instance_id: u64) -> anyhow::Result<Instance> {
        self.api.close_for_signature(instance_id).await
    }

    /// Complete the feedback, then close for signature.
    ///
    /// The outer `Err` means the feedback step itself failed and nothing
    /// was mutated. A [`FeedbackAndCloseOutcome::FeedbackOnly`] means the
    /// first mutation stuck and only the close remains.
    #[instrument(skip(self, text))]
    pub async fn complete_feedback_and_close(
        &self,
        instance_id: u64,
        text: &str,
    ) -> anyhow::Result<FeedbackAndCloseOutcome> {
        let after_feedback = self.api.complete_feedback(instance_id, text).await?;

        match self.api.close_for_signature(instance_id).await {
            Ok(closed) => Ok(FeedbackAndCloseOutcome::Closed(closed)),
            Err(close_error) => {
                tracing::warn!(
                    instance_id,
                    error = %close_error,
                    "feedback recorded but close for signature failed"
                );
                Ok(FeedbackAndCloseOutcome::FeedbackOnly {
                    instance: after_feedback,
                    close_error,
                })
            }
        }
    }

    /// Subject signs. Refused while an autosave is outstanding.
    #[instrument(skip(self))]
    pub async fn sign(&self, instance_id: u64) -> anyhow::Result<Instance> {
        self.ensure_no_save_in_flight(instance_id)?;
        self.api.sign(instance_id).await
    }

    /// Subject signs with a dissenting reason. The reason length is
    /// validated here, before any remote call, so an invalid reason is a
    /// field-level error with no network traffic.
    #[instrument(skip(self, reason))]
    pub async fn sign_with_observation(
        &self,
        instance_id: u64,
        reason: &str,
    ) -> anyhow::Result<Instance> {
        validate_observation_reason(reason)?;
        self.ensure_no_save_in_flight(instance_id)?;
        self.api.sign_with_observation(instance_id, reason).await
    }
}

/// Marks one autosave as in flight for one instance.
///
/// Released on drop, so a save that is cancelled mid-request (its future
/// dropped) cannot leave the gate held.
struct SaveGuard<'a> {
    saves: &'a Mutex<HashMap<u64, u32>>,
    instance_id: u64,
}

impl<'a> SaveGuard<'a> {
    fn new(saves: &'a Mutex<HashMap<u64, u32>>, instance_id: u64) -> Self {
        *saves.lock().unwrap().entry(instance_id).or_insert(0) += 1;
        Self { saves, instance_id }
    }
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        let mut saves = self.saves.lock().unwrap();
        if let Some(count) = saves.get_mut(&self.instance_id) {
            *count -= 1;
            if *count == 0 {
                saves.remove(&self.instance_id);
            }
        }
    }
}
