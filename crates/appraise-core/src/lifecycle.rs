//! Workflow state derivation and transition application.
//!
//! The state is never stored; it is derived from the instance's flags by
//! exactly one function, [`derive_state`]. Transition preconditions, the
//! mock server, and the CLI all go through it, so the rule has a single
//! home.
//!
//! Transitions are not idempotent. The precondition check here is the
//! authoritative one: a duplicate invocation fails with
//! [`EvalError::InvalidTransition`], which the remote layer surfaces as a
//! conflict.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{validate_observation_reason, EvalError};
use crate::instance::Instance;

/// The four workflow states of an evaluation instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Evaluation in progress; the evaluator is still answering.
    Pending,
    /// Answers complete; the feedback meeting cycle runs.
    FeedbackPending,
    /// Closed for signature; waiting on the subject.
    AwaitingSignature,
    /// Terminal. `with_observation` distinguishes a plain signature from
    /// one recorded with a dissenting reason.
    Finalized { with_observation: bool },
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Finalized { .. })
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowState::Pending => write!(f, "pending"),
            WorkflowState::FeedbackPending => write!(f, "feedback_pending"),
            WorkflowState::AwaitingSignature => write!(f, "awaiting_signature"),
            WorkflowState::Finalized {
                with_observation: false,
            } => write!(f, "finalized"),
            WorkflowState::Finalized {
                with_observation: true,
            } => write!(f, "finalized_with_observation"),
        }
    }
}

/// Derive the workflow state from the instance flags.
///
/// Precedence: finalized > awaiting signature > feedback pending >
/// pending. `completado` alone is sufficient for feedback_pending; the
/// meeting flag never factors into the state.
pub fn derive_state(instance: &Instance) -> WorkflowState {
    if instance.signed || instance.signed_with_observation {
        WorkflowState::Finalized {
            with_observation: instance.signed_with_observation,
        }
    } else if instance.closed_for_signature {
        WorkflowState::AwaitingSignature
    } else if instance.completed {
        WorkflowState::FeedbackPending
    } else {
        WorkflowState::Pending
    }
}

/// A lifecycle transition request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tipo", rename_all = "snake_case")]
pub enum Transition {
    MarkMeetingHeld { meeting_date: NaiveDate },
    CompleteFeedback { text: String },
    CloseForSignature,
    Sign,
    SignWithObservation { reason: String },
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::MarkMeetingHeld { .. } => "mark_meeting_held",
            Transition::CompleteFeedback { .. } => "complete_feedback",
            Transition::CloseForSignature => "close_for_signature",
            Transition::Sign => "sign",
            Transition::SignWithObservation { .. } => "sign_with_observation",
        }
    }
}

impl Instance {
    /// Apply a transition, enforcing its precondition against the current
    /// flags. Flags only ever move forward; nothing is cleared.
    pub fn apply(&mut self, transition: Transition, now: DateTime<Utc>) -> Result<(), EvalError> {
        let state = derive_state(self);
        if state.is_terminal() {
            return Err(EvalError::Finalized(self.id));
        }

        let reject = |t: &Transition| EvalError::InvalidTransition {
            transition: t.name(),
            state,
        };

        match transition {
            Transition::MarkMeetingHeld { meeting_date } => {
                if !self.completed || self.meeting_held {
                    return Err(reject(&Transition::MarkMeetingHeld { meeting_date }));
                }
                self.meeting_held = true;
                self.meeting_date = Some(meeting_date);
            }
            Transition::CompleteFeedback { text } => {
                if self.feedback_completed {
                    return Err(reject(&Transition::CompleteFeedback { text }));
                }
                self.feedback = Some(text);
                self.feedback_date = Some(now);
                self.feedback_completed = true;
            }
            Transition::CloseForSignature => {
                if !self.feedback_completed || self.closed_for_signature {
                    return Err(reject(&Transition::CloseForSignature));
                }
                self.closed_for_signature = true;
            }
            Transition::Sign => {
                if state != WorkflowState::AwaitingSignature {
                    return Err(reject(&Transition::Sign));
                }
                self.signed = true;
                self.signed_date = Some(now);
            }
            Transition::SignWithObservation { reason } => {
                if state != WorkflowState::AwaitingSignature {
                    return Err(reject(&Transition::SignWithObservation { reason }));
                }
                validate_observation_reason(&reason)?;
                self.signed_with_observation = true;
                self.observation_reason = Some(reason.trim().to_string());
                self.signed_date = Some(now);
            }
        }
        Ok(())
    }
}

/// Kinds of transition, for listing what an instance can do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    MarkMeetingHeld,
    CompleteFeedback,
    CloseForSignature,
    Sign,
    SignWithObservation,
}

/// The legal next transitions for an instance in its current state.
pub fn available_transitions(instance: &Instance) -> Vec<TransitionKind> {
    match derive_state(instance) {
        WorkflowState::Pending | WorkflowState::Finalized { .. } => vec![],
        WorkflowState::FeedbackPending => {
            let mut out = Vec::new();
            if !instance.meeting_held {
                out.push(TransitionKind::MarkMeetingHeld);
            }
            if !instance.feedback_completed {
                out.push(TransitionKind::CompleteFeedback);
            } else {
                out.push(TransitionKind::CloseForSignature);
            }
            out
        }
        WorkflowState::AwaitingSignature => vec![
            TransitionKind::Sign,
            TransitionKind::SignWithObservation,
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PersonRef, Template};

    fn instance() -> Instance {
        let template = Template {
            id: 1,
            name: "t".into(),
            areas: vec![],
        };
        Instance::new(
            1,
            "06-2026",
            PersonRef {
                id: 1,
                first_name: "Ana".into(),
                last_name: "Rojas".into(),
                email: None,
            },
            &template,
        )
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn meeting_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()
    }

    fn reason() -> String {
        "x".repeat(60)
    }

    #[test]
    fn derivation_is_total_and_single_valued() {
        // Every combination of the boolean flags must derive exactly one
        // state, with the documented precedence.
        for bits in 0u8..64 {
            let mut inst = instance();
            inst.completed = bits & 1 != 0;
            inst.meeting_held = bits & 2 != 0;
            inst.feedback_completed = bits & 4 != 0;
            inst.closed_for_signature = bits & 8 != 0;
            inst.signed = bits & 16 != 0;
            inst.signed_with_observation = bits & 32 != 0;

            let state = derive_state(&inst);
            let expected = if inst.signed || inst.signed_with_observation {
                WorkflowState::Finalized {
                    with_observation: inst.signed_with_observation,
                }
            } else if inst.closed_for_signature {
                WorkflowState::AwaitingSignature
            } else if inst.completed {
                WorkflowState::FeedbackPending
            } else {
                WorkflowState::Pending
            };
            assert_eq!(state, expected, "flags {bits:#08b}");
        }
    }

    #[test]
    fn happy_path_to_signed() {
        let mut inst = instance();
        assert_eq!(derive_state(&inst), WorkflowState::Pending);

        inst.completed = true;
        assert_eq!(derive_state(&inst), WorkflowState::FeedbackPending);

        inst.apply(
            Transition::MarkMeetingHeld {
                meeting_date: meeting_date(),
            },
            now(),
        )
        .unwrap();
        inst.apply(
            Transition::CompleteFeedback {
                text: "buen desempeño general".into(),
            },
            now(),
        )
        .unwrap();
        assert!(inst.feedback_completed);
        assert!(inst.feedback_date.is_some());

        inst.apply(Transition::CloseForSignature, now()).unwrap();
        assert_eq!(derive_state(&inst), WorkflowState::AwaitingSignature);

        inst.apply(Transition::Sign, now()).unwrap();
        assert_eq!(
            derive_state(&inst),
            WorkflowState::Finalized {
                with_observation: false
            }
        );
        assert!(inst.signed_date.is_some());
    }

    #[test]
    fn sign_with_observation_path() {
        let mut inst = instance();
        inst.completed = true;
        inst.feedback_completed = true;
        inst.closed_for_signature = true;

        inst.apply(
            Transition::SignWithObservation { reason: reason() },
            now(),
        )
        .unwrap();
        assert_eq!(
            derive_state(&inst),
            WorkflowState::Finalized {
                with_observation: true
            }
        );
        assert_eq!(inst.observation_reason.as_deref(), Some(reason().as_str()));
    }

    #[test]
    fn short_observation_reason_rejected_without_mutation() {
        let mut inst = instance();
        inst.completed = true;
        inst.feedback_completed = true;
        inst.closed_for_signature = true;

        let err = inst
            .apply(
                Transition::SignWithObservation {
                    reason: "x".repeat(49),
                },
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, EvalError::ReasonLength(49)));
        assert!(!inst.signed_with_observation);

        // Exactly 50 characters is accepted.
        inst.apply(
            Transition::SignWithObservation {
                reason: "x".repeat(50),
            },
            now(),
        )
        .unwrap();
    }

    #[test]
    fn duplicate_transitions_conflict() {
        let mut inst = instance();
        inst.completed = true;

        inst.apply(
            Transition::MarkMeetingHeld {
                meeting_date: meeting_date(),
            },
            now(),
        )
        .unwrap();
        let err = inst
            .apply(
                Transition::MarkMeetingHeld {
                    meeting_date: meeting_date(),
                },
                now(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EvalError::InvalidTransition {
                transition: "mark_meeting_held",
                ..
            }
        ));

        inst.apply(
            Transition::CompleteFeedback { text: "ok".into() },
            now(),
        )
        .unwrap();
        assert!(inst
            .apply(Transition::CompleteFeedback { text: "again".into() }, now())
            .is_err());
    }

    #[test]
    fn meeting_requires_completed_evaluation() {
        let mut inst = instance();
        let err = inst
            .apply(
                Transition::MarkMeetingHeld {
                    meeting_date: meeting_date(),
                },
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, EvalError::InvalidTransition { .. }));
    }

    #[test]
    fn close_requires_completed_feedback() {
        let mut inst = instance();
        inst.completed = true;
        assert!(inst.apply(Transition::CloseForSignature, now()).is_err());
    }

    #[test]
    fn sign_requires_awaiting_signature() {
        let mut inst = instance();
        inst.completed = true;
        assert!(inst.apply(Transition::Sign, now()).is_err());
    }

    #[test]
    fn terminal_instance_rejects_everything() {
        let mut inst = instance();
        inst.completed = true;
        inst.feedback_completed = true;
        inst.closed_for_signature = true;
        inst.signed = true;

        for transition in [
            Transition::MarkMeetingHeld {
                meeting_date: meeting_date(),
            },
            Transition::CompleteFeedback { text: "x".into() },
            Transition::CloseForSignature,
            Transition::Sign,
            Transition::SignWithObservation { reason: reason() },
        ] {
            let err = inst.apply(transition, now()).unwrap_err();
            assert!(matches!(err, EvalError::Finalized(1)));
        }
    }

    #[test]
    fn available_transitions_follow_state() {
        let mut inst = instance();
        assert!(available_transitions(&inst).is_empty());

        inst.completed = true;
        assert_eq!(
            available_transitions(&inst),
            vec![
                TransitionKind::MarkMeetingHeld,
                TransitionKind::CompleteFeedback
            ]
        );

        inst.meeting_held = true;
        inst.feedback_completed = true;
        assert_eq!(
            available_transitions(&inst),
            vec![TransitionKind::CloseForSignature]
        );

        inst.closed_for_signature = true;
        assert_eq!(
            available_transitions(&inst),
            vec![TransitionKind::Sign, TransitionKind::SignWithObservation]
        );

        inst.signed = true;
        assert!(available_transitions(&inst).is_empty());
    }
}
