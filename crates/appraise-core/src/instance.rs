//! One evaluation occurrence: subject, period, frozen structure snapshot,
//! answers, and the workflow flags the lifecycle engine runs on.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::model::{Answer, PersonRef, Template};
use crate::scoring;

/// One concrete evaluation of one subject for one period.
///
/// The `snapshot` is a deep copy of the template taken when the instance
/// was created; all scoring runs against it so later template edits never
/// retroactively change a historical score. Workflow flags only ever move
/// forward; once signed (plain or with observation) the instance rejects
/// every further write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: u64,
    /// Period label, `MM-YYYY`.
    #[serde(rename = "fecha_evaluacion")]
    pub period: String,
    #[serde(rename = "persona")]
    pub subject: PersonRef,
    #[serde(rename = "evaluador", default)]
    pub evaluator: Option<PersonRef>,

    /// Frozen copy of the template structure, fixed at creation.
    #[serde(rename = "estructura_json")]
    pub snapshot: Option<Template>,
    #[serde(rename = "respuestas", default)]
    pub answers: Vec<Answer>,

    // Workflow flags, strictly forward-moving.
    #[serde(rename = "completado", default)]
    pub completed: bool,
    #[serde(rename = "reunion_realizada", default)]
    pub meeting_held: bool,
    #[serde(rename = "fecha_reunion", default)]
    pub meeting_date: Option<NaiveDate>,
    #[serde(rename = "retroalimentacion", default)]
    pub feedback: Option<String>,
    #[serde(rename = "fecha_retroalimentacion", default)]
    pub feedback_date: Option<DateTime<Utc>>,
    #[serde(rename = "retroalimentacion_completada", default)]
    pub feedback_completed: bool,
    #[serde(rename = "cerrado_para_firma", default)]
    pub closed_for_signature: bool,
    #[serde(rename = "firmado", default)]
    pub signed: bool,
    #[serde(rename = "firmado_obs", default)]
    pub signed_with_observation: bool,
    #[serde(rename = "motivo_denegacion", default)]
    pub observation_reason: Option<String>,
    #[serde(rename = "fecha_firma", default)]
    pub signed_date: Option<DateTime<Utc>>,

    // Cached scoring results, refreshed on every answer write.
    #[serde(rename = "logro_obtenido", default)]
    pub achieved_pct: Option<f64>,
    #[serde(rename = "puntaje_total_obtenido", default)]
    pub obtained_total: i32,
    #[serde(rename = "puntaje_total_maximo", default)]
    pub max_total: i32,
}

impl Instance {
    /// Create a pending instance, freezing `template` as its snapshot.
    pub fn new(id: u64, period: impl Into<String>, subject: PersonRef, template: &Template) -> Self {
        Self {
            id,
            period: period.into(),
            subject,
            evaluator: None,
            snapshot: Some(template.clone()),
            answers: Vec::new(),
            completed: false,
            meeting_held: false,
            meeting_date: None,
            feedback: None,
            feedback_date: None,
            feedback_completed: false,
            closed_for_signature: false,
            signed: false,
            signed_with_observation: false,
            observation_reason: None,
            signed_date: None,
            achieved_pct: None,
            obtained_total: 0,
            max_total: 0,
        }
    }

    /// Whether the instance reached a terminal state.
    pub fn is_finalized(&self) -> bool {
        self.signed || self.signed_with_observation
    }

    /// The frozen structure, or a typed error if the instance predates
    /// snapshotting.
    pub fn structure(&self) -> Result<&Template, EvalError> {
        self.snapshot.as_ref().ok_or(EvalError::MissingSnapshot(self.id))
    }

    /// Upsert one answer (last write per indicator wins) and refresh the
    /// cached score. Rejected once the instance is finalized, and for
    /// indicators the snapshot does not know.
    pub fn record_answer(&mut self, answer: Answer) -> Result<(), EvalError> {
        if self.is_finalized() {
            return Err(EvalError::Finalized(self.id));
        }
        if self.structure()?.indicator(answer.indicator_id).is_none() {
            return Err(EvalError::UnknownIndicator(answer.indicator_id));
        }
        match self
            .answers
            .iter_mut()
            .find(|a| a.indicator_id == answer.indicator_id)
        {
            Some(existing) => existing.score = answer.score,
            None => self.answers.push(answer),
        }
        self.refresh_score()
    }

    /// Replace the whole answer set (autosave payload) and refresh the
    /// cached score. Same guards as [`record_answer`](Self::record_answer).
    pub fn replace_answers(&mut self, answers: Vec<Answer>) -> Result<(), EvalError> {
        if self.is_finalized() {
            return Err(EvalError::Finalized(self.id));
        }
        let structure = self.structure()?;
        if let Some(bad) = answers
            .iter()
            .find(|a| structure.indicator(a.indicator_id).is_none())
        {
            return Err(EvalError::UnknownIndicator(bad.indicator_id));
        }
        self.answers = answers;
        self.refresh_score()
    }

    /// Recompute `logro_obtenido` and the raw obtained/maximum totals
    /// from the snapshot.
    pub fn refresh_score(&mut self) -> Result<(), EvalError> {
        let breakdown = scoring::score_instance(self)?;
        self.achieved_pct = breakdown.overall;
        self.obtained_total = breakdown.obtained_total;
        self.max_total = breakdown.max_total;
        Ok(())
    }

    /// How many of the snapshot's indicators have an answer.
    pub fn answered_count(&self) -> usize {
        let Ok(structure) = self.structure() else {
            return 0;
        };
        structure
            .indicators()
            .filter(|i| self.answers.iter().any(|a| a.indicator_id == i.id))
            .count()
    }

    /// Whether every indicator in the snapshot has an answer.
    pub fn is_fully_answered(&self) -> bool {
        self.structure()
            .map(|s| self.answered_count() == s.indicator_count())
            .unwrap_or(false)
    }
}
