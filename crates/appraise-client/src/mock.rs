//! In-memory mock backend for testing.
//!
//! Applies transitions through `Instance::apply`, so the server-side
//! precondition checks stay authoritative in tests exactly as they do
//! against the real backend. A failure toggle on `close_for_signature`
//! exists to exercise the composite transition's partial-success path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use appraise_core::comparison::{self, ComparisonReport};
use appraise_core::error::{ApiError, EvalError};
use appraise_core::instance::Instance;
use appraise_core::lifecycle::Transition;
use appraise_core::model::{Answer, Template};
use appraise_core::traits::EvaluationApi;

/// A mock evaluation backend over an in-memory instance store.
pub struct MockApi {
    templates: Mutex<HashMap<u64, Template>>,
    instances: Mutex<HashMap<u64, Instance>>,
    /// (auto instance id, supervisor instance id) per assignment detail.
    comparisons: Mutex<HashMap<u64, (u64, u64)>>,
    call_count: AtomicU32,
    fail_close_for_signature: AtomicBool,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            templates: Mutex::new(HashMap::new()),
            instances: Mutex::new(HashMap::new()),
            comparisons: Mutex::new(HashMap::new()),
            call_count: AtomicU32::new(0),
            fail_close_for_signature: AtomicBool::new(false),
        }
    }

    pub fn insert_template(&self, template: Template) {
        self.templates.lock().unwrap().insert(template.id, template);
    }

    pub fn insert_instance(&self, instance: Instance) {
        self.instances.lock().unwrap().insert(instance.id, instance);
    }

    /// Register which two instances a comparison detail id resolves to.
    pub fn insert_comparison(&self, detail_id: u64, auto_id: u64, supervisor_id: u64) {
        self.comparisons
            .lock()
            .unwrap()
            .insert(detail_id, (auto_id, supervisor_id));
    }

    /// Make the next `close_for_signature` calls fail with a 500-style
    /// error, to test partial success of the composite transition.
    pub fn fail_close_for_signature(&self, fail: bool) {
        self.fail_close_for_signature.store(fail, Ordering::Relaxed);
    }

    /// Number of calls made against this backend.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    fn get_instance(&self, id: u64) -> anyhow::Result<Instance> {
        self.instances
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("evaluation {id}")).into())
    }

    /// Apply a transition under the store lock; domain precondition
    /// failures map to conflicts like the real backend's HTTP 409.
    fn transition(&self, id: u64, transition: Transition) -> anyhow::Result<Instance> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let mut store = self.instances.lock().unwrap();
        let instance = store
            .get_mut(&id)
            .ok_or_else(|| ApiError::NotFound(format!("evaluation {id}")))?;
        instance
            .apply(transition, Utc::now())
            .map_err(|e| match e {
                EvalError::InvalidTransition { .. } | EvalError::Finalized(_) => {
                    anyhow::Error::from(ApiError::Conflict(e.to_string()))
                }
                other => anyhow::Error::from(other),
            })?;
        Ok(instance.clone())
    }
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EvaluationApi for MockApi {
    async fn fetch_template(&self, template_id: u64) -> anyhow::Result<Template> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.templates
            .lock()
            .unwrap()
            .get(&template_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("template {template_id}")).into())
    }

    async fn fetch_instance(&self, instance_id: u64) -> anyhow::Result<Instance> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.get_instance(instance_id)
    }

    async fn save_answers(
        &self,
        instance_id: u64,
        answers: &[Answer],
    ) -> anyhow::Result<Instance> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let mut store = self.instances.lock().unwrap();
        let instance = store
            .get_mut(&instance_id)
            .ok_or_else(|| ApiError::NotFound(format!("evaluation {instance_id}")))?;
        for answer in answers {
            instance
                .record_answer(*answer)
                .map_err(|e| ApiError::Conflict(e.to_string()))?;
        }
        Ok(instance.clone())
    }

    async fn replace_instance(&self, instance: &Instance) -> anyhow::Result<Instance> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let mut store = self.instances.lock().unwrap();
        let existing = store
            .get_mut(&instance.id)
            .ok_or_else(|| ApiError::NotFound(format!("evaluation {}", instance.id)))?;
        if existing.is_finalized() {
            return Err(ApiError::Conflict(format!(
                "evaluation {} is finalized",
                instance.id
            ))
            .into());
        }
        // The snapshot is fixed at creation; a replace never touches it.
        let mut next = instance.clone();
        next.snapshot = existing.snapshot.clone();
        next.refresh_score()?;
        *existing = next.clone();
        Ok(next)
    }

    async fn mark_meeting_held(
        &self,
        instance_id: u64,
        meeting_date: NaiveDate,
    ) -> anyhow::Result<Instance> {
        self.transition(instance_id, Transition::MarkMeetingHeld { meeting_date })
    }

    async fn complete_feedback(&self, instance_id: u64, text: &str) -> anyhow::Result<Instance> {
        self.transition(
            instance_id,
            Transition::CompleteFeedback { text: text.into() },
        )
    }

    async fn close_for_signature(&self, instance_id: u64) -> anyhow::Result<Instance> {
        if self.fail_close_for_signature.load(Ordering::Relaxed) {
            self.call_count.fetch_add(1, Ordering::Relaxed);
            return Err(ApiError::ApiError {
                status: 500,
                message: "simulated failure".into(),
            }
            .into());
        }
        self.transition(instance_id, Transition::CloseForSignature)
    }

    async fn sign(&self, instance_id: u64) -> anyhow::Result<Instance> {
        self.transition(instance_id, Transition::Sign)
    }

    async fn sign_with_observation(
        &self,
        instance_id: u64,
        reason: &str,
    ) -> anyhow::Result<Instance> {
        self.transition(
            instance_id,
            Transition::SignWithObservation {
                reason: reason.into(),
            },
        )
    }

    async fn fetch_comparison(&self, detail_id: u64) -> anyhow::Result<ComparisonReport> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let (auto_id, supervisor_id) = self
            .comparisons
            .lock()
            .unwrap()
            .get(&detail_id)
            .copied()
            .ok_or_else(|| ApiError::NotFound(format!("assignment detail {detail_id}")))?;
        let auto = self.get_instance(auto_id)?;
        let supervisor = self.get_instance(supervisor_id)?;
        Ok(comparison::compare(&auto, &supervisor)?)
    }

    async fn export_document(&self, instance_id: u64) -> anyhow::Result<Vec<u8>> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let instance = self.get_instance(instance_id)?;
        // Cheap stand-in for the rendered document.
        Ok(serde_json::to_vec_pretty(&instance)?)
    }
}
