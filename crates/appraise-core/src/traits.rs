//! The remote persistence interface.
//!
//! Implemented by `appraise-client` (HTTP backend, in-memory mock). The
//! core only needs a typed request/response channel; everything about
//! transport, authentication, and retries lives behind this trait.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::comparison::ComparisonReport;
use crate::instance::Instance;
use crate::model::{Answer, Template};

/// Persistence and transition operations for evaluations.
///
/// Every transition endpoint performs its own authoritative precondition
/// check; a call whose expected prior state does not hold fails with an
/// error downcastable to [`crate::error::ApiError::Conflict`]. None of
/// the transitions are idempotent — callers must not blindly retry.
///
/// All methods are plain futures: dropping one aborts the underlying
/// request, so cancellation (e.g. the caller navigating away) cannot
/// leave a mutation the caller still observes.
#[async_trait]
pub trait EvaluationApi: Send + Sync {
    /// Read a template definition.
    async fn fetch_template(&self, template_id: u64) -> anyhow::Result<Template>;

    /// Read an evaluation instance.
    async fn fetch_instance(&self, instance_id: u64) -> anyhow::Result<Instance>;

    /// Autosave the answer set (partial write; upsert per indicator).
    async fn save_answers(&self, instance_id: u64, answers: &[Answer])
        -> anyhow::Result<Instance>;

    /// Replace the whole instance (answers, texts, `completado`).
    async fn replace_instance(&self, instance: &Instance) -> anyhow::Result<Instance>;

    /// Record that the feedback meeting happened on `meeting_date`.
    async fn mark_meeting_held(
        &self,
        instance_id: u64,
        meeting_date: NaiveDate,
    ) -> anyhow::Result<Instance>;

    /// Record the feedback text and mark feedback completed.
    async fn complete_feedback(&self, instance_id: u64, text: &str) -> anyhow::Result<Instance>;

    /// Close the instance for the subject's signature.
    async fn close_for_signature(&self, instance_id: u64) -> anyhow::Result<Instance>;

    /// Subject signs without observation.
    async fn sign(&self, instance_id: u64) -> anyhow::Result<Instance>;

    /// Subject signs recording a dissenting reason.
    async fn sign_with_observation(
        &self,
        instance_id: u64,
        reason: &str,
    ) -> anyhow::Result<Instance>;

    /// Read the self-vs-supervisor comparison, keyed by the
    /// assignment-detail id.
    async fn fetch_comparison(&self, detail_id: u64) -> anyhow::Result<ComparisonReport>;

    /// Export the rendered evaluation document as opaque bytes.
    async fn export_document(&self, instance_id: u64) -> anyhow::Result<Vec<u8>>;
}
