//! appraise-core — Evaluation data model, scoring, and lifecycle engine.
//!
//! This crate defines the questionnaire model, the weighted scoring
//! engine, the workflow state machine, and the self-vs-supervisor
//! comparison engine that the rest of the appraise system builds on.

pub mod comparison;
pub mod error;
pub mod instance;
pub mod lifecycle;
pub mod model;
pub mod scoring;
pub mod traits;
