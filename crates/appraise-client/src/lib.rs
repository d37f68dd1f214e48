//! appraise-client — evaluation service backends and flow orchestration.
//!
//! Implements the `EvaluationApi` trait over HTTP and in memory, and the
//! `FlowActions` layer that sequences lifecycle transitions on top of it.

pub mod config;
pub mod flow;
pub mod http;
pub mod mock;

pub use config::{load_config, load_config_from, AppraiseConfig};
pub use flow::{FeedbackAndCloseOutcome, FlowActions};
pub use http::HttpBackend;
pub use mock::MockApi;
