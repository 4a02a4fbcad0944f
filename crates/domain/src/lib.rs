pub mod capability;
pub mod config;
pub mod decisions;
pub mod error;
pub mod interfaces;
pub mod model;
pub mod stream;
pub mod tool;
pub mod trace;

pub use capability::{LlmCapabilities, ModelRole, ToolSupport};
pub use config::Config;
pub use decisions::{Decision, DecisionKind, DecisionLog};
pub use error::{Error, Result};
pub use interfaces::{
    ClassificationRequest, ClassificationResult, ConversationResponse, ExecutionSummary,
    RankedCandidate,
};
pub use trace::TraceEvent;
