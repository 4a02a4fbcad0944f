pub mod classifier;
pub mod confidence;
pub mod embedder;
pub mod fallback;

pub use classifier::{ClassifierContext, RagClassifier};
pub use embedder::RoleEmbedder;
pub use fallback::FallbackOutcome;
