pub mod similarity;
pub mod store;

pub use store::{EmbeddingStore, ScoredDocument};
