pub mod consensus;
pub mod engine;
pub mod roster;

pub use engine::VotingEngine;
pub use roster::JuryRoster;
