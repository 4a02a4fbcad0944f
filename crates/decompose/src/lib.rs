//! `SubtaskDecomposer` (C8): splits a complex utterance into a
//! dependency-ordered set of subtasks, each addressed to a registered tool
//! action (spec §4.8).

pub mod decomposer;
pub mod graph;
pub mod heuristics;

pub use decomposer::{DecomposeContext, SubtaskDecomposer};
