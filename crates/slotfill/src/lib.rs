pub mod extract;
pub mod filler;

pub use filler::{SlotFillOutcome, SlotFiller};
