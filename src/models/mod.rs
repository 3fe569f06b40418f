//! Domain models for submissions, assessment runs and decoded results.

pub mod assessment;
pub mod bug;
pub mod package;
pub mod scarf;
