//! bulwark workflow orchestration.
//!
//! This crate holds the deterministic, fail-fast stage runner and the run
//! progress record it maintains. Every run starts at the first stage; there is
//! no resume. Higher-level crates provide the concrete stage context.

pub mod progress;
pub mod stage_runner;

pub use progress::{Outcome, RunProgress};
pub use stage_runner::{StageDefinition, StageFailed, StageFn, StageRunner};
