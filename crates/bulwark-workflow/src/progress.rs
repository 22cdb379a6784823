//! Ordered record of a single run's stage progression.
//!
//! Used for the audit log and the run report only. It is never loaded back:
//! idempotency comes from each stage being safe to repeat, not from skipping.

use anyhow::{bail, Result};
use serde::Serialize;

type StageName = String;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    Done,
    Aborted { stage: StageName, reason: String },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunProgress {
    pub current_stage: Option<StageName>,
    pub completed_stages: Vec<StageName>,
    pub outcome: Outcome,
}

impl Default for RunProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl RunProgress {
    pub fn new() -> Self {
        Self {
            current_stage: None,
            completed_stages: Vec::new(),
            outcome: Outcome::Pending,
        }
    }

    pub fn is_completed(&self, stage: &str) -> bool {
        self.completed_stages.iter().any(|s| s == stage)
    }

    pub fn set_current(&mut self, stage: &str) {
        self.current_stage = Some(stage.to_string());
    }

    /// Record `stage` as finished. Stages only move forward; completing one twice
    /// or after the run has ended is a bug in the caller.
    pub fn mark_completed(&mut self, stage: &str) -> Result<()> {
        if self.outcome != Outcome::Pending {
            bail!("run already finished; cannot complete stage '{}'", stage);
        }
        if self.is_completed(stage) {
            bail!("stage '{}' already completed in this run", stage);
        }
        self.completed_stages.push(stage.to_string());
        self.current_stage = None;
        Ok(())
    }

    pub fn mark_done(&mut self) {
        self.current_stage = None;
        self.outcome = Outcome::Done;
    }

    pub fn mark_aborted(&mut self, stage: &str, reason: impl Into<String>) {
        self.current_stage = None;
        self.outcome = Outcome::Aborted {
            stage: stage.to_string(),
            reason: reason.into(),
        };
    }

    pub fn is_done(&self) -> bool {
        self.outcome == Outcome::Done
    }
}
