use crate::progress::RunProgress;
use anyhow::Result;
use thiserror::Error;

pub type StageFn<'a, C> = Box<dyn Fn(&mut C) -> Result<()> + 'a>;

pub struct StageDefinition<'a, C> {
    pub name: &'a str,
    pub run: StageFn<'a, C>,
}

/// Context attached to the error of the stage that aborted the run.
///
/// Recover it with `err.downcast_ref::<StageFailed>()`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("stage '{stage}' failed")]
pub struct StageFailed {
    pub stage: String,
}

/// Runs stages strictly in order. The first failure aborts the run; nothing after
/// it executes and nothing before it is undone.
#[derive(Debug, Default)]
pub struct StageRunner;

impl StageRunner {
    pub fn new() -> Self {
        Self
    }

    pub fn run<C>(
        &self,
        ctx: &mut C,
        stages: &[StageDefinition<'_, C>],
        progress: &mut RunProgress,
    ) -> Result<()> {
        let total = stages.len();
        for (idx, stage) in stages.iter().enumerate() {
            progress.set_current(stage.name);
            log::info!("▶ [{}/{}] {}", idx + 1, total, stage.name);

            if let Err(err) = (stage.run)(ctx) {
                log::error!("✖ {} failed: {:#}", stage.name, err);
                progress.mark_aborted(stage.name, format!("{:#}", err));
                return Err(err.context(StageFailed {
                    stage: stage.name.to_string(),
                }));
            }

            progress.mark_completed(stage.name)?;
            log::info!("✅ [{}/{}] {}", idx + 1, total, stage.name);
        }

        progress.mark_done();
        Ok(())
    }
}
