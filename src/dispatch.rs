//! Route a job to the executor for its stage.

use std::sync::Arc;

use batchflow_common::{Result, Stage};
use tracing::{info, warn};

use crate::audit::{AuditRecorder, AuditStore};
use crate::config::Config;
use crate::context::RuntimeContext;
use crate::queue::JobQueue;
use crate::stages::{self, PlaceholderRenderer, StageOutcome, StageStatus, UnitRenderer};

/// Holds the collaborators every stage may need.
pub struct Dispatcher {
    config: Config,
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn AuditStore>,
    renderer: Arc<dyn UnitRenderer>,
}

impl Dispatcher {
    pub fn new(config: Config, queue: Arc<dyn JobQueue>, store: Arc<dyn AuditStore>) -> Self {
        Self {
            config,
            queue,
            store,
            renderer: Arc::new(PlaceholderRenderer),
        }
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn UnitRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Run the stage named in `ctx`.
    pub async fn dispatch(&self, ctx: &RuntimeContext) -> Result<StageOutcome> {
        info!(
            "Starting {} stage of {} (job {}, attempt {})",
            ctx.stage, ctx.pipeline_name, ctx.job_id, ctx.attempt
        );
        let recorder = AuditRecorder::new(self.store.clone(), ctx);

        let outcome = match ctx.stage {
            Stage::Plan => {
                stages::plan::run(ctx, &self.config, self.queue.as_ref(), &recorder).await?
            }
            Stage::Render => {
                stages::render::run(ctx, &self.config.render, self.renderer.as_ref(), &recorder)
                    .await?
            }
            Stage::Encode => stages::encode::run(ctx, &self.config.encode, &recorder).await?,
        };

        match outcome.status() {
            StageStatus::Completed => info!("{} stage {}", ctx.stage, outcome.status()),
            StageStatus::CompletedWithAuditGaps => warn!(
                "{} stage {} ({} audit record(s) missing)",
                ctx.stage,
                outcome.status(),
                outcome.audit_failures.len()
            ),
        }
        Ok(outcome)
    }

    /// Run the stage called `stage_name` with the rest of `ctx`.
    ///
    /// Unknown names fail with `Error::UnknownStage` before anything runs.
    pub async fn dispatch_named(
        &self,
        stage_name: &str,
        ctx: &RuntimeContext,
    ) -> Result<StageOutcome> {
        let stage: Stage = stage_name.trim().parse()?;
        let ctx = RuntimeContext {
            stage,
            ..ctx.clone()
        };
        self.dispatch(&ctx).await
    }
}
