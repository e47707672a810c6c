use crate::audit::AuditRecorder;
use crate::config::Config;
use crate::context::{vars, RuntimeContext};
use crate::partition::PartitionPlan;
use crate::pipeline::PipelineSubmitter;
use crate::queue::JobQueue;
use crate::stages::StageOutcome;
use batchflow_common::{Result, Stage};
use tracing::info;

/// Split the workload and submit the downstream jobs.
pub async fn run(
    ctx: &RuntimeContext,
    config: &Config,
    queue: &dyn JobQueue,
    recorder: &AuditRecorder,
) -> Result<StageOutcome> {
    let plan = PartitionPlan::from_raw(
        vars::TOTAL_UNITS,
        ctx.params.total_units.as_deref(),
        vars::UNITS_PER_SLOT,
        ctx.params.units_per_slot.as_deref(),
    )?;
    info!(
        "Run {}: {} units over {} slot(s) of {}",
        ctx.run_id, plan.total_units, plan.slot_count, plan.units_per_slot
    );

    let submitter = PipelineSubmitter::new(ctx, &config.stages, queue, recorder)?;
    let submitted = submitter.submit(&plan).await?;

    let mut outcome = StageOutcome::new(Stage::Plan);
    outcome.submitted = vec![submitted.render_job_id, submitted.encode_job_id];
    outcome.audit_failures = submitted.audit_failures;
    Ok(outcome)
}
