use crate::audit::{AuditEvent, AuditRecorder};
use crate::config::EncodeConfig;
use crate::context::RuntimeContext;
use crate::stages::StageOutcome;
use batchflow_common::{Result, Stage};
use tracing::info;

/// Location of the combined artifact for this run.
pub fn artifact_location(ctx: &RuntimeContext, config: &EncodeConfig) -> String {
    ctx.storage.join(&[
        "encode",
        &format!("run-{}", ctx.run_id),
        &config.artifact_name,
    ])
}

/// Record the combined artifact. Combining the rendered units is done by the
/// encode container itself.
pub async fn run(
    ctx: &RuntimeContext,
    config: &EncodeConfig,
    recorder: &AuditRecorder,
) -> Result<StageOutcome> {
    let artifact = artifact_location(ctx, config);
    info!("Run {} combined into {}", ctx.run_id, artifact);

    let mut outcome = StageOutcome::new(Stage::Encode);
    let event = AuditEvent::CombinedOutputs {
        artifact: artifact.clone(),
    };
    if let Err(e) = recorder.record(event).await {
        outcome.audit_failures.push(e);
    }
    outcome.outputs.push(artifact);
    Ok(outcome)
}
