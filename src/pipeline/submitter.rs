use crate::audit::{AuditEvent, AuditRecorder};
use crate::config::{JobTarget, ResourceOverrides, StagesConfig};
use crate::context::{vars, RuntimeContext};
use crate::partition::PartitionPlan;
use crate::queue::{job_name, JobQueue, SubmissionRequest};
use batchflow_common::{Error, JobId, Result, Stage};
use tracing::info;

/// Queue, definition and resources for one downstream stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub queue: String,
    pub definition: String,
    pub resources: ResourceOverrides,
}

/// Work out where jobs of `stage` go.
///
/// Values from the environment win over `[stages.<stage>]`, which wins over
/// `[stages.defaults]`.
pub fn resolve_target(
    stage: Stage,
    env_queue: Option<&str>,
    env_definition: Option<&str>,
    stages: &StagesConfig,
) -> Result<ResolvedTarget> {
    let configured = match stage {
        Stage::Render => &stages.render,
        Stage::Encode => &stages.encode,
        Stage::Plan => {
            return Err(Error::context("the plan stage is never submitted downstream"));
        }
    };
    let from_env = JobTarget {
        queue: env_queue.map(String::from),
        definition: env_definition.map(String::from),
        resources: ResourceOverrides::default(),
    };
    let merged = stages.defaults.merge(configured).merge(&from_env);

    let (queue_var, definition_var) = match stage {
        Stage::Render => (vars::RENDER_QUEUE, vars::RENDER_DEFINITION),
        _ => (vars::ENCODE_QUEUE, vars::ENCODE_DEFINITION),
    };
    let queue = merged.queue.ok_or_else(|| {
        Error::context(format!(
            "No job queue for the {} stage; set {} or stages.{}.queue",
            stage, queue_var, stage
        ))
    })?;
    let definition = merged.definition.ok_or_else(|| {
        Error::context(format!(
            "No job definition for the {} stage; set {} or stages.{}.definition",
            stage, definition_var, stage
        ))
    })?;

    Ok(ResolvedTarget {
        queue,
        definition,
        resources: merged.resources,
    })
}

/// Job ids handed out for one plan, plus any audit writes that failed.
#[derive(Debug)]
pub struct SubmittedPipeline {
    pub render_job_id: JobId,
    pub encode_job_id: JobId,
    pub audit_failures: Vec<Error>,
}

/// Submits the render array job and the encode job that waits on it.
pub struct PipelineSubmitter<'a> {
    ctx: &'a RuntimeContext,
    queue: &'a dyn JobQueue,
    recorder: &'a AuditRecorder,
    render: ResolvedTarget,
    encode: ResolvedTarget,
}

impl<'a> PipelineSubmitter<'a> {
    /// Resolves both targets up front, so a missing queue or definition is
    /// reported before anything is submitted.
    pub fn new(
        ctx: &'a RuntimeContext,
        stages: &StagesConfig,
        queue: &'a dyn JobQueue,
        recorder: &'a AuditRecorder,
    ) -> Result<Self> {
        let params = &ctx.params;
        let render = resolve_target(
            Stage::Render,
            params.render_queue.as_deref(),
            params.render_definition.as_deref(),
            stages,
        )?;
        let encode = resolve_target(
            Stage::Encode,
            params.encode_queue.as_deref(),
            params.encode_definition.as_deref(),
            stages,
        )?;

        Ok(Self {
            ctx,
            queue,
            recorder,
            render,
            encode,
        })
    }

    pub fn render_request(&self, plan: &PartitionPlan) -> Result<SubmissionRequest> {
        let mut request = SubmissionRequest::new(
            job_name(
                &self.ctx.pipeline_name,
                Stage::Render,
                self.ctx.stage,
                &self.ctx.run_id,
            ),
            &self.render.queue,
            &self.render.definition,
        )
        .with_parameter(vars::UNITS_PER_SLOT, plan.units_per_slot.to_string())
        .with_parameter(vars::RUN_ID, self.ctx.run_id.as_str())
        .with_resources(&self.render.resources);

        if let Some(size) = plan.array_size() {
            request = request.with_array_size(size)?;
        }
        Ok(request)
    }

    pub fn encode_request(&self, render_job_id: &JobId) -> SubmissionRequest {
        SubmissionRequest::new(
            job_name(
                &self.ctx.pipeline_name,
                Stage::Encode,
                self.ctx.stage,
                &self.ctx.run_id,
            ),
            &self.encode.queue,
            &self.encode.definition,
        )
        .with_dependency(render_job_id.clone())
        .with_parameter(vars::RUN_ID, self.ctx.run_id.as_str())
        .with_resources(&self.encode.resources)
    }

    /// Submit render, then encode depending on it.
    ///
    /// A failed render submission stops here; encode is never attempted.
    pub async fn submit(&self, plan: &PartitionPlan) -> Result<SubmittedPipeline> {
        let mut audit_failures = Vec::new();

        let render_request = self.render_request(plan)?;
        let render_job_id = self.submit_one(&render_request, &mut audit_failures).await?;

        let encode_request = self.encode_request(&render_job_id);
        let encode_job_id = self.submit_one(&encode_request, &mut audit_failures).await?;

        Ok(SubmittedPipeline {
            render_job_id,
            encode_job_id,
            audit_failures,
        })
    }

    async fn submit_one(
        &self,
        request: &SubmissionRequest,
        audit_failures: &mut Vec<Error>,
    ) -> Result<JobId> {
        info!(
            "Submitting {} to {}: {}",
            request.job_name,
            request.job_queue,
            serde_json::to_string(request).unwrap_or_default()
        );
        let job_id = self.queue.submit(request).await?;
        info!("Submitted {} as job {}", request.job_name, job_id);

        let event = AuditEvent::SubmittedJob {
            job_id: job_id.clone(),
            job_submit_parameters: request.clone(),
        };
        if let Err(e) = self.recorder.record(event).await {
            audit_failures.push(e);
        }
        Ok(job_id)
    }
}
