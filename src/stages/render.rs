//! The render stage: one array slot producing its share of output units.

use crate::audit::{AuditEvent, AuditRecorder};
use crate::config::{FrameNumbering, RenderConfig};
use crate::context::{vars, RuntimeContext};
use crate::partition::parse_units_per_slot;
use crate::stages::StageOutcome;
use batchflow_common::{Error, Result, Stage};
use tracing::{debug, info};

/// One unit of render work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderUnit {
    pub slot: u32,
    /// Zero-based number of the unit within its slot.
    pub local: u32,
    /// Position of the unit in the run's output.
    pub position: u64,
    pub location: String,
}

/// Produces the output of a single unit.
#[async_trait::async_trait]
pub trait UnitRenderer: Send + Sync {
    async fn render(&self, unit: &RenderUnit) -> Result<()>;
}

/// Stands in for the real renderer, which is deployed separately; it only
/// reports what would be written.
pub struct PlaceholderRenderer;

#[async_trait::async_trait]
impl UnitRenderer for PlaceholderRenderer {
    async fn render(&self, unit: &RenderUnit) -> Result<()> {
        debug!("Rendered unit {} -> {}", unit.position, unit.location);
        Ok(())
    }
}

/// Position of `local` within slot `slot`.
pub fn unit_position(numbering: FrameNumbering, slot: u32, units_per_slot: u32, local: u32) -> u64 {
    let (slot, per, local) = (u64::from(slot), u64::from(units_per_slot), u64::from(local));
    match numbering {
        FrameNumbering::Legacy => (local + 1) * (slot + 1),
        FrameNumbering::Contiguous => slot * per + local + 1,
    }
}

/// Render every unit of this slot, then record the outputs.
///
/// The first failing unit aborts the slot.
pub async fn run(
    ctx: &RuntimeContext,
    config: &RenderConfig,
    renderer: &dyn UnitRenderer,
    recorder: &AuditRecorder,
) -> Result<StageOutcome> {
    let slot = ctx.array_index.unwrap_or(0);
    let units_per_slot =
        parse_units_per_slot(vars::UNITS_PER_SLOT, ctx.params.units_per_slot.as_deref())?;
    let run_dir = format!("run-{}", ctx.run_id);

    info!(
        "Rendering {} unit(s) for slot {} of run {}",
        units_per_slot, slot, ctx.run_id
    );

    let mut outputs = Vec::with_capacity(units_per_slot as usize);
    for local in 0..units_per_slot {
        let position = unit_position(config.numbering, slot, units_per_slot, local);
        let file_name = format!(
            "{}.{}",
            position,
            config.output_extension.trim_start_matches('.')
        );
        let unit = RenderUnit {
            slot,
            local,
            position,
            location: ctx.storage.join(&["render", &run_dir, &file_name]),
        };

        renderer.render(&unit).await.map_err(|e| match e {
            Error::Render(_) => e,
            other => Error::render(format!("unit {} of slot {}: {}", position, slot, other)),
        })?;
        outputs.push(unit.location);
    }
    info!("Slot {} rendered {} unit(s)", slot, outputs.len());

    let mut outcome = StageOutcome::new(Stage::Render);
    let event = AuditEvent::ProducedOutputs {
        count: units_per_slot,
        outputs: outputs.clone(),
    };
    if let Err(e) = recorder.record(event).await {
        outcome.audit_failures.push(e);
    }
    outcome.outputs = outputs;
    Ok(outcome)
}
