//! Workload partitioning for the render fan-out.
//!
//! The plan stage turns a total frame count into a number of parallel render
//! slots. Both inputs are bounded so a single trigger can never request more
//! array members than the queue accepts.

use batchflow_common::{Error, Result};
use serde::Serialize;
use std::ops::RangeInclusive;

/// Accepted range for the total number of units in one run.
pub const TOTAL_UNITS_RANGE: RangeInclusive<i64> = 1..=10_000;

/// Accepted range for the number of units one slot processes.
pub const UNITS_PER_SLOT_RANGE: RangeInclusive<i64> = 1..=1_000;

/// Number of array slots needed to cover `total_units` at `units_per_slot`.
///
/// Returns the smallest `k` such that `k * units_per_slot >= total_units`.
///
/// ```
/// use batchflow::partition::compute_slot_count;
///
/// assert_eq!(compute_slot_count(2500, 1000).unwrap(), 3);
/// assert!(compute_slot_count(0, 10).is_err());
/// ```
pub fn compute_slot_count(total_units: i64, units_per_slot: i64) -> Result<u32> {
    check_range("totalUnits", total_units, &TOTAL_UNITS_RANGE)?;
    check_range("unitsPerSlot", units_per_slot, &UNITS_PER_SLOT_RANGE)?;

    let slots = (total_units + units_per_slot - 1) / units_per_slot;
    Ok(slots as u32)
}

fn check_range(name: &str, value: i64, range: &RangeInclusive<i64>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "{}={}, expected number between {} to {}.",
            name,
            value,
            range.start(),
            range.end()
        )))
    }
}

/// Parse a raw workload parameter taken from the environment.
///
/// A missing or non-integer value is a validation failure naming `var`.
pub fn parse_units(var: &str, raw: Option<&str>) -> Result<i64> {
    let raw = raw.ok_or_else(|| Error::validation(format!("{} is not set", var)))?;
    raw.trim()
        .parse::<i64>()
        .map_err(|_| Error::validation(format!("{}={:?} is not an integer", var, raw)))
}

/// Parse and bounds-check a per-slot unit count.
pub fn parse_units_per_slot(var: &str, raw: Option<&str>) -> Result<u32> {
    let value = parse_units(var, raw)?;
    check_range(var, value, &UNITS_PER_SLOT_RANGE)?;
    Ok(value as u32)
}

/// A validated mapping from total units to render slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionPlan {
    pub total_units: u32,
    pub units_per_slot: u32,
    pub slot_count: u32,
}

impl PartitionPlan {
    pub fn new(total_units: i64, units_per_slot: i64) -> Result<Self> {
        let slot_count = compute_slot_count(total_units, units_per_slot)?;
        Ok(Self {
            total_units: total_units as u32,
            units_per_slot: units_per_slot as u32,
            slot_count,
        })
    }

    /// Build a plan from the raw `TOTAL_FRAMES` / `FRAMES_PER_RENDER_JOB` style
    /// values supplied to the plan stage.
    pub fn from_raw(
        total_var: &str,
        total_raw: Option<&str>,
        per_slot_var: &str,
        per_slot_raw: Option<&str>,
    ) -> Result<Self> {
        let total = parse_units(total_var, total_raw)?;
        let per_slot = parse_units(per_slot_var, per_slot_raw)?;
        check_range(total_var, total, &TOTAL_UNITS_RANGE)?;
        check_range(per_slot_var, per_slot, &UNITS_PER_SLOT_RANGE)?;
        Self::new(total, per_slot)
    }

    /// Array size to request from the queue.
    ///
    /// Array jobs need at least two members, so a single slot is submitted as
    /// a plain job.
    pub fn array_size(&self) -> Option<u32> {
        (self.slot_count >= 2).then_some(self.slot_count)
    }
}
