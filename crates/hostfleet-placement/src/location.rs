//! Location-level capacity aggregation.
//!
//! Reduces the node usage snapshots sharing a location id into one
//! [`LocationSummary`]. Percentages come from the summed totals, never
//! from averaging per-node percentages, and a location with zero active
//! nodes always reports maintenance so stale capacity cannot look
//! selectable.

use serde::{Deserialize, Serialize};

use hostfleet_panel::LocationId;

use crate::usage::{
    CapacityStatus, NodeResourceUsage, epoch_secs, round2, utilization_pct,
};

/// Aggregate capacity view over all nodes in one location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationSummary {
    pub location_id: LocationId,
    pub total_nodes: u32,
    /// Nodes not flagged for maintenance.
    pub active_nodes: u32,
    pub maintenance_nodes: u32,
    /// Summed effective memory capacity (overallocation included), MB.
    pub total_memory_mb: u64,
    pub total_disk_mb: u64,
    pub allocated_memory_mb: u64,
    pub allocated_disk_mb: u64,
    pub available_memory_mb: u64,
    pub available_disk_mb: u64,
    pub total_workloads: u32,
    /// Utilization of the summed totals, rounded to 2 decimals.
    pub memory_usage_pct: f64,
    pub disk_usage_pct: f64,
    pub status: CapacityStatus,
    pub computed_at: u64,
}

/// Summarize one location from the full set of known usage snapshots.
///
/// Filters by `location_id` itself; passing an unfiltered fleet is fine.
pub fn summarize_location(
    location_id: LocationId,
    usages: &[NodeResourceUsage],
) -> LocationSummary {
    let mut summary = LocationSummary {
        location_id,
        total_nodes: 0,
        active_nodes: 0,
        maintenance_nodes: 0,
        total_memory_mb: 0,
        total_disk_mb: 0,
        allocated_memory_mb: 0,
        allocated_disk_mb: 0,
        available_memory_mb: 0,
        available_disk_mb: 0,
        total_workloads: 0,
        memory_usage_pct: 0.0,
        disk_usage_pct: 0.0,
        status: CapacityStatus::Maintenance,
        computed_at: epoch_secs(),
    };

    for usage in usages.iter().filter(|u| u.location_id == location_id) {
        summary.total_nodes += 1;
        if usage.maintenance {
            summary.maintenance_nodes += 1;
        } else {
            summary.active_nodes += 1;
        }
        summary.total_memory_mb += usage.effective_memory_mb();
        summary.total_disk_mb += usage.effective_disk_mb();
        summary.allocated_memory_mb += usage.allocated_memory_mb;
        summary.allocated_disk_mb += usage.allocated_disk_mb;
        summary.available_memory_mb += usage.available_memory_mb();
        summary.available_disk_mb += usage.available_disk_mb();
        summary.total_workloads += usage.total_workloads;
    }

    let memory_pct = utilization_pct(summary.allocated_memory_mb, summary.total_memory_mb);
    let disk_pct = utilization_pct(summary.allocated_disk_mb, summary.total_disk_mb);
    summary.memory_usage_pct = round2(memory_pct);
    summary.disk_usage_pct = round2(disk_pct);

    // Zero active nodes forces maintenance regardless of summed capacity.
    summary.status = if summary.active_nodes == 0 {
        CapacityStatus::Maintenance
    } else {
        CapacityStatus::from_utilization(memory_pct, disk_pct)
    };

    summary
}
