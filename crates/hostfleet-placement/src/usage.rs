//! Per-node usage snapshots.
//!
//! [`compute_node_usage`] is the pure transformation from a raw panel
//! descriptor plus its hosted workloads into a [`NodeResourceUsage`]
//! snapshot. Effective limits honor the panel's overallocation
//! percentages; availability is clamped at zero; the status
//! classification is a pure function of the maintenance flag and the
//! utilization percentages.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use hostfleet_panel::{LocationId, NodeDescriptor, NodeId, WorkloadDescriptor};

/// Utilization at or above this percentage classifies as full.
pub const FULL_THRESHOLD_PCT: f64 = 95.0;

/// Utilization at or above this percentage classifies as limited.
pub const LIMITED_THRESHOLD_PCT: f64 = 80.0;

/// Capacity classification for a node or a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityStatus {
    Available,
    Limited,
    Full,
    Maintenance,
}

impl CapacityStatus {
    /// Classify from utilization percentages alone (no maintenance input).
    ///
    /// Thresholds are inclusive on the upper bound: exactly 95.0% is full,
    /// exactly 80.0% is limited.
    pub fn from_utilization(memory_pct: f64, disk_pct: f64) -> Self {
        let pct = memory_pct.max(disk_pct);
        if pct >= FULL_THRESHOLD_PCT {
            CapacityStatus::Full
        } else if pct >= LIMITED_THRESHOLD_PCT {
            CapacityStatus::Limited
        } else {
            CapacityStatus::Available
        }
    }
}

impl fmt::Display for CapacityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CapacityStatus::Available => "available",
            CapacityStatus::Limited => "limited",
            CapacityStatus::Full => "full",
            CapacityStatus::Maintenance => "maintenance",
        };
        f.write_str(s)
    }
}

/// Point-in-time resource snapshot for a single hosting node.
///
/// Stores identity, capacity, allocation, and counts; everything derived
/// (effective limits, availability, percentages, status) is computed from
/// those fields and never stored independently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeResourceUsage {
    pub node_id: NodeId,
    pub name: String,
    pub uuid: String,
    pub location_id: LocationId,
    pub address: String,
    pub maintenance: bool,
    /// Physical memory capacity in MB.
    pub total_memory_mb: u64,
    /// Physical disk capacity in MB.
    pub total_disk_mb: u64,
    pub memory_overallocate_pct: u32,
    pub disk_overallocate_pct: u32,
    /// Memory reserved by hosted workloads (sum of declared limits, MB).
    pub allocated_memory_mb: u64,
    /// Disk reserved by hosted workloads (sum of declared limits, MB).
    pub allocated_disk_mb: u64,
    pub total_workloads: u32,
    pub active_workloads: u32,
    pub suspended_workloads: u32,
    /// Unix timestamp (seconds) when this snapshot was computed.
    pub computed_at: u64,
}

impl NodeResourceUsage {
    /// Memory capacity including the overallocation margin, in MB.
    pub fn effective_memory_mb(&self) -> u64 {
        self.total_memory_mb * (100 + u64::from(self.memory_overallocate_pct)) / 100
    }

    /// Disk capacity including the overallocation margin, in MB.
    pub fn effective_disk_mb(&self) -> u64 {
        self.total_disk_mb * (100 + u64::from(self.disk_overallocate_pct)) / 100
    }

    /// Unreserved memory, clamped at zero.
    pub fn available_memory_mb(&self) -> u64 {
        self.effective_memory_mb().saturating_sub(self.allocated_memory_mb)
    }

    /// Unreserved disk, clamped at zero.
    pub fn available_disk_mb(&self) -> u64 {
        self.effective_disk_mb().saturating_sub(self.allocated_disk_mb)
    }

    /// Memory utilization percentage, rounded to 2 decimals.
    pub fn memory_usage_pct(&self) -> f64 {
        round2(self.raw_memory_pct())
    }

    /// Disk utilization percentage, rounded to 2 decimals.
    pub fn disk_usage_pct(&self) -> f64 {
        round2(self.raw_disk_pct())
    }

    /// Status classification: the maintenance flag is authoritative,
    /// otherwise derived from the unrounded utilization percentages.
    pub fn status(&self) -> CapacityStatus {
        if self.maintenance {
            return CapacityStatus::Maintenance;
        }
        CapacityStatus::from_utilization(self.raw_memory_pct(), self.raw_disk_pct())
    }

    pub(crate) fn raw_memory_pct(&self) -> f64 {
        utilization_pct(self.allocated_memory_mb, self.effective_memory_mb())
    }

    pub(crate) fn raw_disk_pct(&self) -> f64 {
        utilization_pct(self.allocated_disk_mb, self.effective_disk_mb())
    }
}

/// Compute a usage snapshot for one node from its raw descriptor and the
/// workloads currently placed on it.
///
/// Suspended workloads still hold their declared reservation; they only
/// differ in the active/suspended counts.
pub fn compute_node_usage(
    node: &NodeDescriptor,
    workloads: &[WorkloadDescriptor],
) -> NodeResourceUsage {
    let mut allocated_memory_mb = 0u64;
    let mut allocated_disk_mb = 0u64;
    let mut total_workloads = 0u32;
    let mut suspended_workloads = 0u32;

    for w in workloads.iter().filter(|w| w.node_id == node.id) {
        allocated_memory_mb += w.memory_limit_mb;
        allocated_disk_mb += w.disk_limit_mb;
        total_workloads += 1;
        if w.suspended {
            suspended_workloads += 1;
        }
    }

    NodeResourceUsage {
        node_id: node.id,
        name: node.name.clone(),
        uuid: node.uuid.clone(),
        location_id: node.location_id,
        address: node.address.clone(),
        maintenance: node.maintenance,
        total_memory_mb: node.memory_mb,
        total_disk_mb: node.disk_mb,
        memory_overallocate_pct: node.memory_overallocate_pct,
        disk_overallocate_pct: node.disk_overallocate_pct,
        allocated_memory_mb,
        allocated_disk_mb,
        total_workloads,
        active_workloads: total_workloads - suspended_workloads,
        suspended_workloads,
        computed_at: epoch_secs(),
    }
}

/// Percentage of `allocated` against `capacity`, 0 when capacity is 0.
pub fn utilization_pct(allocated: u64, capacity: u64) -> f64 {
    if capacity == 0 {
        return 0.0;
    }
    allocated as f64 / capacity as f64 * 100.0
}

/// Round to 2 decimal places.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
