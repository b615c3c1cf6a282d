//! Raw descriptors as delivered by the hosting panel.
//!
//! These mirror the panel's wire attributes for nodes and the workloads
//! (game servers) placed on them. They carry declared capacity and limits,
//! not live consumption — the capacity engine derives everything else.

use serde::{Deserialize, Serialize};

/// Unique identifier for a hosting node.
pub type NodeId = u32;

/// Unique identifier for a location (a group of nodes).
pub type LocationId = u32;

// ── Node ──────────────────────────────────────────────────────────

/// A hosting node as reported by the panel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeDescriptor {
    pub id: NodeId,
    pub name: String,
    /// Panel-assigned unique instance id.
    pub uuid: String,
    pub location_id: LocationId,
    /// Network address (fqdn) the node is reached at.
    pub address: String,
    /// Authoritative maintenance flag; overrides all numeric status rules.
    pub maintenance: bool,
    /// Physical memory capacity in MB.
    pub memory_mb: u64,
    /// Physical disk capacity in MB.
    pub disk_mb: u64,
    /// Percentage by which memory may be overallocated beyond physical capacity.
    pub memory_overallocate_pct: u32,
    /// Percentage by which disk may be overallocated beyond physical capacity.
    pub disk_overallocate_pct: u32,
}

// ── Workload ──────────────────────────────────────────────────────

/// A workload (game server) hosted on a node.
///
/// Limits are the declared reservation; suspended workloads still hold
/// their reservation on the node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkloadDescriptor {
    pub node_id: NodeId,
    pub suspended: bool,
    /// Declared memory limit in MB.
    pub memory_limit_mb: u64,
    /// Declared disk limit in MB.
    pub disk_limit_mb: u64,
}
