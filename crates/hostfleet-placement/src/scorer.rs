//! Node scoring for placement decisions.
//!
//! Two cooperating scores:
//! - **Load score** (lower is better): general pressure on a node,
//!   independent of any specific requirement.
//! - **Fit score** (higher is better): how well a node suits one concrete
//!   resource requirement, rewarding placements that use a meaningful
//!   fraction of free space and land near a target utilization.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::usage::{CapacityStatus, NodeResourceUsage, round2, utilization_pct};

/// Resource requirement for a prospective workload. Immutable input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceRequirement {
    /// Memory needed in MB.
    pub memory_mb: u64,
    /// Disk needed in MB.
    pub disk_mb: u64,
    /// Optional CPU hint (not used for admission).
    pub cpu: Option<u32>,
}

impl ResourceRequirement {
    pub fn new(memory_mb: u64, disk_mb: u64) -> Self {
        Self {
            memory_mb,
            disk_mb,
            cpu: None,
        }
    }
}

/// Weights and tunables for the scoring model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub load_memory_weight: f64,
    pub load_disk_weight: f64,
    pub load_density_weight: f64,
    pub load_availability_weight: f64,
    /// Weight of each efficiency term (memory and disk) in the fit score.
    pub fit_efficiency_weight: f64,
    /// Weight of each utilization-closeness term in the fit score.
    pub fit_utilization_weight: f64,
    /// Post-placement utilization the fit score steers toward.
    pub target_utilization_pct: f64,
    /// Assumed memory footprint per workload for the density heuristic, MB.
    /// A ranking tunable only; never used for admission decisions.
    pub workload_footprint_mb: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            load_memory_weight: 0.4,
            load_disk_weight: 0.3,
            load_density_weight: 0.2,
            load_availability_weight: 0.1,
            fit_efficiency_weight: 0.3,
            fit_utilization_weight: 0.2,
            target_utilization_pct: 70.0,
            workload_footprint_mb: 1024,
        }
    }
}

/// Outcome of load scoring.
///
/// A maintenance node is never a candidate; the tagged variant keeps that
/// outcome out of numeric comparisons entirely (no infinity sentinel).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadScore {
    /// Node must never be selected (maintenance).
    Unselectable,
    /// Weighted pressure score; lower is better.
    Scored(f64),
}

impl LoadScore {
    pub fn value(&self) -> Option<f64> {
        match self {
            LoadScore::Unselectable => None,
            LoadScore::Scored(v) => Some(*v),
        }
    }

    pub fn is_selectable(&self) -> bool {
        matches!(self, LoadScore::Scored(_))
    }
}

impl PartialOrd for LoadScore {
    /// Any real score orders before `Unselectable`.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (LoadScore::Scored(a), LoadScore::Scored(b)) => a.partial_cmp(b),
            (LoadScore::Scored(_), LoadScore::Unselectable) => Some(Ordering::Less),
            (LoadScore::Unselectable, LoadScore::Scored(_)) => Some(Ordering::Greater),
            (LoadScore::Unselectable, LoadScore::Unselectable) => Some(Ordering::Equal),
        }
    }
}

/// General pressure on a node, independent of any requirement.
///
/// `0.4·memory% + 0.3·disk% + 0.2·density% + 0.1·penalty`, rounded to
/// 2 decimals. Density estimates how many workloads the node could hold
/// at the configured footprint; the penalty reflects the status class.
pub fn load_score(usage: &NodeResourceUsage, config: &ScoringConfig) -> LoadScore {
    if usage.maintenance {
        return LoadScore::Unselectable;
    }

    let memory_pct = usage.raw_memory_pct();
    let disk_pct = usage.raw_disk_pct();
    let density_pct = server_density_pct(usage, config);
    let penalty = availability_penalty(usage.status());

    let score = config.load_memory_weight * memory_pct
        + config.load_disk_weight * disk_pct
        + config.load_density_weight * density_pct
        + config.load_availability_weight * penalty;

    LoadScore::Scored(round2(score))
}

/// How full the node is in workload-count terms, capped at 100.
fn server_density_pct(usage: &NodeResourceUsage, config: &ScoringConfig) -> f64 {
    let estimated_max = if config.workload_footprint_mb == 0 {
        0
    } else {
        usage.effective_memory_mb() / config.workload_footprint_mb
    };
    if estimated_max == 0 {
        // Node too small to hold even one estimated workload: saturated.
        return 100.0;
    }
    (f64::from(usage.total_workloads) / estimated_max as f64 * 100.0).min(100.0)
}

fn availability_penalty(status: CapacityStatus) -> f64 {
    match status {
        CapacityStatus::Available => 0.0,
        CapacityStatus::Limited => 50.0,
        CapacityStatus::Full | CapacityStatus::Maintenance => 100.0,
    }
}

/// How well a node suits one concrete requirement; higher is better.
///
/// 0 when the node is in maintenance or cannot hold the requirement.
/// Otherwise rewards requirements that consume a meaningful fraction of
/// free space (efficiency, capped at 100) and post-placement utilization
/// near the configured target.
pub fn fit_score(
    usage: &NodeResourceUsage,
    requirement: &ResourceRequirement,
    config: &ScoringConfig,
) -> f64 {
    if usage.maintenance {
        return 0.0;
    }
    let available_memory = usage.available_memory_mb();
    let available_disk = usage.available_disk_mb();
    if requirement.memory_mb > available_memory || requirement.disk_mb > available_disk {
        return 0.0;
    }

    let memory_efficiency = efficiency_pct(requirement.memory_mb, available_memory);
    let disk_efficiency = efficiency_pct(requirement.disk_mb, available_disk);

    let projected_memory_pct = utilization_pct(
        usage.allocated_memory_mb + requirement.memory_mb,
        usage.effective_memory_mb(),
    );
    let projected_disk_pct = utilization_pct(
        usage.allocated_disk_mb + requirement.disk_mb,
        usage.effective_disk_mb(),
    );
    let memory_utilization = 100.0 - (projected_memory_pct - config.target_utilization_pct).abs();
    let disk_utilization = 100.0 - (projected_disk_pct - config.target_utilization_pct).abs();

    let score = config.fit_efficiency_weight * (memory_efficiency + disk_efficiency)
        + config.fit_utilization_weight * (memory_utilization + disk_utilization);

    round2(score.max(0.0))
}

/// Fraction of free space the requirement would consume, capped at 100.
fn efficiency_pct(required: u64, available: u64) -> f64 {
    if available == 0 {
        // Only reachable when required is 0 too: consumes all that's left.
        return 100.0;
    }
    (required as f64 / available as f64 * 100.0).min(100.0)
}
