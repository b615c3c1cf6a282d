//! Candidate ranking and winner selection.
//!
//! Filters the usage snapshots of a location down to viable nodes, scores
//! each with both the fit and load models, and produces a deterministic
//! ordering: fit score descending, ties broken by load score ascending,
//! final tie by node id. The winner comes with a human-readable
//! justification; runners-up are annotated with why they lost.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use hostfleet_panel::NodeId;

use crate::scorer::{LoadScore, ResourceRequirement, ScoringConfig, fit_score, load_score};
use crate::usage::{CapacityStatus, NodeResourceUsage};

/// A viable node with both scores attached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredCandidate {
    pub node_id: NodeId,
    pub name: String,
    pub status: CapacityStatus,
    /// Higher is better.
    pub fit_score: f64,
    /// Lower is better.
    pub load_score: f64,
    pub available_memory_mb: u64,
    pub available_disk_mb: u64,
}

/// Why a ranked runner-up was not chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlternativeReason {
    LowerFitScore,
    HigherLoadScore,
}

impl fmt::Display for AlternativeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlternativeReason::LowerFitScore => "lower fit score",
            AlternativeReason::HigherLoadScore => "higher load score",
        };
        f.write_str(s)
    }
}

/// A runner-up node, annotated with why it lost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alternative {
    pub candidate: ScoredCandidate,
    pub reason: AlternativeReason,
}

/// The winning node plus ordered alternatives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Selection {
    pub winner: ScoredCandidate,
    pub justification: String,
    pub alternatives: Vec<Alternative>,
}

/// How many runners-up accompany a selection.
const MAX_ALTERNATIVES: usize = 3;

/// A node can individually hold the requirement and is not in maintenance.
pub fn is_viable(usage: &NodeResourceUsage, requirement: &ResourceRequirement) -> bool {
    !usage.maintenance
        && usage.available_memory_mb() >= requirement.memory_mb
        && usage.available_disk_mb() >= requirement.disk_mb
}

/// Score every viable node and return them in selection order.
pub fn rank_candidates(
    usages: &[NodeResourceUsage],
    requirement: &ResourceRequirement,
    config: &ScoringConfig,
) -> Vec<ScoredCandidate> {
    let mut candidates: Vec<ScoredCandidate> = usages
        .iter()
        .filter(|u| is_viable(u, requirement))
        .filter_map(|u| {
            let LoadScore::Scored(load) = load_score(u, config) else {
                return None;
            };
            Some(ScoredCandidate {
                node_id: u.node_id,
                name: u.name.clone(),
                status: u.status(),
                fit_score: fit_score(u, requirement, config),
                load_score: load,
                available_memory_mb: u.available_memory_mb(),
                available_disk_mb: u.available_disk_mb(),
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.fit_score
            .partial_cmp(&a.fit_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                a.load_score
                    .partial_cmp(&b.load_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.node_id.cmp(&b.node_id))
    });

    candidates
}

/// Pick the optimal node for a requirement, or `None` when no node is viable.
pub fn pick_node(
    usages: &[NodeResourceUsage],
    requirement: &ResourceRequirement,
    config: &ScoringConfig,
) -> Option<Selection> {
    let ranked = rank_candidates(usages, requirement, config);
    let winner = ranked.first()?.clone();

    debug!(
        node = %winner.name,
        fit = winner.fit_score,
        load = winner.load_score,
        candidates = ranked.len(),
        "node selected"
    );

    let justification = format!(
        "selected node {} (#{}) with fit score {:.2} and load score {:.2} (status: {})",
        winner.name, winner.node_id, winner.fit_score, winner.load_score, winner.status
    );

    let alternatives = ranked
        .into_iter()
        .skip(1)
        .take(MAX_ALTERNATIVES)
        .map(|candidate| {
            let reason = if candidate.fit_score < winner.fit_score {
                AlternativeReason::LowerFitScore
            } else {
                AlternativeReason::HigherLoadScore
            };
            Alternative { candidate, reason }
        })
        .collect();

    Some(Selection {
        winner,
        justification,
        alternatives,
    })
}
