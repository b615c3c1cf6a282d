//! hostfleet-placement — the pure algorithmic core of capacity planning.
//!
//! No I/O and no shared state live here; everything is a function of its
//! inputs, which is what makes the scoring model testable in isolation.
//!
//! # Components
//!
//! - **`usage`** — per-node snapshot computation (overallocation, status)
//! - **`location`** — aggregation of snapshots into location summaries
//! - **`scorer`** — load score (pressure) and fit score (requirement match)
//! - **`selector`** — viable filtering, deterministic ranking, selection

pub mod location;
pub mod scorer;
pub mod selector;
pub mod usage;

pub use location::{LocationSummary, summarize_location};
pub use scorer::{LoadScore, ResourceRequirement, ScoringConfig, fit_score, load_score};
pub use selector::{
    Alternative, AlternativeReason, ScoredCandidate, Selection, is_viable, pick_node,
    rank_candidates,
};
pub use usage::{CapacityStatus, NodeResourceUsage, compute_node_usage, round2, utilization_pct};
