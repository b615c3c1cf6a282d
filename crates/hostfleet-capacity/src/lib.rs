//! hostfleet-capacity — the stateful capacity engine.
//!
//! Sits between callers (a provisioning workflow, the CLI) and the panel
//! data source. Owns the staleness-aware [`UsageCache`] and exposes the
//! public operations: capacity checks, node selection, location
//! summaries, and fleet stats.
//!
//! # Architecture
//!
//! ```text
//! CapacityEngine
//!   ├── PanelSource (remote node/workload inventory)
//!   ├── UsageCache (per-item TTLs + fleet refresh timer)
//!   ├── single-flight guards (dedupe concurrent refreshes)
//!   └── hostfleet-placement (pure scoring and ranking)
//! ```

pub mod cache;
pub mod engine;

pub use cache::{CacheConfig, UsageCache};
pub use engine::{
    CapacityCheckResult, CapacityEngine, FleetStats, NodeSelectionResult, SelectionFailure,
};
