//! The capacity engine — cache-backed checks, summaries, and selection.
//!
//! Read-driven: every entry point serves from the cache when it can and
//! refreshes lazily when it can't. A fleet-wide refresh (forced or
//! timer-driven) fans out the panel's batch endpoints concurrently and
//! replaces the whole snapshot; individually stale nodes are refetched
//! under a per-key single-flight guard so concurrent callers share one
//! in-flight fetch.
//!
//! Every public operation returns a fully formed value. Panel failures
//! are logged and degrade to absent data for the cycle; business
//! failures (insufficient capacity, no viable node) are typed results,
//! never errors.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use hostfleet_panel::{LocationId, NodeId, PanelSource, WorkloadDescriptor};
use hostfleet_placement::{
    CapacityStatus, LocationSummary, NodeResourceUsage, ResourceRequirement, ScoredCandidate,
    ScoringConfig, Selection, compute_node_usage, pick_node, rank_candidates, round2,
    summarize_location, utilization_pct,
};

use crate::cache::{CacheConfig, UsageCache};

/// Recommended-node cap in a capacity check.
const MAX_RECOMMENDED: usize = 5;

/// Projected utilization above this percentage triggers a warning.
const PROJECTED_WARNING_PCT: f64 = 90.0;

/// Outcome of a location capacity check. Always well formed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapacityCheckResult {
    pub location_id: LocationId,
    pub can_accommodate: bool,
    pub location_status: CapacityStatus,
    pub available_memory_mb: u64,
    pub available_disk_mb: u64,
    pub required_memory_mb: u64,
    pub required_disk_mb: u64,
    pub active_nodes: u32,
    /// What memory utilization would become if the requirement were
    /// admitted. Display only; the check never mutates state.
    pub projected_memory_pct: f64,
    pub projected_disk_pct: f64,
    pub warnings: Vec<String>,
    /// Up to five candidate nodes, best fit first.
    pub recommended_nodes: Vec<ScoredCandidate>,
}

/// Outcome of node selection: a winner or a typed failure, never an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NodeSelectionResult {
    Selected(Selection),
    Failed(SelectionFailure),
}

/// Why selection failed. "Location not admissible" (exhaustion) and
/// "no viable nodes" (fragmentation) are deliberately distinct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SelectionFailure {
    LocationNotAdmissible {
        location_id: LocationId,
        location_status: CapacityStatus,
        available_memory_mb: u64,
        required_memory_mb: u64,
        available_disk_mb: u64,
        required_disk_mb: u64,
        message: String,
    },
    NoViableNodes {
        location_id: LocationId,
        active_nodes: u32,
        message: String,
    },
}

/// Fleet-wide aggregate over all known nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FleetStats {
    pub total_nodes: u32,
    pub active_nodes: u32,
    pub maintenance_nodes: u32,
    pub total_locations: u32,
    pub total_memory_mb: u64,
    pub allocated_memory_mb: u64,
    pub total_disk_mb: u64,
    pub allocated_disk_mb: u64,
    pub memory_usage_pct: f64,
    pub disk_usage_pct: f64,
    pub total_workloads: u32,
}

/// Single-flight keys: one per node plus one for the fleet batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FlightKey {
    Fleet,
    Node(NodeId),
}

/// Capacity monitoring and node placement over a panel data source.
pub struct CapacityEngine<P> {
    panel: P,
    cache: UsageCache,
    scoring: ScoringConfig,
    /// In-flight refresh guards; concurrent refreshes of the same key
    /// share one fetch.
    flights: Mutex<HashMap<FlightKey, Arc<Mutex<()>>>>,
}

impl<P: PanelSource> CapacityEngine<P> {
    /// Engine with default cache windows and scoring weights.
    pub fn new(panel: P) -> Self {
        Self {
            panel,
            cache: UsageCache::default(),
            scoring: ScoringConfig::default(),
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the cache (freshness windows are part of the cache).
    pub fn with_cache(mut self, cache: UsageCache) -> Self {
        self.cache = cache;
        self
    }

    /// Convenience for [`Self::with_cache`] from a config.
    pub fn with_cache_config(self, config: CacheConfig) -> Self {
        self.with_cache(UsageCache::new(config))
    }

    /// Replace the scoring tunables.
    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    // ── Public operations ───────────────────────────────────────────

    /// Can this location take the requirement, and which nodes should
    /// host it? Never fails; unresolvable locations and panel outages
    /// yield a non-admissible result with a warning.
    pub async fn check_capacity(
        &self,
        location_id: LocationId,
        requirement: &ResourceRequirement,
        force_refresh: bool,
    ) -> CapacityCheckResult {
        let usages = self.location_usages(location_id, force_refresh).await;
        if usages.is_empty() {
            warn!(location_id, "capacity check against unresolvable location");
            return self.unresolved_location(location_id, requirement);
        }

        let summary = summarize_location(location_id, &usages);
        self.cache.set_summary(summary.clone()).await;

        let can_accommodate = summary.available_memory_mb >= requirement.memory_mb
            && summary.available_disk_mb >= requirement.disk_mb
            && summary.active_nodes > 0;

        let projected_memory_pct = round2(utilization_pct(
            summary.allocated_memory_mb + requirement.memory_mb,
            summary.total_memory_mb,
        ));
        let projected_disk_pct = round2(utilization_pct(
            summary.allocated_disk_mb + requirement.disk_mb,
            summary.total_disk_mb,
        ));

        let mut recommended_nodes = rank_candidates(&usages, requirement, &self.scoring);
        recommended_nodes.truncate(MAX_RECOMMENDED);

        let mut warnings = Vec::new();
        if projected_memory_pct > PROJECTED_WARNING_PCT {
            warnings.push(format!(
                "projected memory utilization would reach {projected_memory_pct:.2}%"
            ));
        }
        if projected_disk_pct > PROJECTED_WARNING_PCT {
            warnings.push(format!(
                "projected disk utilization would reach {projected_disk_pct:.2}%"
            ));
        }
        if summary.active_nodes < 2 {
            warnings.push(format!(
                "only {} active node(s) in location {location_id}: no redundancy for failover",
                summary.active_nodes
            ));
        }
        if can_accommodate && recommended_nodes.is_empty() {
            warnings.push(
                "aggregate capacity is sufficient but no single node can hold the \
                 requirement (fragmented free space)"
                    .to_string(),
            );
        }

        debug!(
            location_id,
            can_accommodate,
            candidates = recommended_nodes.len(),
            warnings = warnings.len(),
            "capacity check completed"
        );

        CapacityCheckResult {
            location_id,
            can_accommodate,
            location_status: summary.status,
            available_memory_mb: summary.available_memory_mb,
            available_disk_mb: summary.available_disk_mb,
            required_memory_mb: requirement.memory_mb,
            required_disk_mb: requirement.disk_mb,
            active_nodes: summary.active_nodes,
            projected_memory_pct,
            projected_disk_pct,
            warnings,
            recommended_nodes,
        }
    }

    /// Pick the optimal node for the requirement.
    ///
    /// Linear, no retries: admissibility check first (fail fast with the
    /// exact numbers), then viable-node ranking. Failures are returned,
    /// never thrown.
    pub async fn select_node(
        &self,
        location_id: LocationId,
        requirement: &ResourceRequirement,
        force_refresh: bool,
    ) -> NodeSelectionResult {
        let check = self
            .check_capacity(location_id, requirement, force_refresh)
            .await;

        if !check.can_accommodate {
            let message = format!(
                "location {location_id} cannot accommodate the requirement: \
                 {} MB memory available of {} MB required, \
                 {} MB disk available of {} MB required, {} active node(s)",
                check.available_memory_mb,
                check.required_memory_mb,
                check.available_disk_mb,
                check.required_disk_mb,
                check.active_nodes,
            );
            info!(location_id, "selection failed: location not admissible");
            return NodeSelectionResult::Failed(SelectionFailure::LocationNotAdmissible {
                location_id,
                location_status: check.location_status,
                available_memory_mb: check.available_memory_mb,
                required_memory_mb: check.required_memory_mb,
                available_disk_mb: check.available_disk_mb,
                required_disk_mb: check.required_disk_mb,
                message,
            });
        }

        // The check above just refreshed whatever needed refreshing.
        let usages = self.location_usages(location_id, false).await;
        match pick_node(&usages, requirement, &self.scoring) {
            Some(selection) => {
                info!(
                    location_id,
                    node = %selection.winner.name,
                    fit = selection.winner.fit_score,
                    load = selection.winner.load_score,
                    "node selected"
                );
                NodeSelectionResult::Selected(selection)
            }
            None => {
                let message = format!(
                    "location {location_id} has sufficient aggregate capacity but no \
                     single node can hold {} MB memory / {} MB disk",
                    requirement.memory_mb, requirement.disk_mb
                );
                info!(location_id, "selection failed: no viable nodes");
                NodeSelectionResult::Failed(SelectionFailure::NoViableNodes {
                    location_id,
                    active_nodes: check.active_nodes,
                    message,
                })
            }
        }
    }

    /// Cache-backed summary for one location; `None` when unknown.
    pub async fn location_summary(
        &self,
        location_id: LocationId,
        force_refresh: bool,
    ) -> Option<LocationSummary> {
        if !force_refresh {
            if let Some(summary) = self.cache.get_summary(location_id).await {
                return Some(summary);
            }
        }

        let usages = self.location_usages(location_id, force_refresh).await;
        if usages.is_empty() {
            return None;
        }
        let summary = summarize_location(location_id, &usages);
        self.cache.set_summary(summary.clone()).await;
        Some(summary)
    }

    /// Summaries for every known location, ordered by location id.
    pub async fn all_location_summaries(&self, force_refresh: bool) -> Vec<LocationSummary> {
        let usages = self.fleet_usages(force_refresh).await;
        let location_ids: BTreeSet<LocationId> =
            usages.iter().map(|u| u.location_id).collect();

        let mut summaries = Vec::with_capacity(location_ids.len());
        for location_id in location_ids {
            let summary = summarize_location(location_id, &usages);
            self.cache.set_summary(summary.clone()).await;
            summaries.push(summary);
        }
        summaries
    }

    /// Fleet-wide aggregate stats.
    pub async fn fleet_stats(&self, force_refresh: bool) -> FleetStats {
        let usages = self.fleet_usages(force_refresh).await;

        let mut stats = FleetStats::default();
        let mut locations = BTreeSet::new();
        for usage in &usages {
            stats.total_nodes += 1;
            if usage.maintenance {
                stats.maintenance_nodes += 1;
            } else {
                stats.active_nodes += 1;
            }
            stats.total_memory_mb += usage.effective_memory_mb();
            stats.total_disk_mb += usage.effective_disk_mb();
            stats.allocated_memory_mb += usage.allocated_memory_mb;
            stats.allocated_disk_mb += usage.allocated_disk_mb;
            stats.total_workloads += usage.total_workloads;
            locations.insert(usage.location_id);
        }
        stats.total_locations = locations.len() as u32;
        stats.memory_usage_pct =
            round2(utilization_pct(stats.allocated_memory_mb, stats.total_memory_mb));
        stats.disk_usage_pct =
            round2(utilization_pct(stats.allocated_disk_mb, stats.total_disk_mb));
        stats
    }

    /// Drop all cached state; the next read refetches the fleet.
    pub async fn invalidate(&self) {
        self.cache.clear().await;
    }

    // ── Refresh machinery ───────────────────────────────────────────

    /// Current usage snapshots for one location, refreshing lazily.
    async fn location_usages(
        &self,
        location_id: LocationId,
        force_refresh: bool,
    ) -> Vec<NodeResourceUsage> {
        if force_refresh || self.cache.needs_full_update().await {
            self.full_refresh(force_refresh).await;
        }

        let known = self.cache.known_nodes().await;
        let mut usages = Vec::new();
        for stale_or_fresh in known.into_iter().filter(|u| u.location_id == location_id) {
            if let Some(fresh) = self.cache.get_node(stale_or_fresh.node_id).await {
                usages.push(fresh);
            } else if let Some(refreshed) = self.refresh_node(stale_or_fresh.node_id).await {
                usages.push(refreshed);
            }
        }
        usages
    }

    /// Current usage snapshots for the whole fleet, refreshing lazily.
    async fn fleet_usages(&self, force_refresh: bool) -> Vec<NodeResourceUsage> {
        if force_refresh || self.cache.needs_full_update().await {
            self.full_refresh(force_refresh).await;
        }

        let known = self.cache.known_nodes().await;
        let mut usages = Vec::with_capacity(known.len());
        for stale_or_fresh in known {
            if let Some(fresh) = self.cache.get_node(stale_or_fresh.node_id).await {
                usages.push(fresh);
            } else if let Some(refreshed) = self.refresh_node(stale_or_fresh.node_id).await {
                usages.push(refreshed);
            }
        }
        usages
    }

    /// Batched fleet refetch: nodes and workloads fetched concurrently,
    /// recomputed in one batch, swapped in atomically. Single-flighted;
    /// a timer-driven caller that waited out another flight skips.
    async fn full_refresh(&self, force: bool) {
        let guard = self.flight_guard(FlightKey::Fleet).await;
        let _flight = guard.lock().await;

        if !force && !self.cache.needs_full_update().await {
            debug!("fleet refresh already completed by a concurrent caller");
            return;
        }

        let (nodes, servers) = tokio::join!(self.panel.all_nodes(), self.panel.all_servers());
        let (nodes, servers) = match (nodes, servers) {
            (Ok(nodes), Ok(servers)) => (nodes, servers),
            (Err(e), _) | (_, Err(e)) => {
                // Degraded cycle: keep whatever the cache holds and leave
                // the fleet timer unarmed so the next read retries.
                warn!(error = %e, "fleet refresh failed");
                return;
            }
        };

        let mut by_node: HashMap<NodeId, Vec<WorkloadDescriptor>> = HashMap::new();
        for server in servers {
            by_node.entry(server.node_id).or_default().push(server);
        }

        let usages: Vec<NodeResourceUsage> = nodes
            .iter()
            .map(|node| {
                let workloads = by_node.get(&node.id).map_or(&[][..], Vec::as_slice);
                compute_node_usage(node, workloads)
            })
            .collect();

        info!(nodes = usages.len(), "fleet snapshot recomputed");
        self.cache.replace_all(usages).await;
        self.cache.mark_full_update_completed().await;
    }

    /// Refetch one stale node under its single-flight guard.
    async fn refresh_node(&self, id: NodeId) -> Option<NodeResourceUsage> {
        let guard = self.flight_guard(FlightKey::Node(id)).await;
        let _flight = guard.lock().await;

        // A concurrent flight may have refreshed it while we waited.
        if let Some(usage) = self.cache.get_node(id).await {
            return Some(usage);
        }

        let (node, servers) =
            tokio::join!(self.panel.node_details(id), self.panel.servers_by_node(id));
        match (node, servers) {
            (Ok(node), Ok(servers)) => {
                let usage = compute_node_usage(&node, &servers);
                self.cache.set_node(usage.clone()).await;
                debug!(node_id = id, "node snapshot refreshed");
                Some(usage)
            }
            (Err(e), _) | (_, Err(e)) => {
                // Absent for this cycle; the entry stays stale and the
                // next read retries.
                warn!(node_id = id, error = %e, "node refresh failed");
                None
            }
        }
    }

    async fn flight_guard(&self, key: FlightKey) -> Arc<Mutex<()>> {
        let mut flights = self.flights.lock().await;
        flights
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn unresolved_location(
        &self,
        location_id: LocationId,
        requirement: &ResourceRequirement,
    ) -> CapacityCheckResult {
        CapacityCheckResult {
            location_id,
            can_accommodate: false,
            location_status: CapacityStatus::Maintenance,
            available_memory_mb: 0,
            available_disk_mb: 0,
            required_memory_mb: requirement.memory_mb,
            required_disk_mb: requirement.disk_mb,
            active_nodes: 0,
            projected_memory_pct: 0.0,
            projected_disk_pct: 0.0,
            warnings: vec![format!(
                "location {location_id} could not be resolved (unknown id or panel unavailable)"
            )],
            recommended_nodes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use hostfleet_panel::{
        NodeDescriptor, PanelError, PanelResult, StaticSource, WorkloadDescriptor,
    };
    use hostfleet_placement::AlternativeReason;

    fn make_node(id: NodeId, location_id: LocationId, memory_mb: u64) -> NodeDescriptor {
        NodeDescriptor {
            id,
            name: format!("node-{id:02}"),
            uuid: format!("uuid-{id}"),
            location_id,
            address: format!("node{id}.example.com"),
            maintenance: false,
            memory_mb,
            disk_mb: memory_mb * 10,
            memory_overallocate_pct: 0,
            disk_overallocate_pct: 0,
        }
    }

    fn make_server(node_id: NodeId, memory: u64) -> WorkloadDescriptor {
        WorkloadDescriptor {
            node_id,
            suspended: false,
            memory_limit_mb: memory,
            disk_limit_mb: memory * 5,
        }
    }

    fn req(memory: u64, disk: u64) -> ResourceRequirement {
        ResourceRequirement::new(memory, disk)
    }

    /// Panel wrapper that counts outbound calls.
    struct CountingSource {
        inner: StaticSource,
        all_nodes_calls: AtomicUsize,
        node_details_calls: AtomicUsize,
    }

    impl CountingSource {
        fn new(inner: StaticSource) -> Self {
            Self {
                inner,
                all_nodes_calls: AtomicUsize::new(0),
                node_details_calls: AtomicUsize::new(0),
            }
        }
    }

    impl PanelSource for &CountingSource {
        async fn all_nodes(&self) -> PanelResult<Vec<NodeDescriptor>> {
            self.all_nodes_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.all_nodes().await
        }

        async fn node_details(&self, id: NodeId) -> PanelResult<NodeDescriptor> {
            self.node_details_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.node_details(id).await
        }

        async fn servers_by_node(&self, id: NodeId) -> PanelResult<Vec<WorkloadDescriptor>> {
            self.inner.servers_by_node(id).await
        }

        async fn all_servers(&self) -> PanelResult<Vec<WorkloadDescriptor>> {
            self.inner.all_servers().await
        }
    }

    /// Panel that always fails.
    struct DownSource;

    impl PanelSource for DownSource {
        async fn all_nodes(&self) -> PanelResult<Vec<NodeDescriptor>> {
            Err(PanelError::Unavailable("connection refused".to_string()))
        }

        async fn node_details(&self, id: NodeId) -> PanelResult<NodeDescriptor> {
            let _ = id;
            Err(PanelError::Unavailable("connection refused".to_string()))
        }

        async fn servers_by_node(&self, id: NodeId) -> PanelResult<Vec<WorkloadDescriptor>> {
            let _ = id;
            Err(PanelError::Unavailable("connection refused".to_string()))
        }

        async fn all_servers(&self) -> PanelResult<Vec<WorkloadDescriptor>> {
            Err(PanelError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn single_node_round_trip_is_admissible_and_read_only() {
        // One 8 GiB node with 2 GiB allocated; ask for 2 GiB / 1 GiB.
        let source = StaticSource::new(
            vec![make_node(1, 1, 8192)],
            vec![make_server(1, 2048)],
        );
        let engine = CapacityEngine::new(source);
        let requirement = req(2048, 1024);

        let first = engine.check_capacity(1, &requirement, false).await;
        assert!(first.can_accommodate);
        assert_eq!(first.available_memory_mb, 6144);
        assert_eq!(first.recommended_nodes.len(), 1);

        // The check is read-only: availability is unchanged on repeat.
        let second = engine.check_capacity(1, &requirement, false).await;
        assert_eq!(second.available_memory_mb, first.available_memory_mb);
        assert_eq!(second.recommended_nodes.len(), 1);
    }

    #[tokio::test]
    async fn all_maintenance_location_is_not_admissible() {
        let mut node_a = make_node(1, 1, 8192);
        let mut node_b = make_node(2, 1, 8192);
        node_a.maintenance = true;
        node_b.maintenance = true;

        let engine = CapacityEngine::new(StaticSource::new(vec![node_a, node_b], vec![]));
        let result = engine.check_capacity(1, &req(1024, 1024), false).await;

        assert!(!result.can_accommodate);
        assert_eq!(result.location_status, CapacityStatus::Maintenance);
        assert!(result.recommended_nodes.is_empty());
    }

    #[tokio::test]
    async fn unknown_location_is_not_admissible_with_warning() {
        let engine =
            CapacityEngine::new(StaticSource::new(vec![make_node(1, 1, 8192)], vec![]));

        let result = engine.check_capacity(99, &req(1024, 1024), false).await;

        assert!(!result.can_accommodate);
        assert_eq!(result.location_status, CapacityStatus::Maintenance);
        assert!(result.warnings.iter().any(|w| w.contains("99")));
    }

    #[tokio::test]
    async fn redundancy_warning_below_two_active_nodes() {
        let engine =
            CapacityEngine::new(StaticSource::new(vec![make_node(1, 1, 8192)], vec![]));

        let result = engine.check_capacity(1, &req(1024, 1024), false).await;

        assert!(result.can_accommodate);
        assert!(result.warnings.iter().any(|w| w.contains("no redundancy")));
    }

    #[tokio::test]
    async fn projected_utilization_warning() {
        // 10 GB node at 85%; the 1 GB requirement would push it to 95%.
        let source = StaticSource::new(
            vec![make_node(1, 1, 10_000)],
            vec![make_server(1, 8_500)],
        );
        let engine = CapacityEngine::new(source);

        let result = engine.check_capacity(1, &req(1_000, 0), false).await;

        assert!(result.can_accommodate);
        assert_eq!(result.projected_memory_pct, 95.0);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("projected memory utilization")));
    }

    #[tokio::test]
    async fn fragmentation_yields_warning_and_distinct_failure() {
        // Two nodes with 1.5 GB free each: 3 GB in aggregate, but no
        // single node can hold 2 GB.
        let source = StaticSource::new(
            vec![make_node(1, 1, 10_000), make_node(2, 1, 10_000)],
            vec![make_server(1, 8_500), make_server(2, 8_500)],
        );
        let engine = CapacityEngine::new(source);
        let requirement = req(2_000, 1_000);

        let check = engine.check_capacity(1, &requirement, false).await;
        assert!(check.can_accommodate);
        assert!(check.recommended_nodes.is_empty());
        assert!(check.warnings.iter().any(|w| w.contains("fragmented")));

        let selection = engine.select_node(1, &requirement, false).await;
        assert!(matches!(
            selection,
            NodeSelectionResult::Failed(SelectionFailure::NoViableNodes { .. })
        ));
    }

    #[tokio::test]
    async fn not_admissible_fails_fast_with_numbers() {
        let source = StaticSource::new(
            vec![make_node(1, 1, 8192)],
            vec![make_server(1, 2048)],
        );
        let engine = CapacityEngine::new(source);

        let result = engine.select_node(1, &req(100_000, 0), false).await;

        let NodeSelectionResult::Failed(SelectionFailure::LocationNotAdmissible {
            available_memory_mb,
            required_memory_mb,
            message,
            ..
        }) = result
        else {
            panic!("expected a not-admissible failure");
        };
        assert_eq!(available_memory_mb, 6144);
        assert_eq!(required_memory_mb, 100_000);
        assert!(message.contains("6144"));
        assert!(message.contains("100000"));
    }

    #[tokio::test]
    async fn tie_on_fit_selects_lower_load_node() {
        // Same capacity and allocation; node 2 carries more workloads and
        // therefore a higher load score at an identical fit score.
        let source = StaticSource::new(
            vec![make_node(1, 1, 8192), make_node(2, 1, 8192)],
            vec![
                make_server(1, 2048),
                make_server(2, 1024),
                make_server(2, 512),
                make_server(2, 512),
            ],
        );
        let engine = CapacityEngine::new(source);

        let result = engine.select_node(1, &req(2048, 5120), false).await;

        let NodeSelectionResult::Selected(selection) = result else {
            panic!("expected a selection");
        };
        assert_eq!(selection.winner.node_id, 1);
        assert_eq!(selection.alternatives.len(), 1);
        assert_eq!(selection.alternatives[0].candidate.node_id, 2);
        assert_eq!(
            selection.alternatives[0].reason,
            AlternativeReason::HigherLoadScore
        );
    }

    #[tokio::test]
    async fn selection_is_deterministic_across_calls() {
        let source = StaticSource::new(
            vec![
                make_node(1, 1, 8192),
                make_node(2, 1, 16_384),
                make_node(3, 1, 32_768),
            ],
            vec![make_server(1, 2048), make_server(2, 4096)],
        );
        let engine = CapacityEngine::new(source);
        let requirement = req(2048, 10_240);

        let first = engine.select_node(1, &requirement, false).await;
        for _ in 0..4 {
            let again = engine.select_node(1, &requirement, false).await;
            assert_eq!(again, first);
        }
    }

    #[tokio::test]
    async fn calls_within_ttl_do_not_refetch() {
        let counting = CountingSource::new(StaticSource::new(
            vec![make_node(1, 1, 8192)],
            vec![make_server(1, 2048)],
        ));
        let engine = CapacityEngine::new(&counting);
        let requirement = req(1024, 1024);

        engine.check_capacity(1, &requirement, false).await;
        engine.check_capacity(1, &requirement, false).await;

        assert_eq!(counting.all_nodes_calls.load(Ordering::SeqCst), 1);
        assert_eq!(counting.node_details_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn expired_fleet_timer_triggers_exactly_one_refetch() {
        let counting = CountingSource::new(StaticSource::new(
            vec![make_node(1, 1, 8192)],
            vec![],
        ));
        let config = CacheConfig {
            full_refresh_interval: Duration::from_millis(50),
            ..CacheConfig::default()
        };
        let engine = CapacityEngine::new(&counting).with_cache_config(config);
        let requirement = req(1024, 1024);

        engine.check_capacity(1, &requirement, false).await;
        engine.check_capacity(1, &requirement, false).await;
        assert_eq!(counting.all_nodes_calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        engine.check_capacity(1, &requirement, false).await;
        assert_eq!(counting.all_nodes_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stale_nodes_are_refetched_individually() {
        let counting = CountingSource::new(StaticSource::new(
            vec![make_node(1, 1, 8192), make_node(2, 1, 8192)],
            vec![],
        ));
        let config = CacheConfig {
            node_ttl: Duration::ZERO,
            ..CacheConfig::default()
        };
        let engine = CapacityEngine::new(&counting).with_cache_config(config);
        let requirement = req(1024, 1024);

        // With a zero node TTL every read finds the per-node entries stale
        // and refetches each one individually; the fleet batch runs once.
        engine.check_capacity(1, &requirement, false).await;
        engine.check_capacity(1, &requirement, false).await;

        assert_eq!(counting.all_nodes_calls.load(Ordering::SeqCst), 1);
        assert_eq!(counting.node_details_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_cache_reads() {
        let counting = CountingSource::new(StaticSource::new(
            vec![make_node(1, 1, 8192)],
            vec![],
        ));
        let engine = CapacityEngine::new(&counting);
        let requirement = req(1024, 1024);

        engine.check_capacity(1, &requirement, false).await;
        engine.check_capacity(1, &requirement, true).await;

        assert_eq!(counting.all_nodes_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_cold_reads_share_one_fleet_fetch() {
        let counting = CountingSource::new(StaticSource::new(
            vec![make_node(1, 1, 8192)],
            vec![],
        ));
        let engine = CapacityEngine::new(&counting);
        let requirement = req(1024, 1024);

        let (a, b) = tokio::join!(
            engine.check_capacity(1, &requirement, false),
            engine.check_capacity(1, &requirement, false),
        );

        assert!(a.can_accommodate);
        assert!(b.can_accommodate);
        assert_eq!(counting.all_nodes_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_reads_of_a_stale_node_share_one_fetch() {
        let counting = CountingSource::new(StaticSource::new(
            vec![make_node(1, 1, 8192)],
            vec![],
        ));
        let config = CacheConfig {
            node_ttl: Duration::from_millis(40),
            ..CacheConfig::default()
        };
        let engine = CapacityEngine::new(&counting).with_cache_config(config);
        let requirement = req(1024, 1024);

        // Populate, then let the per-node entry expire while the fleet
        // timer stays armed.
        engine.check_capacity(1, &requirement, false).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (a, b) = tokio::join!(
            engine.check_capacity(1, &requirement, false),
            engine.check_capacity(1, &requirement, false),
        );

        assert!(a.can_accommodate);
        assert!(b.can_accommodate);
        assert_eq!(counting.all_nodes_calls.load(Ordering::SeqCst), 1);
        // One caller fetches; the one that waited out the guard finds the
        // entry freshly cached and reuses it.
        assert_eq!(counting.node_details_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panel_outage_degrades_to_well_formed_results() {
        let engine = CapacityEngine::new(DownSource);

        let check = engine.check_capacity(1, &req(1024, 1024), false).await;
        assert!(!check.can_accommodate);
        assert_eq!(check.location_status, CapacityStatus::Maintenance);
        assert!(!check.warnings.is_empty());

        let selection = engine.select_node(1, &req(1024, 1024), false).await;
        assert!(matches!(
            selection,
            NodeSelectionResult::Failed(SelectionFailure::LocationNotAdmissible { .. })
        ));

        let stats = engine.fleet_stats(false).await;
        assert_eq!(stats.total_nodes, 0);
        assert!(engine.location_summary(1, false).await.is_none());
    }

    #[tokio::test]
    async fn location_summary_serves_from_cache() {
        let counting = CountingSource::new(StaticSource::new(
            vec![make_node(1, 1, 8192)],
            vec![make_server(1, 2048)],
        ));
        let engine = CapacityEngine::new(&counting);

        let first = engine.location_summary(1, false).await.unwrap();
        let second = engine.location_summary(1, false).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.allocated_memory_mb, 2048);
        assert_eq!(counting.all_nodes_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fleet_stats_aggregate_across_locations() {
        let mut maintenance_node = make_node(3, 2, 4096);
        maintenance_node.maintenance = true;
        let source = StaticSource::new(
            vec![make_node(1, 1, 8192), make_node(2, 2, 8192), maintenance_node],
            vec![make_server(1, 2048), make_server(2, 4096)],
        );
        let engine = CapacityEngine::new(source);

        let stats = engine.fleet_stats(false).await;

        assert_eq!(stats.total_nodes, 3);
        assert_eq!(stats.active_nodes, 2);
        assert_eq!(stats.maintenance_nodes, 1);
        assert_eq!(stats.total_locations, 2);
        assert_eq!(stats.total_memory_mb, 8192 + 8192 + 4096);
        assert_eq!(stats.allocated_memory_mb, 6144);
        assert_eq!(stats.total_workloads, 2);
        assert_eq!(stats.memory_usage_pct, 30.0);
    }

    #[tokio::test]
    async fn all_location_summaries_ordered_by_id() {
        let source = StaticSource::new(
            vec![make_node(1, 3, 8192), make_node(2, 1, 8192), make_node(3, 2, 8192)],
            vec![],
        );
        let engine = CapacityEngine::new(source);

        let summaries = engine.all_location_summaries(false).await;

        let ids: Vec<LocationId> = summaries.iter().map(|s| s.location_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn results_serialize_with_tagged_outcomes() {
        let source = StaticSource::new(
            vec![make_node(1, 1, 8192)],
            vec![make_server(1, 2048)],
        );
        let engine = CapacityEngine::new(source);

        let check = engine.check_capacity(1, &req(2048, 1024), false).await;
        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json["location_id"], 1);
        assert_eq!(json["location_status"], "available");
        assert_eq!(json["available_memory_mb"], 6144);

        let selected = engine.select_node(1, &req(2048, 1024), false).await;
        let json = serde_json::to_value(&selected).unwrap();
        assert_eq!(json["outcome"], "selected");
        assert_eq!(json["winner"]["node_id"], 1);

        let failed = engine.select_node(1, &req(100_000, 0), false).await;
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["reason"], "location_not_admissible");
    }

    #[tokio::test]
    async fn invalidate_forces_refetch_on_next_read() {
        let counting = CountingSource::new(StaticSource::new(
            vec![make_node(1, 1, 8192)],
            vec![],
        ));
        let engine = CapacityEngine::new(&counting);

        engine.check_capacity(1, &req(1024, 1024), false).await;
        engine.invalidate().await;
        engine.check_capacity(1, &req(1024, 1024), false).await;

        assert_eq!(counting.all_nodes_calls.load(Ordering::SeqCst), 2);
    }
}
