//! Staleness-aware cache for usage snapshots and location summaries.
//!
//! Two independent freshness layers with documented precedence:
//!
//! - **Per-item TTLs**: node snapshots and location summaries each expire
//!   on their own window. A stale entry is treated as absent, never
//!   served.
//! - **Fleet timer**: a coarser "needs full update" timer fires on its own
//!   cadence regardless of per-item validity. A fleet refresh replaces the
//!   node map and invalidates all summaries in one critical section, so
//!   readers observe either a fully valid snapshot or nothing.
//!
//! The cache is an explicitly constructed object owned by the engine —
//! no module-level singleton — so tests get isolated instances.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use hostfleet_panel::{LocationId, NodeId};
use hostfleet_placement::{LocationSummary, NodeResourceUsage};

/// Freshness windows for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Validity window for a per-node snapshot.
    pub node_ttl: Duration,
    /// Validity window for a location summary.
    pub summary_ttl: Duration,
    /// Cadence of the fleet-wide full refresh.
    pub full_refresh_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            node_ttl: Duration::from_secs(120),
            summary_ttl: Duration::from_secs(120),
            full_refresh_interval: Duration::from_secs(300),
        }
    }
}

struct TimedEntry<T> {
    value: T,
    inserted_at: Instant,
}

impl<T: Clone> TimedEntry<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
        }
    }

    fn fresh_value(&self, ttl: Duration) -> Option<T> {
        (self.inserted_at.elapsed() < ttl).then(|| self.value.clone())
    }
}

struct CacheInner {
    nodes: HashMap<NodeId, TimedEntry<NodeResourceUsage>>,
    summaries: HashMap<LocationId, TimedEntry<LocationSummary>>,
    last_full_refresh: Option<Instant>,
}

/// Shared cache of computed usage state.
pub struct UsageCache {
    inner: RwLock<CacheInner>,
    config: CacheConfig,
}

impl UsageCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                nodes: HashMap::new(),
                summaries: HashMap::new(),
                last_full_refresh: None,
            }),
            config,
        }
    }

    /// The node snapshot, only if present and within its TTL.
    pub async fn get_node(&self, id: NodeId) -> Option<NodeResourceUsage> {
        let inner = self.inner.read().await;
        inner
            .nodes
            .get(&id)
            .and_then(|e| e.fresh_value(self.config.node_ttl))
    }

    /// Unconditionally overwrite one node snapshot.
    pub async fn set_node(&self, usage: NodeResourceUsage) {
        let mut inner = self.inner.write().await;
        inner.nodes.insert(usage.node_id, TimedEntry::new(usage));
    }

    /// Last-known snapshots for every node, ignoring TTL.
    ///
    /// This is fleet-membership knowledge: the engine uses it to decide
    /// which stale nodes to refresh lazily. Values returned here must not
    /// be served to callers without a freshness check.
    pub async fn known_nodes(&self) -> Vec<NodeResourceUsage> {
        let inner = self.inner.read().await;
        inner.nodes.values().map(|e| e.value.clone()).collect()
    }

    /// The location summary, only if present and within its TTL.
    pub async fn get_summary(&self, location_id: LocationId) -> Option<LocationSummary> {
        let inner = self.inner.read().await;
        inner
            .summaries
            .get(&location_id)
            .and_then(|e| e.fresh_value(self.config.summary_ttl))
    }

    /// Unconditionally overwrite one location summary.
    pub async fn set_summary(&self, summary: LocationSummary) {
        let mut inner = self.inner.write().await;
        inner
            .summaries
            .insert(summary.location_id, TimedEntry::new(summary));
    }

    /// Swap in a whole fleet snapshot and drop every summary, atomically.
    ///
    /// Entries are replaced wholesale, never patched; a fleet refresh
    /// always invalidates derived summaries.
    pub async fn replace_all(&self, usages: Vec<NodeResourceUsage>) {
        let mut inner = self.inner.write().await;
        inner.nodes = usages
            .into_iter()
            .map(|u| (u.node_id, TimedEntry::new(u)))
            .collect();
        inner.summaries.clear();
        debug!(nodes = inner.nodes.len(), "fleet snapshot replaced");
    }

    /// Whether the fleet-wide refresh cadence has elapsed.
    pub async fn needs_full_update(&self) -> bool {
        let inner = self.inner.read().await;
        match inner.last_full_refresh {
            None => true,
            Some(at) => at.elapsed() >= self.config.full_refresh_interval,
        }
    }

    /// Re-arm the fleet-wide refresh timer.
    pub async fn mark_full_update_completed(&self) {
        let mut inner = self.inner.write().await;
        inner.last_full_refresh = Some(Instant::now());
    }

    /// Drop everything and re-arm the fleet timer.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.nodes.clear();
        inner.summaries.clear();
        inner.last_full_refresh = None;
        debug!("usage cache cleared");
    }

    /// Number of node snapshots held, fresh or stale.
    pub async fn node_count(&self) -> usize {
        let inner = self.inner.read().await;
        inner.nodes.len()
    }
}

impl Default for UsageCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
