//! The `PanelSource` seam and a static in-memory implementation.
//!
//! The real panel client (HTTP, auth, retries) lives outside this
//! workspace; the capacity engine only depends on this trait.
//! `StaticSource` serves a fixed snapshot and backs the CLI and tests.

use tracing::debug;

use crate::error::{PanelError, PanelResult};
use crate::types::{NodeDescriptor, NodeId, WorkloadDescriptor};

/// Read access to the hosting panel's node and workload inventory.
///
/// All methods are fallible: the panel is a remote system and any call
/// may fail with [`PanelError::Unavailable`].
#[allow(async_fn_in_trait)]
pub trait PanelSource: Send + Sync {
    /// All nodes in the fleet.
    async fn all_nodes(&self) -> PanelResult<Vec<NodeDescriptor>>;

    /// A single node by id.
    async fn node_details(&self, id: NodeId) -> PanelResult<NodeDescriptor>;

    /// Workloads currently placed on one node.
    async fn servers_by_node(&self, id: NodeId) -> PanelResult<Vec<WorkloadDescriptor>>;

    /// All workloads in the fleet (batched equivalent of per-node fan-out).
    async fn all_servers(&self) -> PanelResult<Vec<WorkloadDescriptor>>;
}

/// A `PanelSource` over a fixed in-memory snapshot.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    nodes: Vec<NodeDescriptor>,
    servers: Vec<WorkloadDescriptor>,
}

impl StaticSource {
    /// Create a source serving the given nodes and workloads.
    pub fn new(nodes: Vec<NodeDescriptor>, servers: Vec<WorkloadDescriptor>) -> Self {
        Self { nodes, servers }
    }

    /// Number of nodes in the snapshot.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl PanelSource for StaticSource {
    async fn all_nodes(&self) -> PanelResult<Vec<NodeDescriptor>> {
        debug!(nodes = self.nodes.len(), "serving static node inventory");
        Ok(self.nodes.clone())
    }

    async fn node_details(&self, id: NodeId) -> PanelResult<NodeDescriptor> {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or(PanelError::NodeNotFound(id))
    }

    async fn servers_by_node(&self, id: NodeId) -> PanelResult<Vec<WorkloadDescriptor>> {
        Ok(self
            .servers
            .iter()
            .filter(|s| s.node_id == id)
            .cloned()
            .collect())
    }

    async fn all_servers(&self) -> PanelResult<Vec<WorkloadDescriptor>> {
        Ok(self.servers.clone())
    }
}
