//! hostfleet-panel — descriptors and the data-source seam to the hosting panel.
//!
//! The capacity engine never talks to the panel directly; it consumes the
//! [`PanelSource`] trait. This crate defines the raw node/workload
//! descriptors the panel reports and ships [`StaticSource`], an in-memory
//! implementation used by the CLI and by tests.

pub mod error;
pub mod source;
pub mod types;

pub use error::{PanelError, PanelResult};
pub use source::{PanelSource, StaticSource};
pub use types::{LocationId, NodeDescriptor, NodeId, WorkloadDescriptor};
