//! Flow identity, counter snapshots and the per-window pairing of forward and
//! reverse flows against the previous window's baseline.

pub mod registry;
pub mod resolver;
pub mod types;

pub use registry::FlowRegistry;
pub use resolver::{resolve, DeltaPolicy, ResolvedFlow};
pub use types::{FlowDelta, FlowKey, FlowSnapshot, PROTO_TCP, PROTO_UDP};
