//! Base node tracking
//!
//! - `state`: observable connectivity and sync state
//! - `validation`: derives the sync state from engine validation results
//! - `connection`: combined indicator for the user
//! - `registry`: known base nodes, selection and rotation

pub mod connection;
pub mod registry;
pub mod state;
pub mod validation;

pub use connection::ConnectionIndicator;
pub use registry::{parse_base_node_list, BaseNode, BaseNodeRegistry, RegistryError};
pub use state::{BaseNodeConnectivity, BaseNodeState, BaseNodeSyncState};
pub use validation::ValidationTracker;
