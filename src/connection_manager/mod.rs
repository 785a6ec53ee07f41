//! Registry of live push connections
//!
//! This module provides:
//! - Connection handles with their outbound queue
//! - Per-connection channel membership
//! - Channel indexing for fan-out targeting

mod registry;
mod stats;
mod types;

pub use registry::ConnectionRegistry;
pub use stats::ConnectionStats;
pub use types::{ConnectionHandle, ConnectionId};
