//! Connection statistics

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Connection statistics
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStats {
    pub total_connections: usize,
    /// channel -> number of joined push connections
    pub channels: HashMap<String, usize>,
    /// Connect time of the longest-lived connection
    pub oldest_connected_at: Option<DateTime<Utc>>,
}
