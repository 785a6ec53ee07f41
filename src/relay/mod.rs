//! Channel fan-out across push connections and poll buffers

mod ingress;
mod router;
mod types;

pub use ingress::{Relay, RelayIngress};
pub use router::{ChannelRouter, RouterStats, RouterStatsSnapshot};
pub use types::{ChannelMessage, PublishResult};
