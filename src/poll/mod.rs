//! Mailboxes for stateless polling consumers.
//!
//! Each buffer is keyed by a client-supplied id, holds the channels that
//! client follows and the messages published on them since its last fetch.

mod buffer;
mod store;

pub use buffer::{EnqueueOutcome, PollBuffer, PollBufferInfo};
pub use store::{PollBufferStats, PollBufferStore, DEFAULT_MAX_BUFFER_SIZE};
