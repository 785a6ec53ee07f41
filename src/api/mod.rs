//! API layer - HTTP endpoint handlers.

mod handlers;
mod health;
mod metrics;
mod routes;

pub use handlers::{
    fetch_messages, post_message, FetchRequest, FetchResponse, PostMessageRequest,
    PostMessageResponse,
};
pub use health::{health, stats};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
