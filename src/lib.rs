// Core relay components
pub mod connection_manager;
pub mod poll;
pub mod relay;

// Ingress adapters
pub mod api;
pub mod server;
pub mod websocket;

// Supporting modules
pub mod config;
pub mod error;
pub mod metrics;
pub mod tasks;
pub mod telemetry;
