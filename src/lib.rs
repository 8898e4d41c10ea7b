#![doc = include_str!("../docs/rustdoc.md")]

/// Exponential reconnect backoff.
pub mod backoff;
/// Ordered, bounded tick buffer with pending batch tracking.
pub mod buffer;
/// Command-line argument definitions.
pub mod cli;
/// Session state, integrity counters and host status view.
pub mod client_state;
/// Runtime configuration model.
pub mod config;
/// Reconnecting stream connection and its runtime loop.
pub mod connection;
/// Tick stream coordinator consumed by hosts.
pub mod coordinator;
/// Error types used across the crate.
pub mod error;
/// Event messages between connection, coordinator and host.
pub mod events;
/// Terminal output formatters.
pub mod formatter;
/// Metrics and health status structures.
pub mod monitoring;
/// Observer trait for coordinator notifications.
pub mod observer;
/// Tracing/logging initialization.
pub mod tracing_setup;
/// Transport seam and the WebSocket implementation.
pub mod transport;
/// Tick stream protocol data models.
pub mod types;
/// UI controller and presentation loop.
pub mod ui;

pub use config::{DisplayConfig, StreamConfig};
pub use coordinator::TickStreamCoordinator;
/// Error delivered to observers.
pub use error::StreamError;
/// Primary crate error type.
pub use error::TickStreamError;
pub use observer::TickObserver;
pub use types::{ConnectionState, Tick, TickGap};
