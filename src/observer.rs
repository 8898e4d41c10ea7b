/// file: src/observer.rs
/// description: callback interface through which the coordinator notifies its consumers
use crate::{
    error::StreamError,
    types::{ConnectionState, Tick, TickGap},
};
use std::sync::Arc;
use std::time::Duration;

/// Consumer-side callbacks.
///
/// Every method is invoked from the coordinator's driver task and must return
/// quickly; hand heavy work off to another task (see `ChannelObserver`).
/// Methods may call back into the coordinator (`clear`, `disconnect`, `stop`).
pub trait TickObserver: Send + Sync {
    /// Ticks accepted since the previous flush, ascending by tick number.
    fn on_ticks(&self, _batch: &[Arc<Tick>]) {}

    /// Buffer snapshot after a flush or clear, newest first.
    fn on_buffer(&self, _ticks: &[Arc<Tick>]) {}

    fn on_state_change(&self, _state: ConnectionState) {}

    fn on_error(&self, _error: &StreamError) {}

    /// A reconnect attempt has been scheduled after `delay`.
    fn on_reconnect(&self, _attempt: u32, _delay: Duration) {}

    fn on_gap(&self, _gap: &TickGap) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);
