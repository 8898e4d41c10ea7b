/// file: src/events.rs
/// description: Event messages between the connection, the coordinator and host presentation
use crate::{
    error::StreamError,
    observer::TickObserver,
    types::{ConnectionState, Tick, TickGap},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

/// Emitted by the stream connection, consumed by the coordinator driver.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    StateChanged(ConnectionState),
    Tick(Tick),
    Error(StreamError),
    Reconnecting { attempt: u32, delay: Duration },
    Gap(TickGap),
}

// Bounded so a stalled coordinator applies backpressure to network reads
// instead of growing memory without limit
pub const EVENT_CHANNEL_CAPACITY: usize = 10_000;

pub type EventSender = mpsc::Sender<ConnectionEvent>;
pub type EventReceiver = mpsc::Receiver<ConnectionEvent>;

pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}

/// Coalesced notifications handed to a host presentation loop.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Ticks(Vec<Arc<Tick>>),
    StateChanged(ConnectionState),
    Error(StreamError),
    Reconnecting { attempt: u32, delay: Duration },
    Gap(TickGap),
}

const CLIENT_CHANNEL_CAPACITY: usize = 1_024;

pub type ClientEventSender = mpsc::Sender<ClientEvent>;
pub type ClientEventReceiver = mpsc::Receiver<ClientEvent>;

/// Observer that forwards every notification into a bounded channel without
/// blocking the coordinator. Events are dropped (and logged) when the host
/// falls a full channel behind.
pub struct ChannelObserver {
    sender: ClientEventSender,
}

impl ChannelObserver {
    pub fn channel() -> (Arc<Self>, ClientEventReceiver) {
        let (sender, receiver) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);
        (Arc::new(Self { sender }), receiver)
    }

    fn forward(&self, event: ClientEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!("Host event channel full, dropping {:?}", event_kind(&event));
            }
            // Receiver gone: host has shut down
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

fn event_kind(event: &ClientEvent) -> &'static str {
    match event {
        ClientEvent::Ticks(_) => "tick batch",
        ClientEvent::StateChanged(_) => "state change",
        ClientEvent::Error(_) => "error",
        ClientEvent::Reconnecting { .. } => "reconnect notice",
        ClientEvent::Gap(_) => "gap notice",
    }
}

impl TickObserver for ChannelObserver {
    fn on_ticks(&self, batch: &[Arc<Tick>]) {
        self.forward(ClientEvent::Ticks(batch.to_vec()));
    }

    fn on_state_change(&self, state: ConnectionState) {
        self.forward(ClientEvent::StateChanged(state));
    }

    fn on_error(&self, error: &StreamError) {
        self.forward(ClientEvent::Error(error.clone()));
    }

    fn on_reconnect(&self, attempt: u32, delay: Duration) {
        self.forward(ClientEvent::Reconnecting { attempt, delay });
    }

    fn on_gap(&self, gap: &TickGap) {
        self.forward(ClientEvent::Gap(*gap));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forwards_notifications_in_order() {
        let (observer, mut receiver) = ChannelObserver::channel();
        observer.on_state_change(ConnectionState::Connected);
        observer.on_ticks(&[Arc::new(Tick {
            tick_number: 3,
            ..Tick::default()
        })]);

        assert!(matches!(
            receiver.recv().await,
            Some(ClientEvent::StateChanged(ConnectionState::Connected))
        ));
        match receiver.recv().await {
            Some(ClientEvent::Ticks(batch)) => assert_eq!(batch[0].tick_number, 3),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_receiver_is_ignored() {
        let (observer, receiver) = ChannelObserver::channel();
        drop(receiver);
        observer.on_error(&StreamError::ConnectionClosed);
    }
}
