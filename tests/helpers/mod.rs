//! Shared test utilities for integration tests
//!
//! A scripted in-memory transport stands in for the network so connection
//! behavior can be driven deterministically under paused Tokio time.
#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tick_stream::{
    ConnectionState, DisplayConfig, StreamConfig, StreamError, Tick, TickGap, TickObserver,
    TickStreamError,
    transport::{Transport, TransportFrame, TransportSession},
};
use tokio::sync::mpsc;
use url::Url;

/// Outcome of one scripted connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Accept,
    Refuse,
}

struct Inner {
    script: Mutex<VecDeque<Attempt>>,
    urls: Mutex<Vec<Url>>,
    attempts: AtomicUsize,
    peers: mpsc::UnboundedSender<FakePeer>,
}

/// Transport whose attempts follow a script. Once the script runs out every
/// attempt is refused.
#[derive(Clone)]
pub struct FakeTransport {
    inner: Arc<Inner>,
}

impl FakeTransport {
    pub fn new(script: impl IntoIterator<Item = Attempt>) -> (Self, mpsc::UnboundedReceiver<FakePeer>) {
        let (peers, peer_receiver) = mpsc::unbounded_channel();
        let inner = Inner {
            script: Mutex::new(script.into_iter().collect()),
            urls: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            peers,
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            peer_receiver,
        )
    }

    pub fn push(&self, attempt: Attempt) {
        self.inner.script.lock().push_back(attempt);
    }

    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<Url> {
        self.inner.urls.lock().clone()
    }
}

impl Transport for FakeTransport {
    type Session = FakeSession;

    async fn connect(&self, url: &Url) -> Result<FakeSession, TickStreamError> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        self.inner.urls.lock().push(url.clone());

        let attempt = self
            .inner
            .script
            .lock()
            .pop_front()
            .unwrap_or(Attempt::Refuse);
        if attempt == Attempt::Refuse {
            return Err(TickStreamError::Transport("connection refused".to_string()));
        }

        let (frames, frame_receiver) = mpsc::unbounded_channel();
        let pings = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicBool::new(false));
        let peer = FakePeer {
            frames,
            pings: Arc::clone(&pings),
            closed: Arc::clone(&closed),
        };
        let _ = self.inner.peers.send(peer);

        Ok(FakeSession {
            frames: frame_receiver,
            pings,
            closed,
        })
    }
}

pub struct FakeSession {
    frames: mpsc::UnboundedReceiver<TransportFrame>,
    pings: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl TransportSession for FakeSession {
    async fn next_frame(&mut self) -> Option<Result<TransportFrame, TickStreamError>> {
        self.frames.recv().await.map(Ok)
    }

    async fn send_ping(&mut self) -> Result<(), TickStreamError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Server side of an accepted session. Dropping it ends the stream.
pub struct FakePeer {
    frames: mpsc::UnboundedSender<TransportFrame>,
    pings: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl FakePeer {
    pub fn send_text(&self, text: &str) {
        let _ = self.frames.send(TransportFrame::Text(text.to_string()));
    }

    pub fn send_tick(&self, tick_number: u64) {
        let message = serde_json::json!({
            "type": "tick",
            "tick_number": tick_number,
            "timestamp": 1_700_000_000_000_000u64 + tick_number,
            "transaction_count": 0,
        });
        self.send_text(&message.to_string());
    }

    pub fn send_ticks(&self, tick_numbers: impl IntoIterator<Item = u64>) {
        for tick_number in tick_numbers {
            self.send_tick(tick_number);
        }
    }

    pub fn close(&self) {
        let _ = self.frames.send(TransportFrame::Close(None));
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    /// True once the client closed its end.
    pub fn closed_by_client(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Note {
    Batch(Vec<u64>),
    Buffer(Vec<u64>),
    State(ConnectionState),
    Error(StreamError),
    Reconnect(u32),
    Gap(TickGap),
}

#[derive(Default)]
pub struct RecordingObserver {
    notes: Mutex<Vec<Note>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notes(&self) -> Vec<Note> {
        self.notes.lock().clone()
    }

    pub fn batches(&self) -> Vec<Vec<u64>> {
        self.notes()
            .into_iter()
            .filter_map(|note| match note {
                Note::Batch(batch) => Some(batch),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<StreamError> {
        self.notes()
            .into_iter()
            .filter_map(|note| match note {
                Note::Error(error) => Some(error),
                _ => None,
            })
            .collect()
    }

    pub fn states(&self) -> Vec<ConnectionState> {
        self.notes()
            .into_iter()
            .filter_map(|note| match note {
                Note::State(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn reconnects(&self) -> Vec<u32> {
        self.notes()
            .into_iter()
            .filter_map(|note| match note {
                Note::Reconnect(attempt) => Some(attempt),
                _ => None,
            })
            .collect()
    }

    pub fn gaps(&self) -> Vec<TickGap> {
        self.notes()
            .into_iter()
            .filter_map(|note| match note {
                Note::Gap(gap) => Some(gap),
                _ => None,
            })
            .collect()
    }

    fn record(&self, note: Note) {
        self.notes.lock().push(note);
    }
}

impl TickObserver for RecordingObserver {
    fn on_ticks(&self, batch: &[Arc<Tick>]) {
        self.record(Note::Batch(numbers(batch)));
    }

    fn on_buffer(&self, ticks: &[Arc<Tick>]) {
        self.record(Note::Buffer(numbers(ticks)));
    }

    fn on_state_change(&self, state: ConnectionState) {
        self.record(Note::State(state));
    }

    fn on_error(&self, error: &StreamError) {
        self.record(Note::Error(error.clone()));
    }

    fn on_reconnect(&self, attempt: u32, _delay: Duration) {
        self.record(Note::Reconnect(attempt));
    }

    fn on_gap(&self, gap: &TickGap) {
        self.record(Note::Gap(*gap));
    }
}

pub fn numbers(ticks: &[Arc<Tick>]) -> Vec<u64> {
    ticks.iter().map(|tick| tick.tick_number).collect()
}

pub fn stream_config() -> StreamConfig {
    StreamConfig {
        url: Url::parse("ws://ticks.test/ws/ticks").unwrap(),
        start_tick: None,
        connect_timeout: Duration::from_secs(1),
        reconnect_delay: Duration::from_secs(1),
        max_reconnect_delay: Duration::from_secs(8),
        max_reconnects: None,
        reconnect_jitter: 0.0,
        heartbeat_interval: Duration::from_secs(5),
        heartbeat_timeout_factor: 2,
    }
}

pub fn display_config(display_limit: usize) -> DisplayConfig {
    DisplayConfig {
        display_limit,
        flush_interval: Duration::from_millis(16),
    }
}

/// Lets spawned tasks run and at least a few flush intervals elapse.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
