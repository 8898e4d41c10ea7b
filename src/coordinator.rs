// file: src/coordinator.rs
// description: ordered, bounded, coalesced tick stream on top of a reconnecting connection

use crate::{
    buffer::{IngestOutcome, TickBuffer},
    client_state::{StreamSession, StreamStatus},
    config::{DisplayConfig, StreamConfig},
    connection::{ConnectionHandle, StreamConnection},
    error::StreamError,
    events::{ConnectionEvent, EventReceiver},
    monitoring::{
        BATCHES_FLUSHED_COUNTER, CONNECTED_GAUGE, HealthReport, TICKS_ACCEPTED_COUNTER,
        TICKS_DISCARDED_COUNTER,
    },
    observer::{ObserverId, TickObserver},
    transport::{Transport, WebSocketTransport},
    types::{ConnectionState, Tick},
};
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Owns one stream session at a time and turns its raw events into ordered,
/// coalesced notifications.
///
/// All public operations are synchronous and never fail; problems are
/// reported through [`TickObserver::on_error`] and [`Self::last_error`].
/// Each consumer should own its own coordinator.
pub struct TickStreamCoordinator<T: Transport = WebSocketTransport> {
    stream_config: StreamConfig,
    display_config: DisplayConfig,
    transport: Arc<T>,
    shared: Arc<Shared>,
    active: Mutex<Option<ConnectionHandle>>,
}

struct Shared {
    // Serializes dispatch against disconnect so nothing from a retired
    // session is delivered once disconnect() returns. Re-entrant so observers
    // may call back into the coordinator.
    gate: ReentrantMutex<()>,
    generation: AtomicU64,
    clear_epoch: AtomicU64,
    session: Mutex<StreamSession>,
    buffer: Mutex<TickBuffer>,
    published: Mutex<Vec<Arc<Tick>>>,
    observers: Mutex<Vec<(ObserverId, Arc<dyn TickObserver>)>>,
    next_observer_id: AtomicU64,
}

impl TickStreamCoordinator<WebSocketTransport> {
    pub fn websocket(stream_config: StreamConfig, display_config: DisplayConfig) -> Self {
        let transport = WebSocketTransport::new(stream_config.connect_timeout);
        Self::new(stream_config, display_config, transport)
    }
}

impl<T: Transport> TickStreamCoordinator<T> {
    pub fn new(stream_config: StreamConfig, display_config: DisplayConfig, transport: T) -> Self {
        let shared = Shared {
            gate: ReentrantMutex::new(()),
            generation: AtomicU64::new(0),
            clear_epoch: AtomicU64::new(0),
            session: Mutex::new(StreamSession::new()),
            buffer: Mutex::new(TickBuffer::new(display_config.display_limit)),
            published: Mutex::new(Vec::new()),
            observers: Mutex::new(Vec::new()),
            next_observer_id: AtomicU64::new(0),
        };

        Self {
            stream_config,
            display_config,
            transport: Arc::new(transport),
            shared: Arc::new(shared),
            active: Mutex::new(None),
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn TickObserver>) -> ObserverId {
        let id = ObserverId(self.shared.next_observer_id.fetch_add(1, Ordering::Relaxed));
        self.shared.observers.lock().push((id, observer));
        id
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self.shared.observers.lock();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Host lifecycle entry point, equivalent to [`Self::connect`].
    pub fn start(&self) {
        self.connect();
    }

    /// Host teardown: disconnects and releases every observer.
    pub fn stop(&self) {
        self.disconnect();
        self.shared.observers.lock().clear();
    }

    /// Opens the stream. A no-op while a session is connecting, connected or
    /// waiting to retry; restarts after `disconnect()` or exhausted retries.
    pub fn connect(&self) {
        let _gate = self.shared.gate.lock();
        let mut active = self.active.lock();
        if active.is_some() && self.shared.session.lock().is_active() {
            debug!("connect() ignored, stream session already active");
            return;
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                drop(active);
                warn!("Cannot start tick stream outside a Tokio runtime: {}", e);
                self.shared.report_error(StreamError::Runtime(e.to_string()));
                self.shared.apply_transition(ConnectionState::Error);
                return;
            }
        };

        // Retire whatever is left of an exhausted session
        if let Some(previous) = active.take() {
            previous.disconnect();
        }
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let resume_from = self.shared.buffer.lock().last_seen_tick_number();

        let (connection, events) = StreamConnection::open(
            self.stream_config.clone(),
            Arc::clone(&self.transport),
            &runtime,
            resume_from,
        );
        let cancel = connection.cancel_token();
        *active = Some(connection);
        drop(active);

        info!(url = %self.stream_config.url, generation, "Tick stream session started");
        self.shared.apply_transition(ConnectionState::Connecting);

        runtime.spawn(drive(
            Arc::clone(&self.shared),
            events,
            cancel,
            generation,
            self.display_config.flush_interval,
        ));
    }

    /// Closes the stream and cancels pending reconnect and flush work. No
    /// notification from the closed session is delivered after this returns.
    pub fn disconnect(&self) {
        let _gate = self.shared.gate.lock();
        let active = self.active.lock().take();
        if active.is_none() && self.shared.session.lock().state == ConnectionState::Disconnected {
            return;
        }

        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(connection) = active {
            connection.disconnect();
        }
        // Undelivered ticks leave the buffer so a later session can replay them
        let dropped = self.shared.buffer.lock().discard_pending();
        if dropped > 0 {
            debug!(dropped, "Rolled back ticks pending delivery");
        }
        CONNECTED_GAUGE.set(0.0);

        info!("Tick stream disconnected");
        self.shared.apply_transition(ConnectionState::Disconnected);
    }

    /// Empties the buffer and forgets the last seen tick number. Connection
    /// state is untouched.
    pub fn clear(&self) {
        let _gate = self.shared.gate.lock();
        self.shared.clear_epoch.fetch_add(1, Ordering::SeqCst);
        self.shared.buffer.lock().clear();
        self.shared.published.lock().clear();
        debug!("Tick buffer cleared");

        for observer in self.shared.observers() {
            observer.on_buffer(&[]);
        }
    }

    /// Published buffer, newest first.
    pub fn ticks(&self) -> Vec<Arc<Tick>> {
        self.shared.published.lock().clone()
    }

    pub fn latest_tick(&self) -> Option<Arc<Tick>> {
        self.shared.published.lock().first().cloned()
    }

    /// Entries currently in the published buffer (not a cumulative count).
    pub fn tick_count(&self) -> usize {
        self.shared.published.lock().len()
    }

    pub fn last_seen_tick_number(&self) -> Option<u64> {
        self.shared.buffer.lock().last_seen_tick_number()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.session.lock().state
    }

    pub fn last_error(&self) -> Option<StreamError> {
        self.shared.session.lock().last_error.clone()
    }

    pub fn reconnect_attempt(&self) -> u32 {
        self.shared.session.lock().reconnect_attempt
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.state() == ConnectionState::Connecting
    }

    pub fn status(&self) -> StreamStatus {
        self.shared.session.lock().status()
    }

    pub fn health(&self) -> HealthReport {
        let last_seen = self.last_seen_tick_number();
        HealthReport::from_session(&self.shared.session.lock(), last_seen)
    }

    pub fn display_limit(&self) -> usize {
        self.display_config.display_limit
    }
}

impl<T: Transport> Drop for TickStreamCoordinator<T> {
    fn drop(&mut self) {
        let _gate = self.shared.gate.lock();
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(connection) = self.active.get_mut().take() {
            connection.disconnect();
        }
        self.shared.observers.lock().clear();
    }
}

impl Shared {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn observers(&self) -> Vec<Arc<dyn TickObserver>> {
        self.observers
            .lock()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect()
    }

    fn apply_transition(&self, state: ConnectionState) {
        let changed = self.session.lock().transition(state);
        if !changed {
            return;
        }
        debug!(%state, "Connection state changed");
        for observer in self.observers() {
            observer.on_state_change(state);
        }
    }

    fn report_error(&self, error: StreamError) {
        self.session.lock().record_error(&error);
        for observer in self.observers() {
            observer.on_error(&error);
        }
    }

    fn handle_event(&self, generation: u64, event: ConnectionEvent) {
        let _gate = self.gate.lock();
        if !self.is_current(generation) {
            trace!("Dropping event from retired session");
            return;
        }

        match event {
            ConnectionEvent::StateChanged(state) => self.apply_transition(state),
            ConnectionEvent::Tick(tick) => self.ingest(tick),
            ConnectionEvent::Error(error) => self.report_error(error),
            ConnectionEvent::Reconnecting { attempt, delay } => {
                self.session.lock().record_reconnect(attempt);
                for observer in self.observers() {
                    observer.on_reconnect(attempt, delay);
                }
            }
            ConnectionEvent::Gap(gap) => {
                self.session.lock().gaps_detected += 1;
                for observer in self.observers() {
                    observer.on_gap(&gap);
                }
            }
        }
    }

    fn ingest(&self, tick: Tick) {
        let tick_number = tick.tick_number;
        let outcome = self.buffer.lock().ingest(tick);
        let mut session = self.session.lock();

        match outcome {
            IngestOutcome::Accepted => {
                session.record_accepted();
                TICKS_ACCEPTED_COUNTER.increment(1);
            }
            IngestOutcome::Duplicate { last_seen } => {
                session.record_discarded();
                TICKS_DISCARDED_COUNTER.increment(1);
                trace!(tick_number, last_seen, "Discarded duplicate tick");
            }
            IngestOutcome::Stale { current, last_seen } => {
                session.record_discarded();
                TICKS_DISCARDED_COUNTER.increment(1);
                trace!(tick_number = current, last_seen, "Discarded out-of-order tick");
            }
        }
    }

    /// Delivers everything accepted since the last flush as one batch, then
    /// publishes the buffer snapshot.
    fn flush(&self, generation: u64) {
        let _gate = self.gate.lock();
        if !self.is_current(generation) {
            return;
        }

        let epoch = self.clear_epoch.load(Ordering::SeqCst);
        let (batch, snapshot) = {
            let mut buffer = self.buffer.lock();
            let Some(batch) = buffer.drain_batch() else {
                return;
            };
            (batch, buffer.snapshot())
        };

        self.session.lock().batches_flushed += 1;
        BATCHES_FLUSHED_COUNTER.increment(1);
        trace!(
            batch = batch.len(),
            newest = batch.last().map(|tick| tick.tick_number),
            "Flushing tick batch"
        );

        let observers = self.observers();
        for observer in &observers {
            observer.on_ticks(&batch);
        }

        // An observer may have cleared or disconnected during on_ticks
        if !self.is_current(generation) || self.clear_epoch.load(Ordering::SeqCst) != epoch {
            return;
        }

        *self.published.lock() = snapshot.clone();
        for observer in &observers {
            observer.on_buffer(&snapshot);
        }
    }
}

/// Coordinator side of one session: applies connection events one at a time
/// and flushes at most once per `flush_interval`.
async fn drive(
    shared: Arc<Shared>,
    mut events: EventReceiver,
    cancel: CancellationToken,
    generation: u64,
    flush_interval: Duration,
) {
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        // Ticker ahead of events so a sustained flood cannot starve flushing
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => shared.flush(generation),
            event = events.recv() => match event {
                Some(event) => shared.handle_event(generation, event),
                None => {
                    shared.flush(generation);
                    break;
                }
            },
        }
    }

    debug!(generation, "Coordinator driver stopped");
}
