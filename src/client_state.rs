/// file: src/client_state.rs
/// description: per-coordinator session state, counters and the status view handed to hosts
use crate::{error::StreamError, types::ConnectionState};
use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug)]
pub struct StreamSession {
    pub state: ConnectionState,
    pub reconnect_attempt: u32,
    pub last_error: Option<StreamError>,
    pub retries_exhausted: bool,
    pub connection_id: Option<String>,
    pub connected_at: Option<Instant>,
    pub last_tick_at: Option<Instant>,
    pub started_at: Instant,

    // Integrity and volume tracking
    pub ticks_accepted: u64,
    pub ticks_discarded: u64,
    pub batches_flushed: u64,
    pub gaps_detected: u64,
    pub protocol_errors: u64,
    pub reconnects_total: u64,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            reconnect_attempt: 0,
            last_error: None,
            retries_exhausted: false,
            connection_id: None,
            connected_at: None,
            last_tick_at: None,
            started_at: Instant::now(),
            ticks_accepted: 0,
            ticks_discarded: 0,
            batches_flushed: 0,
            gaps_detected: 0,
            protocol_errors: 0,
            reconnects_total: 0,
        }
    }
}

impl StreamSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a state transition, returning false when nothing changed.
    pub fn transition(&mut self, state: ConnectionState) -> bool {
        if self.state == state {
            return false;
        }
        self.state = state;

        match state {
            ConnectionState::Connected => {
                self.connection_id = Some(uuid::Uuid::new_v4().to_string());
                self.connected_at = Some(Instant::now());
                self.reconnect_attempt = 0;
                self.retries_exhausted = false;
                self.last_error = None;
            }
            ConnectionState::Connecting => {
                self.retries_exhausted = false;
            }
            ConnectionState::Disconnected => {
                self.connection_id = None;
                self.connected_at = None;
                self.reconnect_attempt = 0;
                self.retries_exhausted = false;
            }
            ConnectionState::Error => {
                self.connection_id = None;
                self.connected_at = None;
            }
        }
        true
    }

    pub fn record_error(&mut self, error: &StreamError) {
        if error.is_protocol() {
            self.protocol_errors += 1;
        }
        if error.is_terminal() {
            self.retries_exhausted = true;
        }
        self.last_error = Some(error.clone());
    }

    pub fn record_reconnect(&mut self, attempt: u32) {
        self.reconnect_attempt = attempt;
        self.reconnects_total += 1;
    }

    pub fn record_accepted(&mut self) {
        self.ticks_accepted += 1;
        self.last_tick_at = Some(Instant::now());
    }

    pub fn record_discarded(&mut self) {
        self.ticks_discarded += 1;
    }

    /// True while a session is being established or kept alive, including
    /// the backoff wait between attempts.
    pub fn is_active(&self) -> bool {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => true,
            ConnectionState::Error => !self.retries_exhausted,
            ConnectionState::Disconnected => false,
        }
    }

    pub fn status(&self) -> StreamStatus {
        StreamStatus {
            state: self.state,
            reconnect_attempt: self.reconnect_attempt,
            last_error: self.last_error.clone(),
            retries_exhausted: self.retries_exhausted,
            connection_id: self.connection_id.clone(),
        }
    }
}

/// Point-in-time view of the stream for hosts.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamStatus {
    pub state: ConnectionState,
    pub reconnect_attempt: u32,
    pub last_error: Option<StreamError>,
    pub retries_exhausted: bool,
    pub connection_id: Option<String>,
}

impl StreamStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.state == ConnectionState::Connecting
    }

    pub fn badge(&self) -> StatusBadge {
        match self.state {
            ConnectionState::Connected => StatusBadge::Live,
            ConnectionState::Connecting => StatusBadge::Reconnecting {
                attempt: self.reconnect_attempt,
            },
            ConnectionState::Error => StatusBadge::Offline {
                recovering: !self.retries_exhausted,
            },
            ConnectionState::Disconnected => StatusBadge::Offline { recovering: false },
        }
    }
}

/// The three statuses a UI has to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatusBadge {
    Live,
    /// Attempt 0 is the initial connect.
    Reconnecting { attempt: u32 },
    /// `recovering` is false once automatic retries have stopped.
    Offline { recovering: bool },
}
