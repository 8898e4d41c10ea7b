// file: src/connection.rs
// description: live stream connection with reconnect state machine, heartbeat and resume cursor

use crate::{
    backoff::Backoff,
    config::StreamConfig,
    error::StreamError,
    events::{ConnectionEvent, EventReceiver, EventSender, create_event_channel},
    monitoring::{
        CONNECTED_GAUGE, GAP_COUNTER, MESSAGES_RECEIVED_COUNTER, PROTOCOL_ERROR_COUNTER,
        RECONNECT_COUNTER,
    },
    transport::{Transport, TransportFrame, TransportSession},
    types::{ConnectionState, StreamMessage, TickGap},
};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

const KNOWN_MESSAGE_TYPES: [&str; 4] = ["tick", "error", "ping", "pong"];

/// How a single connected session ended.
enum SessionEnd {
    Cancelled,
    Failed(StreamError),
}

pub struct StreamConnection<T: Transport> {
    config: StreamConfig,
    transport: Arc<T>,
    backoff: Backoff,
    event_sender: EventSender,
    cancel: CancellationToken,
    // Highest tick number decoded on any session
    last_tick: Option<u64>,
}

/// Owner's handle on a running connection. Dropping it disconnects.
#[derive(Debug)]
pub struct ConnectionHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    /// Cancels the pending reconnect timer or closes the live session.
    /// Safe to call repeatedly.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// True once the task stopped, either cancelled or out of retries.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl<T: Transport> StreamConnection<T> {
    pub fn new(
        config: StreamConfig,
        transport: Arc<T>,
        event_sender: EventSender,
        cancel: CancellationToken,
    ) -> Self {
        let backoff = Backoff::from_config(&config);
        Self {
            config,
            transport,
            backoff,
            event_sender,
            cancel,
            last_tick: None,
        }
    }

    /// Carries the newest tick an earlier session delivered, so the first
    /// attempt resumes after it instead of at the configured start tick.
    pub fn with_last_tick(mut self, last_tick: Option<u64>) -> Self {
        self.last_tick = last_tick;
        self
    }

    /// Starts the attempt sequence on `runtime`, resuming after `resume_from`
    /// when given. Events arrive on the returned receiver in network order.
    pub fn open(
        config: StreamConfig,
        transport: Arc<T>,
        runtime: &Handle,
        resume_from: Option<u64>,
    ) -> (ConnectionHandle, EventReceiver) {
        let (event_sender, event_receiver) = create_event_channel();
        let cancel = CancellationToken::new();
        let connection = Self::new(config, transport, event_sender, cancel.clone())
            .with_last_tick(resume_from);
        let task = runtime.spawn(connection.run());
        (ConnectionHandle { cancel, task }, event_receiver)
    }

    pub async fn run(mut self) {
        info!(url = %self.config.url, "Starting tick stream connection");
        let mut attempt: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            if !self
                .send_event(ConnectionEvent::StateChanged(ConnectionState::Connecting))
                .await
            {
                break;
            }

            let cursor = self.resume_cursor();
            let url = self.config.endpoint_url(cursor);
            debug!(%url, attempt, "Opening stream connection");

            let connected = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.transport.connect(&url) => result,
            };

            let failure = match connected {
                Ok(session) => {
                    attempt = 0;
                    match self.run_session(session, cursor).await {
                        SessionEnd::Cancelled => break,
                        SessionEnd::Failed(failure) => failure,
                    }
                }
                Err(e) => {
                    error!("Failed to connect to tick stream: {}", e);
                    StreamError::from(e)
                }
            };
            CONNECTED_GAUGE.set(0.0);

            if !self.send_event(ConnectionEvent::Error(failure)).await
                || !self
                    .send_event(ConnectionEvent::StateChanged(ConnectionState::Error))
                    .await
            {
                break;
            }

            attempt = attempt.saturating_add(1);
            if let Some(max_reconnects) = self.config.max_reconnects
                && attempt > max_reconnects
            {
                error!(
                    "Maximum reconnection attempts ({}) reached",
                    max_reconnects
                );
                let _ = self
                    .send_event(ConnectionEvent::Error(StreamError::RetriesExhausted {
                        attempts: max_reconnects,
                    }))
                    .await;
                break;
            }

            let delay = self.backoff.delay(attempt);
            warn!(
                "Reconnecting in {} ms (attempt {})",
                delay.as_millis(),
                attempt
            );
            RECONNECT_COUNTER.increment(1);
            if !self
                .send_event(ConnectionEvent::Reconnecting { attempt, delay })
                .await
            {
                break;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }

        CONNECTED_GAUGE.set(0.0);
        debug!("Tick stream connection stopped");
    }

    /// Cursor for the next attempt: the configured start tick first, then one
    /// past the newest tick observed. `None` when no start tick is configured.
    pub fn resume_cursor(&self) -> Option<u64> {
        let start_tick = self.config.start_tick?;
        Some(match self.last_tick {
            Some(last) => last.saturating_add(1).max(start_tick),
            None => start_tick,
        })
    }

    async fn run_session(&mut self, mut session: T::Session, cursor: Option<u64>) -> SessionEnd {
        info!("Tick stream connected to {}", self.config.url);
        if !self
            .send_event(ConnectionEvent::StateChanged(ConnectionState::Connected))
            .await
        {
            session.close().await;
            return SessionEnd::Cancelled;
        }
        CONNECTED_GAUGE.set(1.0);

        let mut awaiting_resume = cursor;
        let liveness = self.config.heartbeat_timeout();
        let mut deadline = Instant::now() + liveness;
        let mut heartbeat = tokio::time::interval_at(
            Instant::now() + self.config.heartbeat_interval,
            self.config.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let frame = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    session.close().await;
                    return SessionEnd::Cancelled;
                }
                _ = sleep_until(deadline) => {
                    warn!("No message received within {:?}, dropping connection", liveness);
                    session.close().await;
                    return SessionEnd::Failed(StreamError::HeartbeatTimeout(liveness));
                }
                _ = heartbeat.tick() => {
                    if let Err(e) = session.send_ping().await {
                        warn!("Failed to send heartbeat ping: {}", e);
                        return SessionEnd::Failed(e.into());
                    }
                    trace!("Sent heartbeat ping");
                    continue;
                }
                frame = session.next_frame() => frame,
            };

            // Any frame counts as liveness
            deadline = Instant::now() + liveness;

            let text = match frame {
                None => {
                    warn!("Tick stream ended");
                    return SessionEnd::Failed(StreamError::ConnectionClosed);
                }
                Some(Err(e)) => {
                    error!("Tick stream transport error: {}", e);
                    return SessionEnd::Failed(e.into());
                }
                Some(Ok(TransportFrame::Text(text))) => text,
                Some(Ok(TransportFrame::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Dropping non UTF-8 binary message: {}", e);
                        PROTOCOL_ERROR_COUNTER.increment(1);
                        let error = StreamError::InvalidMessage(format!(
                            "binary frame is not UTF-8: {e}"
                        ));
                        if !self.send_event(ConnectionEvent::Error(error)).await {
                            session.close().await;
                            return SessionEnd::Cancelled;
                        }
                        continue;
                    }
                },
                Some(Ok(TransportFrame::Ping)) => {
                    trace!("Received transport ping");
                    continue;
                }
                Some(Ok(TransportFrame::Pong)) => {
                    trace!("Received transport pong");
                    continue;
                }
                Some(Ok(TransportFrame::Close(reason))) => {
                    warn!("Received close frame: {:?}", reason);
                    return SessionEnd::Failed(StreamError::ConnectionClosed);
                }
            };

            if !self.process_text_message(&text, &mut awaiting_resume).await {
                session.close().await;
                return SessionEnd::Cancelled;
            }
        }
    }

    /// Decodes one message and forwards it. Returns false once the owner has
    /// stopped listening.
    async fn process_text_message(
        &mut self,
        text: &str,
        awaiting_resume: &mut Option<u64>,
    ) -> bool {
        MESSAGES_RECEIVED_COUNTER.increment(1);

        match serde_json::from_str::<StreamMessage>(text) {
            Ok(StreamMessage::Tick(tick)) => {
                let tick_number = tick.tick_number;
                trace!(tick_number, "Decoded tick");

                // Only the first tick of a resumed session can reveal a gap
                if let Some(expected) = awaiting_resume.take()
                    && tick_number > expected
                {
                    warn!(expected, received = tick_number, "Resumed stream skipped ticks");
                    GAP_COUNTER.increment(1);
                    let gap = TickGap {
                        expected,
                        received: tick_number,
                    };
                    if !self.send_event(ConnectionEvent::Gap(gap)).await {
                        return false;
                    }
                }

                self.last_tick = Some(
                    self.last_tick
                        .map_or(tick_number, |last| last.max(tick_number)),
                );
                self.send_event(ConnectionEvent::Tick(tick)).await
            }
            Ok(StreamMessage::Error { error }) => {
                warn!("Server reported error: {}", error);
                self.send_event(ConnectionEvent::Error(StreamError::Server(error)))
                    .await
            }
            Ok(StreamMessage::Ping | StreamMessage::Pong) => {
                trace!("Received heartbeat message");
                true
            }
            Err(primary_error) => {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(text)
                    && let Some(kind) = value.get("type").and_then(|v| v.as_str())
                    && !KNOWN_MESSAGE_TYPES.contains(&kind)
                {
                    debug!("Ignoring message of type '{}'", kind);
                    return true;
                }

                let preview = text.chars().take(100).collect::<String>();
                warn!(
                    "Failed to parse stream message: {}. Message: {}",
                    primary_error, preview
                );
                PROTOCOL_ERROR_COUNTER.increment(1);
                self.send_event(ConnectionEvent::Error(StreamError::InvalidMessage(format!(
                    "{primary_error}: {preview}"
                ))))
                .await
            }
        }
    }

    async fn send_event(&self, event: ConnectionEvent) -> bool {
        self.event_sender.send(event).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TickStreamError;
    use std::future::pending;
    use url::Url;

    struct NeverTransport;
    struct NeverSession;

    impl Transport for NeverTransport {
        type Session = NeverSession;

        async fn connect(&self, _url: &Url) -> Result<NeverSession, TickStreamError> {
            pending().await
        }
    }

    impl TransportSession for NeverSession {
        async fn next_frame(&mut self) -> Option<Result<TransportFrame, TickStreamError>> {
            pending().await
        }

        async fn send_ping(&mut self) -> Result<(), TickStreamError> {
            Ok(())
        }

        async fn close(&mut self) {}
    }

    fn test_connection(start_tick: Option<u64>) -> (StreamConnection<NeverTransport>, EventReceiver) {
        let (sender, receiver) = create_event_channel();
        let config = StreamConfig {
            start_tick,
            ..StreamConfig::default()
        };
        let connection = StreamConnection::new(
            config,
            Arc::new(NeverTransport),
            sender,
            CancellationToken::new(),
        );
        (connection, receiver)
    }

    #[test]
    fn resume_cursor_requires_start_tick() {
        let (mut connection, _receiver) = test_connection(None);
        connection.last_tick = Some(50);
        assert_eq!(connection.resume_cursor(), None);
    }

    #[test]
    fn resume_cursor_follows_last_observed_tick() {
        let (mut connection, _receiver) = test_connection(Some(100));
        assert_eq!(connection.resume_cursor(), Some(100));
        connection.last_tick = Some(140);
        assert_eq!(connection.resume_cursor(), Some(141));
        connection.last_tick = Some(20);
        assert_eq!(connection.resume_cursor(), Some(100));
    }

    #[test]
    fn seeded_last_tick_moves_the_first_cursor() {
        let (connection, _receiver) = test_connection(Some(100));
        let connection = connection.with_last_tick(Some(250));
        assert_eq!(connection.resume_cursor(), Some(251));
    }

    #[tokio::test]
    async fn forwards_ticks_and_tracks_cursor() {
        let (mut connection, mut receiver) = test_connection(Some(10));
        let mut awaiting = None;
        assert!(
            connection
                .process_text_message(r#"{"type":"tick","tick_number":12}"#, &mut awaiting)
                .await
        );

        match receiver.recv().await {
            Some(ConnectionEvent::Tick(tick)) => assert_eq!(tick.tick_number, 12),
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(connection.resume_cursor(), Some(13));
    }

    #[tokio::test]
    async fn first_resumed_tick_past_cursor_reports_gap() {
        let (mut connection, mut receiver) = test_connection(Some(10));
        let mut awaiting = Some(10);
        connection
            .process_text_message(r#"{"type":"tick","tick_number":15}"#, &mut awaiting)
            .await;
        connection
            .process_text_message(r#"{"type":"tick","tick_number":18}"#, &mut awaiting)
            .await;

        assert!(matches!(
            receiver.recv().await,
            Some(ConnectionEvent::Gap(TickGap {
                expected: 10,
                received: 15
            }))
        ));
        assert!(matches!(receiver.recv().await, Some(ConnectionEvent::Tick(_))));
        assert!(matches!(receiver.recv().await, Some(ConnectionEvent::Tick(_))));
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn heartbeat_messages_are_not_forwarded() {
        let (mut connection, mut receiver) = test_connection(None);
        let mut awaiting = None;
        assert!(connection.process_text_message(r#"{"type":"ping"}"#, &mut awaiting).await);
        assert!(connection.process_text_message(r#"{"type":"pong"}"#, &mut awaiting).await);
        assert!(connection.process_text_message(r#"{"type":"welcome","v":1}"#, &mut awaiting).await);
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn malformed_message_reports_protocol_error() {
        let (mut connection, mut receiver) = test_connection(None);
        let mut awaiting = None;
        assert!(connection.process_text_message("{not json", &mut awaiting).await);
        assert!(
            connection
                .process_text_message(r#"{"type":"tick","tick_number":"seven"}"#, &mut awaiting)
                .await
        );

        for _ in 0..2 {
            match receiver.recv().await {
                Some(ConnectionEvent::Error(error)) => assert!(error.is_protocol()),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn server_error_event_is_surfaced() {
        let (mut connection, mut receiver) = test_connection(None);
        let mut awaiting = None;
        connection
            .process_text_message(r#"{"type":"error","error":"sequencer lagging"}"#, &mut awaiting)
            .await;
        assert!(matches!(
            receiver.recv().await,
            Some(ConnectionEvent::Error(StreamError::Server(msg))) if msg == "sequencer lagging"
        ));
    }

    #[tokio::test]
    async fn closed_receiver_stops_processing() {
        let (mut connection, receiver) = test_connection(None);
        drop(receiver);
        let mut awaiting = None;
        assert!(
            !connection
                .process_text_message(r#"{"type":"tick","tick_number":1}"#, &mut awaiting)
                .await
        );
    }
}
