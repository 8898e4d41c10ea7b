use crate::{client_state::StreamSession, error::TickStreamError, types::ConnectionState};
use metrics::{Counter, Gauge, counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{net::SocketAddr, sync::LazyLock};
use tracing::{error, info};

// Global metrics
pub static MESSAGES_RECEIVED_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("tick_stream_messages_received_total"));
pub static TICKS_ACCEPTED_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("tick_stream_ticks_accepted_total"));
pub static TICKS_DISCARDED_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("tick_stream_ticks_discarded_total"));
pub static BATCHES_FLUSHED_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("tick_stream_batches_flushed_total"));
pub static PROTOCOL_ERROR_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("tick_stream_protocol_errors_total"));
pub static GAP_COUNTER: LazyLock<Counter> = LazyLock::new(|| counter!("tick_stream_gaps_total"));
pub static RECONNECT_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("tick_stream_reconnects_total"));
pub static CONNECTED_GAUGE: LazyLock<Gauge> = LazyLock::new(|| gauge!("tick_stream_connected"));

pub async fn setup_metrics(port: u16) -> Result<(), TickStreamError> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", "tick-stream")
        .add_global_label("version", env!("CARGO_PKG_VERSION"));

    match builder.install() {
        Ok(_handle) => {
            info!(
                "Prometheus metrics server started on http://{}/metrics",
                addr
            );

            // Initialize metrics with default values
            MESSAGES_RECEIVED_COUNTER.absolute(0);
            TICKS_ACCEPTED_COUNTER.absolute(0);
            TICKS_DISCARDED_COUNTER.absolute(0);
            BATCHES_FLUSHED_COUNTER.absolute(0);
            PROTOCOL_ERROR_COUNTER.absolute(0);
            GAP_COUNTER.absolute(0);
            RECONNECT_COUNTER.absolute(0);
            CONNECTED_GAUGE.set(0.0);

            Ok(())
        }
        Err(e) => {
            error!("Failed to start metrics server: {}", e);
            Err(TickStreamError::MetricsError(e.to_string()))
        }
    }
}

#[derive(Debug)]
pub struct HealthReport {
    pub is_healthy: bool,
    pub state: ConnectionState,
    pub connection_id: Option<String>,
    pub last_tick_age: Option<std::time::Duration>,
    pub last_seen_tick_number: Option<u64>,
    pub ticks_accepted: u64,
    pub ticks_discarded: u64,
    pub batches_flushed: u64,
    pub gaps_detected: u64,
    pub protocol_errors: u64,
    pub reconnect_count: u64,
    pub uptime: chrono::Duration,
}

impl HealthReport {
    pub fn from_session(session: &StreamSession, last_seen_tick_number: Option<u64>) -> Self {
        let uptime = session
            .connected_at
            .and_then(|at| chrono::Duration::from_std(at.elapsed()).ok())
            .unwrap_or_else(chrono::Duration::zero);

        Self {
            is_healthy: session.state == ConnectionState::Connected,
            state: session.state,
            connection_id: session.connection_id.clone(),
            last_tick_age: session.last_tick_at.map(|at| at.elapsed()),
            last_seen_tick_number,
            ticks_accepted: session.ticks_accepted,
            ticks_discarded: session.ticks_discarded,
            batches_flushed: session.batches_flushed,
            gaps_detected: session.gaps_detected,
            protocol_errors: session.protocol_errors,
            reconnect_count: session.reconnects_total,
            uptime,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": if self.is_healthy { "healthy" } else { "unhealthy" },
            "state": self.state,
            "connection_id": self.connection_id,
            "last_tick_age_ms": self.last_tick_age.map(|age| age.as_millis() as u64),
            "last_seen_tick_number": self.last_seen_tick_number,
            "ticks_accepted": self.ticks_accepted,
            "ticks_discarded": self.ticks_discarded,
            "batches_flushed": self.batches_flushed,
            "gaps_detected": self.gaps_detected,
            "protocol_errors": self.protocol_errors,
            "reconnect_count": self.reconnect_count,
            "uptime_seconds": self.uptime.num_seconds(),
            "timestamp": chrono::Utc::now()
        })
    }
}
