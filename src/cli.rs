use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "tick-stream",
    about = "live tick stream client for the explorer backend with ordered, coalesced output",
    version
)]
pub struct Args {
    /// Streaming endpoint URL
    #[arg(short, long, default_value = "ws://127.0.0.1:8080/ws/ticks")]
    pub url: String,

    /// Resume the stream from this tick number (sent as start_tick)
    #[arg(short, long)]
    pub start_tick: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,

    /// Enable metrics server
    #[arg(long)]
    pub metrics: bool,

    /// Metrics server port
    #[arg(long, default_value = "9090")]
    pub metrics_port: u16,

    /// Connection handshake timeout in seconds
    #[arg(long, default_value = "10")]
    pub timeout: u64,

    /// Base reconnection delay in milliseconds
    #[arg(long, default_value = "3000")]
    pub reconnect_delay_ms: u64,

    /// Maximum reconnection delay in milliseconds (backoff cap)
    #[arg(long, default_value = "30000")]
    pub max_reconnect_delay_ms: u64,

    /// Maximum number of reconnection attempts (0 for unlimited)
    #[arg(long, default_value = "0")]
    pub max_reconnects: u32,

    /// Random jitter applied to reconnect delays, as a fraction (0.0 - 1.0)
    #[arg(long, default_value = "0")]
    pub reconnect_jitter: f64,

    /// Heartbeat interval in seconds
    #[arg(long, default_value = "30")]
    pub heartbeat_interval: u64,

    /// Missed heartbeat intervals tolerated before the connection is considered dead
    #[arg(long, default_value = "2")]
    pub heartbeat_timeout_factor: u32,

    /// Number of most recent ticks kept in the display buffer
    #[arg(long, default_value = "20")]
    pub display_limit: usize,

    /// Minimum interval between output updates in milliseconds
    #[arg(long, default_value = "16")]
    pub flush_interval_ms: u64,

    /// Health report interval in seconds (0 to disable)
    #[arg(long, default_value = "30")]
    pub health_check_interval: u64,

    /// Output format: table, csv, json, minimal
    #[arg(long, default_value = "table")]
    pub format: String,

    /// Disable colored output (useful for piping to files)
    #[arg(long)]
    pub no_color: bool,

    /// Quiet mode - ticks only, no status lines
    #[arg(long)]
    pub quiet: bool,

    /// Stop after this many ticks have been displayed (0 for unlimited)
    #[arg(long, default_value = "0")]
    pub max_ticks: u64,
}
