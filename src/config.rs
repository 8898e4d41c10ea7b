/// file: src/config.rs
/// description: Configuration for the stream connection, tick display buffer and host output
use crate::{cli::Args, error::TickStreamError, formatter::OutputFormat};
use std::time::Duration;
use url::Url;

pub const DEFAULT_STREAM_URL: &str = "ws://127.0.0.1:8080/ws/ticks";
pub const START_TICK_PARAM: &str = "start_tick";

#[derive(Debug, Clone)]
pub struct Config {
    pub stream: StreamConfig,
    pub display: DisplayConfig,
    pub metrics: MetricsConfig,
    pub health: HealthConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: Url,
    pub start_tick: Option<u64>,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
    /// `None` retries forever.
    pub max_reconnects: Option<u32>,
    pub reconnect_jitter: f64,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout_factor: u32,
}

#[derive(Debug, Clone)]
pub struct DisplayConfig {
    pub display_limit: usize,
    pub flush_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub check_interval: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub colored: bool,
    pub quiet: bool,
    pub max_ticks: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: Url::parse(DEFAULT_STREAM_URL).expect("default stream url is valid"),
            start_tick: None,
            connect_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(3),
            max_reconnect_delay: Duration::from_secs(30),
            max_reconnects: None,
            reconnect_jitter: 0.0,
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout_factor: 2,
        }
    }
}

impl StreamConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            ..Self::default()
        }
    }

    /// Silence tolerated on a live connection before it is declared dead.
    pub fn heartbeat_timeout(&self) -> Duration {
        self.heartbeat_interval
            .saturating_mul(self.heartbeat_timeout_factor.max(1))
    }

    /// Endpoint for one connection attempt, carrying the resume cursor if any.
    pub fn endpoint_url(&self, cursor: Option<u64>) -> Url {
        let Some(cursor) = cursor else {
            return self.url.clone();
        };

        let retained: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(key, _)| key != START_TICK_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        let mut url = self.url.clone();
        url.set_query(None);
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in &retained {
                query.append_pair(key, value);
            }
            query.append_pair(START_TICK_PARAM, &cursor.to_string());
        }
        url
    }

    pub fn validate(&self) -> Result<(), TickStreamError> {
        if !matches!(self.url.scheme(), "ws" | "wss") {
            return Err(TickStreamError::InvalidConfig(format!(
                "unsupported stream scheme '{}', expected ws or wss",
                self.url.scheme()
            )));
        }
        if self.reconnect_delay.is_zero() {
            return Err(TickStreamError::InvalidConfig(
                "reconnect delay must be greater than zero".to_string(),
            ));
        }
        if self.max_reconnect_delay < self.reconnect_delay {
            return Err(TickStreamError::InvalidConfig(
                "max reconnect delay must not be below the base delay".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.reconnect_jitter) {
            return Err(TickStreamError::InvalidConfig(
                "reconnect jitter must be within 0.0..=1.0".to_string(),
            ));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(TickStreamError::InvalidConfig(
                "heartbeat interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            display_limit: 20,
            flush_interval: Duration::from_millis(16),
        }
    }
}

impl DisplayConfig {
    pub fn validate(&self) -> Result<(), TickStreamError> {
        if self.display_limit == 0 {
            return Err(TickStreamError::InvalidConfig(
                "display limit must be at least 1".to_string(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(TickStreamError::InvalidConfig(
                "flush interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self, TickStreamError> {
        let url = Url::parse(&args.url)?;

        let config = Config {
            stream: StreamConfig {
                url,
                start_tick: args.start_tick,
                connect_timeout: Duration::from_secs(args.timeout),
                reconnect_delay: Duration::from_millis(args.reconnect_delay_ms),
                max_reconnect_delay: Duration::from_millis(args.max_reconnect_delay_ms),
                max_reconnects: (args.max_reconnects > 0).then_some(args.max_reconnects),
                reconnect_jitter: args.reconnect_jitter,
                heartbeat_interval: Duration::from_secs(args.heartbeat_interval),
                heartbeat_timeout_factor: args.heartbeat_timeout_factor,
            },
            display: DisplayConfig {
                display_limit: args.display_limit,
                flush_interval: Duration::from_millis(args.flush_interval_ms),
            },
            metrics: MetricsConfig {
                enabled: args.metrics,
                port: args.metrics_port,
            },
            health: HealthConfig {
                check_interval: (args.health_check_interval > 0)
                    .then(|| Duration::from_secs(args.health_check_interval)),
            },
            output: OutputConfig {
                format: OutputFormat::from(args.format.as_str()),
                colored: !args.no_color,
                quiet: args.quiet,
                max_ticks: (args.max_ticks > 0).then_some(args.max_ticks),
            },
        };

        config.stream.validate()?;
        config.display.validate()?;
        Ok(config)
    }
}
