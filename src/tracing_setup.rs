// file: src/tracing_setup.rs
// description: structured logging configuration and tracing initialization
// reference: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/

use anyhow::Result;
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    prelude::*,
    registry::LookupSpan,
};

/// Default filter directive when `RUST_LOG` is unset.
pub fn default_directive(log_level: &str) -> String {
    format!("tick_stream={log_level}")
}

/// Output layer shared by both log formats. Logs go to stderr so tick output
/// on stdout stays pipeable.
pub fn fmt_layer<S>(json_logs: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    if json_logs {
        layer
            .json()
            .with_current_span(false)
            .with_span_list(true)
            .boxed()
    } else {
        layer.with_span_events(FmtSpan::CLOSE).boxed()
    }
}

pub fn setup_tracing(log_level: &str, json_logs: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(log_level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer(json_logs))
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_targets_this_crate() {
        assert_eq!(default_directive("debug"), "tick_stream=debug");
        assert!(EnvFilter::try_new(default_directive("warn")).is_ok());
    }

    #[test]
    fn both_formats_build_a_working_layer() {
        for json_logs in [false, true] {
            let subscriber = tracing_subscriber::registry().with(fmt_layer(json_logs));
            tracing::subscriber::with_default(subscriber, || {
                tracing::info!(json_logs, "layer smoke event");
            });
        }
    }
}
