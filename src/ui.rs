/// file: src/ui.rs
/// description: terminal presentation layer that renders coordinator notifications
use crate::{
    error::StreamError,
    events::{ClientEvent, ClientEventReceiver},
    formatter::{Colors, OutputFormat, TickFormatter},
    types::{ConnectionState, TickGap},
};
use std::time::Duration;
use tracing::{debug, info};

pub struct UIController {
    event_receiver: ClientEventReceiver,
    tick_formatter: TickFormatter,
    colored: bool,
    quiet_mode: bool,
    header_printed: bool,
    max_ticks: Option<u64>,
}

pub struct UIOptions {
    pub colored: bool,
    pub quiet: bool,
    pub max_ticks: Option<u64>,
}

impl UIController {
    pub fn new(
        event_receiver: ClientEventReceiver,
        format: OutputFormat,
        options: UIOptions,
    ) -> Self {
        Self {
            event_receiver,
            tick_formatter: TickFormatter::new(format, options.colored, options.quiet),
            colored: options.colored,
            quiet_mode: options.quiet,
            header_printed: false,
            max_ticks: options.max_ticks.filter(|max| *max > 0),
        }
    }

    /// Renders notifications until the channel closes or the tick limit is hit.
    pub async fn run(&mut self) {
        self.print_startup_banner();
        while let Some(event) = self.event_receiver.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }
        info!(
            ticks = self.tick_formatter.tick_count(),
            "Presentation loop finished"
        );
    }

    fn handle_event(&mut self, event: ClientEvent) -> bool {
        match event {
            ClientEvent::StateChanged(state) => self.print_state(state),
            ClientEvent::Ticks(batch) => {
                if !self.header_printed {
                    self.tick_formatter.print_header();
                    self.header_printed = true;
                }
                debug!(batch = batch.len(), "Rendering tick batch");
                self.tick_formatter.print_batch(&batch);

                if let Some(max_ticks) = self.max_ticks
                    && self.tick_formatter.tick_count() >= max_ticks
                {
                    self.print_status(
                        "STOPPING",
                        &format!("Reached configured max ticks ({max_ticks})"),
                    );
                    return false;
                }
            }
            ClientEvent::Error(error) => self.print_error(&error),
            ClientEvent::Reconnecting { attempt, delay } => {
                self.print_reconnect_info(attempt, delay);
            }
            ClientEvent::Gap(gap) => self.print_gap(&gap),
        }

        true
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.colored {
            format!("{}{}{}{}", Colors::BOLD, color, text, Colors::RESET)
        } else {
            text.to_string()
        }
    }

    fn print_startup_banner(&self) {
        if self.quiet_mode {
            return;
        }

        println!();
        println!(
            "{}",
            self.paint(
                Colors::BRIGHT_CYAN,
                &format!("== TICK STREAM v{} ==", env!("CARGO_PKG_VERSION"))
            )
        );
        println!();
    }

    fn print_state(&self, state: ConnectionState) {
        let (status, message) = match state {
            ConnectionState::Connecting => ("CONNECTING", "Opening stream"),
            ConnectionState::Connected => ("LIVE", "Receiving ticks"),
            ConnectionState::Error => ("OFFLINE", "Connection lost, recovering"),
            ConnectionState::Disconnected => ("DISCONNECTED", "Stream closed"),
        };
        self.print_status(status, message);
    }

    fn print_status(&self, status: &str, message: &str) {
        if self.quiet_mode {
            return;
        }

        let color = match status {
            "CONNECTING" => Colors::BRIGHT_YELLOW,
            "LIVE" => Colors::BRIGHT_GREEN,
            "OFFLINE" | "DISCONNECTED" => Colors::BRIGHT_RED,
            "STOPPING" => Colors::BRIGHT_MAGENTA,
            _ => Colors::WHITE,
        };

        println!("{} {}", self.paint(color, &format!("[{status}]")), message);
    }

    fn print_error(&self, error: &StreamError) {
        // Errors are always shown, even in quiet mode
        let label = if matches!(error, StreamError::RetriesExhausted { .. }) {
            "OFFLINE"
        } else {
            "ERROR"
        };
        eprintln!("{} {}", self.paint(Colors::BRIGHT_RED, &format!("[{label}]")), error);
    }

    fn print_reconnect_info(&self, attempt: u32, delay: Duration) {
        if self.quiet_mode {
            return;
        }

        println!(
            "{} Attempt {} in {:.1}s...",
            self.paint(Colors::BRIGHT_YELLOW, "[RECONNECTING]"),
            attempt,
            delay.as_secs_f64()
        );
    }

    fn print_gap(&self, gap: &TickGap) {
        println!(
            "{} {} tick(s) unavailable: expected #{}, resumed at #{}",
            self.paint(Colors::BRIGHT_BLUE, "[GAP]"),
            gap.missing(),
            gap.expected,
            gap.received
        );
    }
}
