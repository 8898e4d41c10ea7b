use crate::types::Tick;

// ANSI color codes
pub struct Colors;

impl Colors {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const DIM: &'static str = "\x1b[2m";

    // Colors
    pub const WHITE: &'static str = "\x1b[37m";
    pub const GRAY: &'static str = "\x1b[90m";

    // Bright colors
    pub const BRIGHT_RED: &'static str = "\x1b[91m";
    pub const BRIGHT_GREEN: &'static str = "\x1b[92m";
    pub const BRIGHT_YELLOW: &'static str = "\x1b[93m";
    pub const BRIGHT_BLUE: &'static str = "\x1b[94m";
    pub const BRIGHT_MAGENTA: &'static str = "\x1b[95m";
    pub const BRIGHT_CYAN: &'static str = "\x1b[96m";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
    Minimal,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "csv" => OutputFormat::Csv,
            "json" => OutputFormat::Json,
            "minimal" => OutputFormat::Minimal,
            _ => OutputFormat::Table,
        }
    }
}

pub struct TickFormatter {
    format: OutputFormat,
    colored: bool,
    quiet: bool,
    tick_count: u64,
}

impl TickFormatter {
    pub fn new(format: OutputFormat, colored: bool, quiet: bool) -> Self {
        Self {
            format,
            colored,
            quiet,
            tick_count: 0,
        }
    }

    pub fn reset_count(&mut self) {
        self.tick_count = 0;
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn header(&self) -> Option<String> {
        if self.quiet {
            return None;
        }

        match self.format {
            OutputFormat::Table => Some(self.table_header()),
            OutputFormat::Csv => {
                Some("tick_number,timestamp,transaction_count,transactions_size,batch_hash".to_string())
            }
            OutputFormat::Json | OutputFormat::Minimal => None,
        }
    }

    pub fn print_header(&self) {
        if let Some(header) = self.header() {
            println!("{header}");
        }
    }

    /// Prints one coalesced batch, oldest first.
    pub fn print_batch(&mut self, batch: &[std::sync::Arc<Tick>]) {
        for tick in batch {
            println!("{}", self.format_tick(tick));
        }
    }

    pub fn format_tick(&mut self, tick: &Tick) -> String {
        self.tick_count += 1;

        match self.format {
            OutputFormat::Table => self.table_row(tick),
            OutputFormat::Csv => Self::csv_row(tick),
            OutputFormat::Json => Self::json_row(tick),
            OutputFormat::Minimal => self.minimal_row(tick),
        }
    }

    fn table_header(&self) -> String {
        let title = format!(
            "│ {:>12} │ {:<15} │ {:>6} │ {:>10} │ {:<14} │",
            "TICK", "TIME", "TXS", "BYTES", "BATCH"
        );
        if self.colored {
            format!("{}{}{}{}", Colors::BOLD, Colors::GRAY, title, Colors::RESET)
        } else {
            title
        }
    }

    fn table_row(&self, tick: &Tick) -> String {
        let time = tick.datetime_local().format("%H:%M:%S%.6f").to_string();
        if self.colored {
            format!(
                "│ {}{:>12}{} │ {}{:<15}{} │ {:>6} │ {:>10} │ {}{:<14}{} │",
                Colors::BRIGHT_CYAN,
                tick.tick_number,
                Colors::RESET,
                Colors::DIM,
                time,
                Colors::RESET,
                tick.transaction_count,
                tick.transactions_size(),
                Colors::GRAY,
                tick.short_batch_hash(),
                Colors::RESET
            )
        } else {
            format!(
                "│ {:>12} │ {:<15} │ {:>6} │ {:>10} │ {:<14} │",
                tick.tick_number,
                time,
                tick.transaction_count,
                tick.transactions_size(),
                tick.short_batch_hash()
            )
        }
    }

    fn csv_row(tick: &Tick) -> String {
        format!(
            "{},{},{},{},{}",
            tick.tick_number,
            tick.timestamp,
            tick.transaction_count,
            tick.transactions_size(),
            tick.transaction_batch_hash
        )
    }

    fn json_row(tick: &Tick) -> String {
        serde_json::json!({
            "tick_number": tick.tick_number,
            "timestamp": tick.timestamp,
            "time": tick.datetime_utc().to_rfc3339(),
            "transaction_count": tick.transaction_count,
            "transactions_size": tick.transactions_size(),
            "transaction_batch_hash": tick.transaction_batch_hash,
        })
        .to_string()
    }

    fn minimal_row(&self, tick: &Tick) -> String {
        if self.colored {
            format!(
                "{}#{}{} {} txs",
                Colors::BRIGHT_CYAN,
                tick.tick_number,
                Colors::RESET,
                tick.transaction_count
            )
        } else {
            format!("#{} {} txs", tick.tick_number, tick.transaction_count)
        }
    }
}
