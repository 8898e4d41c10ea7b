/// file: src/types.rs
/// description: tick data model and inbound stream message envelope
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// Inbound messages, tagged on "type"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamMessage {
    Tick(Tick),
    Error { error: String },
    Ping,
    Pong,
}

/// One sequenced unit of chain data.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub tick_number: u64,
    #[serde(default)]
    pub timestamp: u64, // microseconds since epoch
    #[serde(default)]
    pub transaction_count: u64,
    #[serde(default)]
    pub transaction_batch_hash: String,
    #[serde(default)]
    pub previous_output: String,
    #[serde(default)]
    pub vdf_proof: VdfProof,
    #[serde(default)]
    pub transactions: Vec<TransactionRef>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VdfProof {
    pub input: String,
    pub output: String,
    pub proof: String,
    pub iterations: u64,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionRef {
    pub tx_id: String,
    pub sequence_number: u64,
    pub nonce: u64,
    pub size: u64,
}

impl Tick {
    /// Get timestamp as UTC DateTime
    pub fn datetime_utc(&self) -> DateTime<Utc> {
        i64::try_from(self.timestamp)
            .ok()
            .and_then(DateTime::from_timestamp_micros)
            .unwrap_or_else(Utc::now)
    }

    /// Get timestamp as Local DateTime
    pub fn datetime_local(&self) -> DateTime<Local> {
        self.datetime_utc().with_timezone(&Local)
    }

    /// Total payload size of the referenced transactions
    pub fn transactions_size(&self) -> u64 {
        self.transactions.iter().map(|tx| tx.size).sum()
    }

    /// Shortened batch hash for narrow displays
    pub fn short_batch_hash(&self) -> &str {
        let hash = self
            .transaction_batch_hash
            .strip_prefix("0x")
            .unwrap_or(&self.transaction_batch_hash);
        hash.get(..12).unwrap_or(hash)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resumed stream started later than the requested cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickGap {
    pub expected: u64,
    pub received: u64,
}

impl TickGap {
    pub fn missing(&self) -> u64 {
        self.received.saturating_sub(self.expected)
    }
}
