use std::cmp::Ordering;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ════════════════════════════════════════════════════════════════
//  Overflow Policy
// ════════════════════════════════════════════════════════════════

/// Стратегия поведения при переполнении очереди клиента.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// try_send(): если очередь полна, пропустить кадр, залогировать.
    Drop,
    /// Медленный клиент считается мёртвым и отключается.
    Disconnect,
}

// ════════════════════════════════════════════════════════════════
//  Transport Kind
// ════════════════════════════════════════════════════════════════

/// Client transport variant carrying push updates to a browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Long-lived `text/event-stream` response.
    Sse,
    /// Full-duplex socket accepted by an upgrade handshake.
    #[serde(rename = "websocket", alias = "ws")]
    WebSocket,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Sse => f.write_str("sse"),
            TransportKind::WebSocket => f.write_str("websocket"),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Timestamp
// ════════════════════════════════════════════════════════════════

/// Producer-supplied seconds since epoch. Any JSON number is accepted;
/// whole values are written back as integers, fractional ones as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Timestamp(f64);

/// Largest integer an `f64` holds exactly (2^53).
const EXACT_INT: f64 = 9_007_199_254_740_992.0;

impl Timestamp {
    pub fn from_secs_f64(secs: f64) -> Self {
        Self(secs)
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0
    }

    /// Total order, usable for sorting.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }

    fn as_exact_int(self) -> Option<i64> {
        (self.0.fract() == 0.0 && self.0.abs() <= EXACT_INT).then_some(self.0 as i64)
    }
}

impl From<i64> for Timestamp {
    fn from(secs: i64) -> Self {
        Self(secs as f64)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.as_exact_int() {
            Some(secs) => std::fmt::Display::fmt(&secs, f),
            None => std::fmt::Display::fmt(&self.0, f),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_exact_int() {
            Some(secs) => serializer.serialize_i64(secs),
            None => serializer.serialize_f64(self.0),
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Self)
    }
}

// ════════════════════════════════════════════════════════════════
//  TransactionRecord
// ════════════════════════════════════════════════════════════════

/// Normalized token-transfer event. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Opaque unique id (primary key, uniqueness not enforced).
    pub signature: String,
    pub timestamp: Timestamp,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub from: String,
    pub to: String,
}

// ════════════════════════════════════════════════════════════════
//  Upstream (indexer) payload
// ════════════════════════════════════════════════════════════════

/// Event object pushed by the indexer webhook or returned by the
/// historical source. Every field is optional; `null` means absent.
/// Unknown fields (`accountData`, `nativeTransfers`, ...) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamEvent {
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub token_transfers: Option<Vec<TokenTransfer>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    #[serde(default)]
    pub from_user_account: Option<String>,
    #[serde(default)]
    pub to_user_account: Option<String>,
    #[serde(default)]
    pub token_amount: Option<f64>,
}
