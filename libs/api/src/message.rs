use serde::{Deserialize, Serialize};

use crate::TransactionRecord;

/// Push message written to every client transport.
///
/// Wire form: `{"type":"connected"}` and
/// `{"type":"new-transactions","transactions":[...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UpdateMessage {
    Connected,
    NewTransactions { transactions: Vec<TransactionRecord> },
}

impl UpdateMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
