use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{TransactionId, Username};
use crate::money::Cents;

/// Authoritative per-player balance document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(rename = "_id")]
    pub owner: Username,
    pub amount: Cents,
}

impl Balance {
    #[must_use]
    pub fn zero(owner: impl Into<Username>) -> Self {
        Self {
            owner: owner.into(),
            amount: Cents::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Debit,
    Credit,
}

/// Append-only audit entry. Advisory history, never summed into a balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "_id")]
    pub id: TransactionId,
    #[serde(rename = "username")]
    pub owner: Username,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Cents,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    #[must_use]
    pub fn new(owner: impl Into<Username>, kind: TransactionKind, amount: Cents) -> Self {
        Self {
            id: TransactionId::new(),
            owner: owner.into(),
            kind,
            amount,
            timestamp: Utc::now(),
        }
    }
}
