//! Outbox entry types and payloads

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::{Currency, MovementKind, Operation};

/// The secondary write an entry carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxKind {
    /// Cascading caisse transaction from a debt / provider-debt payment
    LedgerEntry,
    /// Stock movement produced by an inventory adjustment
    StockMovement,
    /// Rapport entry produced by an inventory adjustment
    StoreRapport,
    /// Exchange-rate audit history row
    RateHistory,
}

impl OutboxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxKind::LedgerEntry => "ledger.entry",
            OutboxKind::StockMovement => "stock.movement",
            OutboxKind::StoreRapport => "stock.rapport",
            OutboxKind::RateHistory => "rates.history",
        }
    }
}

impl fmt::Display for OutboxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutboxKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ledger.entry" => Ok(OutboxKind::LedgerEntry),
            "stock.movement" => Ok(OutboxKind::StockMovement),
            "stock.rapport" => Ok(OutboxKind::StoreRapport),
            "rates.history" => Ok(OutboxKind::RateHistory),
            other => Err(other.to_string()),
        }
    }
}

/// Delivery state of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    Pending,
    Completed,
    Failed,
}

impl From<String> for OutboxStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "completed" => OutboxStatus::Completed,
            "failed" => OutboxStatus::Failed,
            _ => OutboxStatus::Pending,
        }
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboxStatus::Pending => write!(f, "pending"),
            OutboxStatus::Completed => write!(f, "completed"),
            OutboxStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One recorded secondary write.
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub kind: OutboxKind,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
}

/// Payload for a cascading caisse transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntryPayload {
    pub operation: Operation,
    pub amount: Decimal,
    pub currency: Currency,
    pub store_id: Uuid,
    pub operator_id: Uuid,
    pub date: DateTime<Utc>,
    pub description: String,
}

/// Payload for an inventory-produced stock movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementPayload {
    pub product_id: Uuid,
    pub store_id: Uuid,
    pub quantity: Decimal,
    pub kind: MovementKind,
    pub date: DateTime<Utc>,
}

/// Payload for an inventory-produced rapport entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RapportPayload {
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub kind: MovementKind,
    pub date: DateTime<Utc>,
    pub note: Option<String>,
}

/// Payload for an exchange-rate history row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateHistoryPayload {
    pub company_id: Uuid,
    pub from: Currency,
    pub to: Currency,
    pub rate: Decimal,
    pub previous_rate: Option<Decimal>,
    pub updated_by: Uuid,
    pub updated_at: DateTime<Utc>,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            OutboxKind::LedgerEntry,
            OutboxKind::StockMovement,
            OutboxKind::StoreRapport,
            OutboxKind::RateHistory,
        ] {
            assert_eq!(kind.as_str().parse::<OutboxKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!("ledger.unknown".parse::<OutboxKind>().is_err());
    }

    #[test]
    fn test_status_from_string() {
        assert_eq!(OutboxStatus::from("completed".to_string()), OutboxStatus::Completed);
        assert_eq!(OutboxStatus::from("failed".to_string()), OutboxStatus::Failed);
        assert_eq!(OutboxStatus::from("anything".to_string()), OutboxStatus::Pending);
    }
}
