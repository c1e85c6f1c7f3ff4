//! Debt and inventory status types
//!
//! `DebtStatus` is a pure function of the outstanding amount: it is always
//! recomputed from `amount_due` / `amount_paid`, never stored independently
//! of them. `InventoryStatus` is the inventory session state machine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Settlement state of a debt. Advances toward `Paid`, never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtStatus {
    Unpaid,
    Partial,
    Paid,
}

impl DebtStatus {
    /// Derive the status from the current amounts.
    ///
    /// due <= 0 -> Paid; any payment made -> Partial; otherwise Unpaid.
    pub fn from_amounts(amount_paid: Decimal, amount_due: Decimal) -> Self {
        if amount_due <= Decimal::ZERO {
            DebtStatus::Paid
        } else if amount_paid > Decimal::ZERO {
            DebtStatus::Partial
        } else {
            DebtStatus::Unpaid
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DebtStatus::Unpaid => "unpaid",
            DebtStatus::Partial => "partial",
            DebtStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for DebtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for DebtStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "paid" => DebtStatus::Paid,
            "partial" => DebtStatus::Partial,
            _ => DebtStatus::Unpaid,
        }
    }
}

/// How a sale or supply was settled at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Cash,
    Debt,
    Advance,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Cash => "cash",
            PaymentType::Debt => "debt",
            PaymentType::Advance => "advance",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for PaymentType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "cash" => PaymentType::Cash,
            "advance" => PaymentType::Advance,
            _ => PaymentType::Debt,
        }
    }
}

/// Inventory session state machine.
///
/// draft -> in_progress (first item counted) -> completed | cancelled.
/// Completed and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryStatus {
    Draft,
    InProgress,
    Completed,
    Cancelled,
}

impl InventoryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InventoryStatus::Completed | InventoryStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryStatus::Draft => "draft",
            InventoryStatus::InProgress => "in_progress",
            InventoryStatus::Completed => "completed",
            InventoryStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for InventoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for InventoryStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "in_progress" => InventoryStatus::InProgress,
            "completed" => InventoryStatus::Completed,
            "cancelled" => InventoryStatus::Cancelled,
            _ => InventoryStatus::Draft,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debt_status_from_amounts() {
        assert_eq!(
            DebtStatus::from_amounts(Decimal::ZERO, Decimal::new(100, 0)),
            DebtStatus::Unpaid
        );
        assert_eq!(
            DebtStatus::from_amounts(Decimal::new(40, 0), Decimal::new(60, 0)),
            DebtStatus::Partial
        );
        assert_eq!(
            DebtStatus::from_amounts(Decimal::new(100, 0), Decimal::ZERO),
            DebtStatus::Paid
        );
        // due <= 0 wins even if paid is zero (fully advanced debt)
        assert_eq!(
            DebtStatus::from_amounts(Decimal::ZERO, Decimal::ZERO),
            DebtStatus::Paid
        );
    }

    #[test]
    fn test_debt_status_never_regresses_under_payment() {
        // Simulate a payment sequence: 100 due, pay 40, pay 60.
        let mut paid = Decimal::ZERO;
        let mut due = Decimal::new(100, 0);
        let mut last = DebtStatus::from_amounts(paid, due);

        for payment in [Decimal::new(40, 0), Decimal::new(60, 0)] {
            paid += payment;
            due -= payment;
            let next = DebtStatus::from_amounts(paid, due);
            assert!(rank(next) >= rank(last));
            last = next;
        }
        assert_eq!(last, DebtStatus::Paid);

        fn rank(s: DebtStatus) -> u8 {
            match s {
                DebtStatus::Unpaid => 0,
                DebtStatus::Partial => 1,
                DebtStatus::Paid => 2,
            }
        }
    }

    #[test]
    fn test_inventory_status_terminal() {
        assert!(!InventoryStatus::Draft.is_terminal());
        assert!(!InventoryStatus::InProgress.is_terminal());
        assert!(InventoryStatus::Completed.is_terminal());
        assert!(InventoryStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            InventoryStatus::Draft,
            InventoryStatus::InProgress,
            InventoryStatus::Completed,
            InventoryStatus::Cancelled,
        ] {
            assert_eq!(InventoryStatus::from(status.as_str().to_string()), status);
        }
    }
}
