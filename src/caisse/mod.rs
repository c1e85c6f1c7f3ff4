//! Caisse, the cash-register ledger
//!
//! The journal is an append-only log of entrée/sortie transactions per
//! store and currency. The caisse itself is never persisted: every balance
//! is recomputed on read by replaying the matching transactions.

mod ledger;
mod report;

pub use ledger::CashLedger;
pub use report::{CaisseRapport, DailyBucket};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Currency, DateRange, Operation};

/// One journal entry. Append-only: never updated or deleted in normal flow.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: Uuid,
    pub amount: Decimal,
    pub operation: Operation,
    pub currency: Currency,
    pub store_id: Uuid,
    pub operator_id: Uuid,
    pub date: DateTime<Utc>,
    pub description: String,
}

/// Derived cash-register view for a filter. Pure read model, recomputed on
/// every query.
#[derive(Debug, Clone)]
pub struct Caisse {
    pub current_balance: Decimal,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub total_benefice: Decimal,
    pub currency: Option<Currency>,
    pub store_ids: Vec<Uuid>,
}

/// Filter shared by balance and report queries.
#[derive(Debug, Clone, Default)]
pub struct CaisseFilter {
    pub store_ids: Vec<Uuid>,
    pub currency: Option<Currency>,
    pub range: Option<DateRange>,
}

/// Fold a transaction list into (total in, total out).
pub(crate) fn fold_totals(transactions: &[Transaction]) -> (Decimal, Decimal) {
    transactions.iter().fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(total_in, total_out), t| match t.operation {
            Operation::Entree => (total_in + t.amount, total_out),
            Operation::Sortie => (total_in, total_out + t.amount),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tx(amount: Decimal, operation: Operation) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            amount,
            operation,
            currency: Currency::Usd,
            store_id: Uuid::new_v4(),
            operator_id: Uuid::new_v4(),
            date: Utc::now(),
            description: String::new(),
        }
    }

    #[test]
    fn test_fold_totals() {
        let transactions = vec![
            tx(dec!(500), Operation::Entree),
            tx(dec!(200), Operation::Sortie),
            tx(dec!(50), Operation::Entree),
        ];
        let (total_in, total_out) = fold_totals(&transactions);
        assert_eq!(total_in, dec!(550));
        assert_eq!(total_out, dec!(200));
    }

    #[test]
    fn test_fold_totals_empty() {
        let (total_in, total_out) = fold_totals(&[]);
        assert_eq!(total_in, Decimal::ZERO);
        assert_eq!(total_out, Decimal::ZERO);
    }
}
