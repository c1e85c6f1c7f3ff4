//! Debt tracking
//!
//! Two parallel ledgers: client debts opened by sales and provider debts
//! opened by stock supplies. Both share the same arithmetic invariant
//! (`amount_paid + amount_due == total_amount`) and the same payment
//! contract; they differ only in their tables, their counterparty entity
//! and the direction of the cascading caisse entry (a client payment is an
//! entrée, a provider payment a sortie).

mod tracker;

pub use tracker::{DebtTracker, PaymentOutcome};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Currency, DebtStatus, Operation, PaymentType};

/// Which ledger a tracker operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebtSide {
    /// Client debt opened by a sale; payments cascade as caisse entrées.
    Client,
    /// Provider debt opened by a supply; payments cascade as caisse sorties.
    Provider,
}

impl DebtSide {
    pub(crate) fn debts_table(&self) -> &'static str {
        match self {
            DebtSide::Client => "debts",
            DebtSide::Provider => "provider_debts",
        }
    }

    pub(crate) fn payments_table(&self) -> &'static str {
        match self {
            DebtSide::Client => "debt_payments",
            DebtSide::Provider => "provider_debt_payments",
        }
    }

    pub(crate) fn debt_entity(&self) -> &'static str {
        match self {
            DebtSide::Client => "Debt",
            DebtSide::Provider => "ProviderDebt",
        }
    }

    /// Direction of the cascading caisse transaction for a payment.
    pub(crate) fn ledger_operation(&self) -> Operation {
        match self {
            DebtSide::Client => Operation::Entree,
            DebtSide::Provider => Operation::Sortie,
        }
    }
}

/// A tracked debt. Mutated only by payments: `amount_paid` increases,
/// `amount_due` decreases, status advances toward paid and never regresses.
#[derive(Debug, Clone)]
pub struct Debt {
    pub id: Uuid,
    /// Originating sale (client side) or supply (provider side)
    pub origin_id: Uuid,
    /// Client or provider owing / being owed
    pub counterparty_id: Uuid,
    pub store_id: Uuid,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
    pub currency: Currency,
    pub status: DebtStatus,
    pub payment_type: PaymentType,
    /// Set once, when the debt is fully settled
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Append-only record of one payment event.
#[derive(Debug, Clone)]
pub struct DebtPayment {
    pub id: Uuid,
    pub debt_id: Uuid,
    pub amount: Decimal,
    pub currency: Currency,
    pub operator_id: Uuid,
    pub store_id: Uuid,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
