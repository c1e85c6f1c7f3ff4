//! Currency and movement direction types
//!
//! The system supports exactly three currencies (USD, EUR, CDF); any other
//! code is rejected at the boundary. Ledger and stock directions are closed
//! enums so an invalid direction cannot reach the database.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Currency {
    Usd,
    Eur,
    Cdf,
}

/// Error for unsupported currency codes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported currency code: {0}")]
pub struct InvalidCurrency(pub String);

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Eur, Currency::Cdf];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Cdf => "CDF",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Currency {
    type Err = InvalidCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "CDF" => Ok(Currency::Cdf),
            other => Err(InvalidCurrency(other.to_string())),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = InvalidCurrency;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.as_str().to_string()
    }
}

/// Ledger movement direction (cash in / cash out).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Entree,
    Sortie,
}

/// Error for unknown ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown ledger operation: {0}")]
pub struct InvalidOperation(pub String);

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Entree => "entree",
            Operation::Sortie => "sortie",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Operation {
    type Err = InvalidOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "entree" => Ok(Operation::Entree),
            "sortie" => Ok(Operation::Sortie),
            other => Err(InvalidOperation(other.to_string())),
        }
    }
}

/// Stock movement direction. `Ajustement` marks movements produced by an
/// inventory reconciliation rather than a sale or supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Entree,
    Sortie,
    Ajustement,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Entree => "entree",
            MovementKind::Sortie => "sortie",
            MovementKind::Ajustement => "ajustement",
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = InvalidOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "entree" => Ok(MovementKind::Entree),
            "sortie" => Ok(MovementKind::Sortie),
            "ajustement" => Ok(MovementKind::Ajustement),
            other => Err(InvalidOperation(other.to_string())),
        }
    }
}
