//! retail-ledger Library
//!
//! Re-exports modules for integration testing and external use.

pub mod caisse;
pub mod debt;
pub mod domain;
pub mod health;
pub mod jobs;
pub mod outbox;
pub mod rates;
pub mod report;
pub mod stock;
pub mod store;

pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use error::{with_timeout, AppError, AppResult};
pub use domain::{Amount, AmountError, Currency, OperationContext, Period};
