//! Domain primitives
//!
//! Closed enums and validated newtypes shared by every component. Nothing in
//! this module touches the database.

mod amount;
mod context;
mod currency;
mod period;
mod status;

pub use amount::{Amount, AmountError};
pub use context::OperationContext;
pub use currency::{Currency, InvalidCurrency, InvalidOperation, MovementKind, Operation};
pub use period::{day_bounds, DateRange, Period};
pub use status::{DebtStatus, InventoryStatus, PaymentType};
