//! Error handling module
//!
//! Crate-wide error taxonomy. Validation, NotFound and Conflict surface to
//! the caller synchronously and must not be retried; Database errors on
//! primary writes surface, Database errors on secondary/audit writes are
//! logged at the call site and swallowed.

use uuid::Uuid;

use crate::domain::{AmountError, InvalidCurrency, InvalidOperation};

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad input: invalid amount, currency, operation or id format
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Referenced entity absent
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Business conflict: overpayment, store mismatch, terminal inventory,
    /// concurrent modification
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bounded per-operation timeout exceeded
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Storage I/O failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// NotFound for a specific entity id.
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Client error: the caller's input was rejected, retrying the same
    /// request cannot succeed.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound { .. } | Self::Conflict(_)
        )
    }

    /// Conflict errors may succeed after the caller re-reads and retries.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Run an operation under a bounded timeout.
///
/// Externally-triggered operations must not hang on storage I/O; the limit
/// comes from `Config::operation_timeout` (clamped to [1s, 60s]).
pub async fn with_timeout<T, F>(limit: std::time::Duration, operation: F) -> AppResult<T>
where
    F: std::future::Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(limit)),
    }
}

impl From<AmountError> for AppError {
    fn from(e: AmountError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<InvalidCurrency> for AppError {
    fn from(e: InvalidCurrency) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<InvalidOperation> for AppError {
    fn from(e: InvalidOperation) -> Self {
        Self::Validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_client_error_classification() {
        assert!(AppError::Validation("bad amount".into()).is_client_error());
        assert!(AppError::not_found("Debt", Uuid::nil()).is_client_error());
        assert!(AppError::Conflict("overpayment".into()).is_client_error());
        assert!(!AppError::Internal("boom".into()).is_client_error());
    }

    #[test]
    fn test_conflict_classification() {
        assert!(AppError::Conflict("concurrent modification".into()).is_conflict());
        assert!(!AppError::Validation("nope".into()).is_conflict());
    }

    #[test]
    fn test_amount_error_maps_to_validation() {
        let err: AppError = AmountError::NotPositive(Decimal::ZERO).into();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_not_found_display() {
        let err = AppError::not_found("Product", Uuid::nil());
        assert!(err.to_string().contains("Product not found"));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let ok: AppResult<i32> =
            with_timeout(std::time::Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let limit = std::time::Duration::from_millis(10);
        let slow = async {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok(())
        };
        let err = with_timeout(limit, slow).await.unwrap_err();
        assert!(matches!(err, AppError::Timeout(d) if d == limit));
    }
}
