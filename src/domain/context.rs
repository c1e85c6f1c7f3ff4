//! Operation Context
//!
//! Metadata about the current operation, threaded through multi-step
//! workflows for audit records and tracing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context for an externally-triggered operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    /// Operator (user) performing the operation
    pub operator_id: Uuid,

    /// Store the operation is scoped to, when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<Uuid>,

    /// Correlation ID for tracing a workflow across its writes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl OperationContext {
    pub fn new(operator_id: Uuid) -> Self {
        Self {
            operator_id,
            store_id: None,
            correlation_id: None,
        }
    }

    pub fn with_store(mut self, store_id: Uuid) -> Self {
        self.store_id = Some(store_id);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Generate a correlation ID if not present.
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let operator = Uuid::new_v4();
        let store = Uuid::new_v4();

        let ctx = OperationContext::new(operator).with_store(store);
        assert_eq!(ctx.operator_id, operator);
        assert_eq!(ctx.store_id, Some(store));
        assert!(ctx.correlation_id.is_none());
    }

    #[test]
    fn test_ensure_correlation_id() {
        let mut ctx = OperationContext::new(Uuid::new_v4());
        let id = ctx.ensure_correlation_id();
        assert_eq!(ctx.ensure_correlation_id(), id);
    }
}
