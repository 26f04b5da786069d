//! Error types for Vendora
//!
//! Every failure is explicit. A sale that cannot be priced fails loudly,
//! never with a silent zero commission, and a payout that fails keeps its
//! identity plus an operator-visible reason.

use thiserror::Error;

/// Result type for Vendora operations
pub type Result<T> = std::result::Result<T, VendoraError>;

/// Vendora error types
#[derive(Debug, Clone, Error)]
pub enum VendoraError {
    // ========================================================================
    // Amount Errors
    // ========================================================================

    /// Amount overflow during arithmetic
    #[error("Amount overflow during arithmetic operation")]
    AmountOverflow,

    /// Currency mismatch
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    // ========================================================================
    // Rule Errors
    // ========================================================================

    /// No commission rule applies to a sale
    #[error("No applicable commission rule for vendor {vendor_id} on order {order_id}")]
    NoApplicableRule { vendor_id: String, order_id: String },

    /// Rule not found
    #[error("Commission rule {rule_id} not found")]
    RuleNotFound { rule_id: String },

    /// Tier schedule is malformed
    #[error("Invalid tier schedule: {reason}")]
    InvalidTierSchedule { reason: String },

    /// A second default rule for the same scope
    #[error("A default rule already exists for tenant {tenant_id}, store {store_id}")]
    DuplicateDefaultRule { tenant_id: String, store_id: String },

    // ========================================================================
    // Transaction Errors
    // ========================================================================

    /// Transaction not found
    #[error("Commission transaction {transaction_id} not found")]
    TransactionNotFound { transaction_id: String },

    /// Monetary fields are frozen once a transaction is approved
    #[error("Transaction {transaction_id} is approved; monetary fields are immutable")]
    ImmutableField { transaction_id: String },

    /// Illegal state machine transition
    #[error("Illegal {entity} transition from {from} to {to}")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },

    // ========================================================================
    // Payout Errors
    // ========================================================================

    /// Payout not found
    #[error("Payout {payout_id} not found")]
    PayoutNotFound { payout_id: String },

    /// A concurrent batch run already created the payout
    #[error("Concurrent batch conflict for vendor {vendor_id}: {reason}")]
    ConcurrentBatchConflict { vendor_id: String, reason: String },

    /// A linked transaction changed under the batch run
    #[error("Transaction {transaction_id} was modified concurrently")]
    StaleUpdate { transaction_id: String },

    // ========================================================================
    // Provider Errors
    // ========================================================================

    /// Transient provider failure (timeout, 5xx, rate limit)
    #[error("Payment provider transient error: {reason}")]
    ProviderTransient { reason: String },

    /// Terminal provider decline (invalid destination, compliance block)
    #[error("Payment provider terminal decline: {reason}")]
    ProviderTerminal { reason: String },

    // ========================================================================
    // General Errors
    // ========================================================================

    /// Vendor has no registered profile
    #[error("Vendor {vendor_id} not found")]
    VendorNotFound { vendor_id: String },

    /// Invalid input
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },
}

impl VendoraError {
    /// Create an invalid input error
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check if this is a retriable error
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::ProviderTransient { .. }
                | Self::ConcurrentBatchConflict { .. }
                | Self::StaleUpdate { .. }
        )
    }

    /// Get an error code for API responses and failure reasons
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            Self::NoApplicableRule { .. } => "NO_APPLICABLE_RULE",
            Self::RuleNotFound { .. } => "RULE_NOT_FOUND",
            Self::InvalidTierSchedule { .. } => "INVALID_TIER_SCHEDULE",
            Self::DuplicateDefaultRule { .. } => "DUPLICATE_DEFAULT_RULE",
            Self::TransactionNotFound { .. } => "TRANSACTION_NOT_FOUND",
            Self::ImmutableField { .. } => "IMMUTABLE_FIELD",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::PayoutNotFound { .. } => "PAYOUT_NOT_FOUND",
            Self::ConcurrentBatchConflict { .. } => "CONCURRENT_BATCH_CONFLICT",
            Self::StaleUpdate { .. } => "STALE_UPDATE",
            Self::ProviderTransient { .. } => "PROVIDER_TRANSIENT",
            Self::ProviderTerminal { .. } => "PROVIDER_TERMINAL",
            Self::VendorNotFound { .. } => "VENDOR_NOT_FOUND",
            Self::InvalidInput { .. } => "INVALID_INPUT",
        }
    }
}
