//! Payout types
//!
//! A `Payout` is a batched settlement of accumulated net amounts to a vendor
//! for a period. It is the one long-running process in the engine, persisted
//! between steps and resumable by re-reading its state.
//!
//! # Invariants
//!
//! 1. `amount` equals the sum of linked transactions' net at creation time
//! 2. At most one non-cancelled payout per
//!    (vendor, store, currency, period_start, period_end)
//! 3. Cancellation is legal only from `Pending` or `Failed`

use crate::{ApproverId, CurrencyCode, Money, PayoutId, StoreId, TransactionId, VendorId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of a payout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayoutState {
    /// Created, possibly waiting on approval
    Pending,
    /// Transfer in flight at the payment provider
    Processing,
    /// Funds transferred
    Completed,
    /// Transfer declined or retry budget exhausted
    Failed,
    /// Unwound; linked transactions returned to the pool
    Cancelled,
}

impl PayoutState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Cancellation is never legal mid-transfer or after completion
    pub fn can_cancel(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }

    /// Check if the payout still counts against the uniqueness key
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl std::fmt::Display for PayoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// A batched settlement to a vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    /// Unique payout ID
    pub id: PayoutId,
    /// Vendor being settled
    pub vendor_id: VendorId,
    /// Store the settled transactions belong to
    pub store_id: StoreId,
    /// Start of the settled period (inclusive)
    pub period_start: DateTime<Utc>,
    /// End of the settled period (exclusive)
    pub period_end: DateTime<Utc>,
    /// Sum of linked transactions' net at creation
    pub amount: Money,
    /// Settlement currency; a payout never mixes currencies
    pub currency: CurrencyCode,
    /// Number of linked transactions
    pub transaction_count: u32,
    /// Current state
    pub state: PayoutState,
    /// Whether an external approval gates processing
    pub requires_approval: bool,
    /// Who approved the payout
    pub approved_by: Option<ApproverId>,
    /// When the payout was approved
    pub approved_at: Option<DateTime<Utc>>,
    /// Transfer attempts consumed so far
    pub retry_count: u32,
    /// When the last retry was attempted
    pub last_retry_at: Option<DateTime<Utc>>,
    /// When processing began
    pub processing_started_at: Option<DateTime<Utc>>,
    /// When the transfer completed
    pub completed_at: Option<DateTime<Utc>>,
    /// When the payout failed
    pub failed_at: Option<DateTime<Utc>>,
    /// Operator-visible reason for failure
    pub failure_reason: Option<String>,
    /// When the payout was created
    pub created_at: DateTime<Utc>,
}

impl Payout {
    /// Check if processing is still gated on approval
    pub fn awaiting_approval(&self) -> bool {
        self.state == PayoutState::Pending && self.requires_approval && self.approved_by.is_none()
    }
}

/// Join row recording which transactions funded which payout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutTransactionLink {
    pub payout_id: PayoutId,
    pub transaction_id: TransactionId,
    /// Amount the transaction contributed; equals its net unless pro-rated
    pub amount: Money,
}
