//! Commission transaction types
//!
//! A `CommissionTransaction` is an immutable financial fact: one commission
//! calculation event. Reversals are always new rows referencing the original
//! through metadata, never edits.
//!
//! # Invariants
//!
//! 1. Once `status` reaches `Approved` the monetary fields are frozen;
//!    only `status`, `payout_status`, and `payout_id` may change
//! 2. `commission + net == gross` for every row
//! 3. A transaction is linked to at most one active payout at a time

use crate::{
    CategoryId, LineItemId, Money, OrderId, PayoutId, ProductId, RuleId, StoreId, TenantId,
    TransactionId, VendorId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What kind of financial event the row records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    /// A completed sale line item
    Sale,
    /// Negative mirror of a refunded sale
    Refund,
    /// Operator correction
    Adjustment,
    /// Negative mirror of a chargeback
    Chargeback,
}

/// Commission lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Created, arithmetic not yet recorded
    Pending,
    /// Commission computed, awaiting approval
    Calculated,
    /// Approved; monetary fields frozen from here on
    Approved,
    /// Settled through a completed payout
    Paid,
    /// Fully reversed
    Refunded,
    /// Under an open dispute
    Disputed,
}

impl TransactionStatus {
    /// Monetary fields freeze at approval and stay frozen
    pub fn is_frozen(&self) -> bool {
        !matches!(self, Self::Pending | Self::Calculated)
    }

    /// Check whether a transition is legal
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Calculated)
                | (Calculated, Approved)
                | (Calculated, Disputed)
                | (Approved, Paid)
                | (Approved, Disputed)
                | (Approved, Refunded)
                | (Disputed, Paid)
                | (Disputed, Refunded)
        )
    }
}

/// Settlement progress of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayoutStatus {
    /// Eligible for the next batch
    Unpaid,
    /// Linked into a pending payout
    Scheduled,
    /// The linked payout is transferring
    Processing,
    /// Settled
    Paid,
    /// The linked payout failed; awaiting remediation
    Failed,
}

/// An immutable commission calculation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionTransaction {
    /// Unique transaction ID
    pub id: TransactionId,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Store the sale happened in
    pub store_id: StoreId,
    /// Vendor owed the net amount
    pub vendor_id: VendorId,
    /// Originating order
    pub order_id: OrderId,
    /// Originating line item
    pub line_item_id: LineItemId,
    /// The rule that priced this row, recorded even if the rule later changes
    pub rule_id: RuleId,
    /// Sale, refund, adjustment, or chargeback
    pub kind: TransactionKind,
    /// Gross sale amount (negative for reversals)
    pub gross: Money,
    /// Effective blended rate applied
    pub commission_rate: Decimal,
    /// Platform's share (negative for reversals)
    pub commission: Money,
    /// Vendor's share: gross - commission
    pub net: Money,
    /// Commission lifecycle status
    pub status: TransactionStatus,
    /// Settlement progress
    pub payout_status: PayoutStatus,
    /// When the underlying sale occurred
    pub transaction_date: DateTime<Utc>,
    /// When the row was approved
    pub approved_at: Option<DateTime<Utc>>,
    /// When the row was settled
    pub paid_at: Option<DateTime<Utc>>,
    /// The payout currently settling this row, if any
    pub payout_id: Option<PayoutId>,
    /// Escape hatch: reversal references, dispute records
    pub metadata: serde_json::Value,
    /// When the row was created
    pub created_at: DateTime<Utc>,
}

impl CommissionTransaction {
    /// Check if this row offsets an earlier sale
    pub fn is_reversal(&self) -> bool {
        matches!(self.kind, TransactionKind::Refund | TransactionKind::Chargeback)
    }

    /// Check if the row can still enter a payout
    pub fn is_payable(&self) -> bool {
        matches!(
            self.status,
            TransactionStatus::Approved | TransactionStatus::Disputed
        ) && self.payout_status == PayoutStatus::Unpaid
    }
}

/// Context for one completed sale line item, supplied by the order subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleContext {
    pub tenant_id: TenantId,
    pub store_id: StoreId,
    pub vendor_id: VendorId,
    pub order_id: OrderId,
    pub line_item_id: LineItemId,
    pub product_id: ProductId,
    pub category_ids: Vec<CategoryId>,
    /// Gross line item amount in minor units
    pub gross: Money,
    /// When the order completed; also the rule resolution date
    pub occurred_at: DateTime<Utc>,
}

/// A vendor's settlement position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorBalance {
    /// Net of approved, unpaid transactions
    pub available: Money,
    /// Net of transactions scheduled or processing in a payout
    pub pending: Money,
    /// Net settled over the vendor's lifetime
    pub total_paid: Money,
}
