//! Query filters for repository reads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vendora_types::{
    PayoutState, PayoutStatus, StoreId, TenantId, TransactionKind, TransactionStatus, VendorId,
};

/// Filter for `TransactionRepository::query`
///
/// Every field is optional; `None` matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub tenant_id: Option<TenantId>,
    pub store_id: Option<StoreId>,
    pub vendor_id: Option<VendorId>,
    pub status: Option<TransactionStatus>,
    pub payout_status: Option<PayoutStatus>,
    pub kind: Option<TransactionKind>,
    /// Inclusive lower bound on `transaction_date`
    pub date_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `transaction_date`
    pub date_to: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    /// Filter to one vendor's transactions
    pub fn for_vendor(vendor_id: VendorId) -> Self {
        Self {
            vendor_id: Some(vendor_id),
            ..Default::default()
        }
    }
}

/// Filter for `PayoutRepository::list_for_vendor`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayoutFilter {
    pub state: Option<PayoutState>,
    /// Inclusive lower bound on `created_at`
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub created_to: Option<DateTime<Utc>>,
}
