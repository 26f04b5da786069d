//! Repository traits, one per entity
//!
//! The traits are the seams between the engine components and storage. The
//! in-memory implementation lives in [`crate::memory`]; a SQL-backed one
//! would implement the same contracts.

use chrono::{DateTime, Utc};
use vendora_types::{
    CommissionRule, CommissionTransaction, CurrencyCode, Payout, PayoutId, PayoutTransactionLink,
    Result, RuleId, StoreId, TenantId, TransactionId, TransactionStatus, VendorId,
};

use crate::{PayoutFilter, TransactionFilter};

/// Storage contract for commission rules
#[async_trait::async_trait]
pub trait RuleRepository: Send + Sync {
    /// Create a rule; validates the rate definition and the
    /// one-default-per-(tenant, store) invariant
    async fn create(&self, rule: CommissionRule) -> Result<CommissionRule>;

    /// Get a rule by ID
    async fn get(&self, id: &RuleId) -> Result<CommissionRule>;

    /// Replace a rule; same validation as `create`
    async fn update(&self, rule: CommissionRule) -> Result<CommissionRule>;

    /// Mark a rule inactive; rules are never deleted
    async fn deactivate(&self, id: &RuleId) -> Result<()>;

    /// All active rules visible to a (tenant, store): store-scoped rules for
    /// that store plus tenant-wide rules
    async fn list_active(&self, tenant: &TenantId, store: &StoreId)
        -> Result<Vec<CommissionRule>>;

    /// The default rule for a (tenant, store), if one exists
    async fn find_default(
        &self,
        tenant: &TenantId,
        store: &StoreId,
    ) -> Result<Option<CommissionRule>>;
}

/// Storage contract for commission transactions
#[async_trait::async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Insert a new transaction row
    async fn insert(&self, tx: CommissionTransaction) -> Result<CommissionTransaction>;

    /// Get a transaction by ID
    async fn get(&self, id: &TransactionId) -> Result<CommissionTransaction>;

    /// Replace a row that has not been approved yet
    ///
    /// Fails with `ImmutableField` once the stored row is frozen.
    async fn replace(&self, tx: CommissionTransaction) -> Result<CommissionTransaction>;

    /// Advance the lifecycle status, enforcing legal transitions
    ///
    /// Re-setting the current status is a no-op. Entering `Approved` stamps
    /// `approved_at`.
    async fn set_status(
        &self,
        id: &TransactionId,
        next: TransactionStatus,
    ) -> Result<CommissionTransaction>;

    /// Merge a key into the row's metadata object
    async fn annotate(
        &self,
        id: &TransactionId,
        key: &str,
        value: serde_json::Value,
    ) -> Result<CommissionTransaction>;

    /// Query rows by filter, ordered by transaction date
    async fn query(&self, filter: &TransactionFilter) -> Result<Vec<CommissionTransaction>>;

    /// Rows eligible for batching: approved (or disputed), unpaid, dated
    /// within `[start, end)`
    async fn unpaid_approved_in_period(
        &self,
        vendor: &VendorId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CommissionTransaction>>;

    /// Lifetime sale gross for a vendor in one currency, in minor units
    ///
    /// Sums `Sale` rows only; feeds cumulative-volume tier schedules.
    async fn cumulative_gross(&self, vendor: &VendorId, currency: CurrencyCode) -> Result<i64>;

    /// Distinct vendors holding batchable work
    async fn vendors_with_payable_work(&self) -> Result<Vec<VendorId>>;
}

/// Storage contract for payouts and their transaction links
#[async_trait::async_trait]
pub trait PayoutRepository: Send + Sync {
    /// Atomically create a payout, its links, and flip the linked
    /// transactions to `Scheduled`
    ///
    /// Verifies the (vendor, store, currency, period) uniqueness key against
    /// active payouts and re-checks every transaction is still unpaid at
    /// commit time. Nothing is written if any check fails.
    async fn create_with_links(
        &self,
        payout: Payout,
        links: Vec<PayoutTransactionLink>,
    ) -> Result<Payout>;

    /// Get a payout by ID
    async fn get(&self, id: &PayoutId) -> Result<Payout>;

    /// The active (non-cancelled) payout for a uniqueness key, if any
    async fn find_active(
        &self,
        vendor: &VendorId,
        store: &StoreId,
        currency: CurrencyCode,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Option<Payout>>;

    /// Persist field updates and the transitions the processor drives
    /// (`Pending -> Processing`, `Processing -> Failed`,
    /// `Failed -> Processing`), cascading the linked transactions'
    /// `payout_status`
    ///
    /// `Completed` and `Cancelled` are reached only through [`Self::complete`]
    /// and [`Self::cancel`].
    async fn update(&self, payout: Payout) -> Result<Payout>;

    /// Atomically finish a `Processing` payout: state `Completed`, linked
    /// transactions `Paid` with `paid_at` stamped
    async fn complete(&self, id: &PayoutId) -> Result<Payout>;

    /// Atomically cancel a `Pending` or `Failed` payout, reverting linked
    /// transactions to `Unpaid` so the next batch re-includes them
    async fn cancel(&self, id: &PayoutId) -> Result<Payout>;

    /// Links recorded for a payout
    async fn links_for(&self, id: &PayoutId) -> Result<Vec<PayoutTransactionLink>>;

    /// A vendor's payouts, newest first
    async fn list_for_vendor(
        &self,
        vendor: &VendorId,
        filter: &PayoutFilter,
    ) -> Result<Vec<Payout>>;
}
