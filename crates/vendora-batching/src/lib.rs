//! Vendora Batching - Periodic payout aggregation
//!
//! The batcher sweeps a vendor's approved, unpaid transactions for a period
//! into payouts, one per (store, currency) group. Runs are idempotent: the
//! uniqueness key on (vendor, store, currency, period) means overlapping or
//! retried scheduler runs return the existing payout instead of creating a
//! duplicate.
//!
//! # Invariants
//!
//! 1. Batch runs for the same vendor are serialized; cross-vendor runs may
//!    overlap freely
//! 2. A payout never mixes currencies
//! 3. Payout creation is all-or-nothing: links and transaction flips commit
//!    with the payout or not at all

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use vendora_observe::MetricsSink;
use vendora_store::{PayoutRepository, TransactionRepository};
use vendora_types::{
    CommissionTransaction, CurrencyCode, Money, Payout, PayoutId, PayoutState,
    PayoutTransactionLink, Result, StoreId, VendoraError, VendorId,
};

/// Decides which vendors need manual payout approval
#[async_trait::async_trait]
pub trait RiskPolicy: Send + Sync {
    async fn is_high_risk(&self, vendor: &VendorId) -> bool;
}

/// Policy that flags nobody
pub struct NoRiskPolicy;

#[async_trait::async_trait]
impl RiskPolicy for NoRiskPolicy {
    async fn is_high_risk(&self, _vendor: &VendorId) -> bool {
        false
    }
}

/// Batcher configuration
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Payouts above this many minor units require approval
    pub approval_threshold_minor: i64,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            // 1000.00 in a two-decimal currency
            approval_threshold_minor: 100_000,
        }
    }
}

/// Aggregates unpaid approved transactions into payouts
pub struct PayoutBatcher {
    transactions: Arc<dyn TransactionRepository>,
    payouts: Arc<dyn PayoutRepository>,
    risk: Arc<dyn RiskPolicy>,
    metrics: Arc<dyn MetricsSink>,
    config: BatcherConfig,
    vendor_locks: DashMap<VendorId, Arc<Mutex<()>>>,
}

impl PayoutBatcher {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        payouts: Arc<dyn PayoutRepository>,
        risk: Arc<dyn RiskPolicy>,
        metrics: Arc<dyn MetricsSink>,
        config: BatcherConfig,
    ) -> Self {
        Self {
            transactions,
            payouts,
            risk,
            metrics,
            config,
            vendor_locks: DashMap::new(),
        }
    }

    /// Batch one vendor's eligible transactions for a period
    ///
    /// Returns one payout per (store, currency) group with a positive net
    /// sum. Existing active payouts for the period are returned unchanged.
    pub async fn run_batch(
        &self,
        vendor: &VendorId,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Vec<Payout>> {
        // Same-vendor runs are strictly ordered; the guard is held across
        // the whole sweep for this vendor
        let lock = self.vendor_lock(vendor);
        let _guard = lock.lock().await;

        let rows = self
            .transactions
            .unpaid_approved_in_period(vendor, period_start, period_end)
            .await?;

        let mut payouts = Vec::new();
        for ((store_id, currency), group) in group_by_store_currency(rows) {
            // Idempotency check: a retried or overlapping run returns the
            // payout the earlier run created
            if let Some(existing) = self
                .payouts
                .find_active(vendor, &store_id, currency, period_start, period_end)
                .await?
            {
                debug!(payout = %existing.id, vendor = %vendor, "existing payout returned");
                payouts.push(existing);
                continue;
            }

            let mut sum: i64 = 0;
            for tx in &group {
                sum = sum
                    .checked_add(tx.net.minor)
                    .ok_or(VendoraError::AmountOverflow)?;
            }
            if sum <= 0 {
                // Reversals outweigh sales; defer the debit until later
                // sales absorb it
                debug!(
                    vendor = %vendor,
                    store = %store_id,
                    net_minor = sum,
                    "non-positive group deferred"
                );
                continue;
            }

            let amount = Money::new(sum, currency);
            let requires_approval = sum > self.config.approval_threshold_minor
                || self.risk.is_high_risk(vendor).await;

            let payout = Payout {
                id: PayoutId::new(),
                vendor_id: vendor.clone(),
                store_id: store_id.clone(),
                period_start,
                period_end,
                amount,
                currency,
                transaction_count: group.len() as u32,
                state: PayoutState::Pending,
                requires_approval,
                approved_by: None,
                approved_at: None,
                retry_count: 0,
                last_retry_at: None,
                processing_started_at: None,
                completed_at: None,
                failed_at: None,
                failure_reason: None,
                created_at: Utc::now(),
            };
            let links = group
                .iter()
                .map(|tx| PayoutTransactionLink {
                    payout_id: payout.id.clone(),
                    transaction_id: tx.id.clone(),
                    amount: tx.net,
                })
                .collect();

            match self.payouts.create_with_links(payout, links).await {
                Ok(created) => {
                    self.metrics.incr_counter("batcher.payouts_created", 1);
                    self.metrics
                        .observe("batcher.payout_amount_minor", sum as f64);
                    info!(
                        payout = %created.id,
                        vendor = %vendor,
                        amount = %created.amount,
                        requires_approval = created.requires_approval,
                        "payout batched"
                    );
                    payouts.push(created);
                }
                Err(err) if err.is_retriable() => {
                    // A racing scheduler won the uniqueness key; absorb the
                    // conflict by re-reading what it created
                    warn!(vendor = %vendor, error = %err, "batch conflict absorbed");
                    self.metrics.incr_counter("batcher.conflicts_absorbed", 1);
                    if let Some(existing) = self
                        .payouts
                        .find_active(vendor, &store_id, currency, period_start, period_end)
                        .await?
                    {
                        payouts.push(existing);
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok(payouts)
    }

    fn vendor_lock(&self, vendor: &VendorId) -> Arc<Mutex<()>> {
        self.vendor_locks
            .entry(vendor.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Group transactions by (store, currency) with a stable iteration order
fn group_by_store_currency(
    rows: Vec<CommissionTransaction>,
) -> Vec<((StoreId, CurrencyCode), Vec<CommissionTransaction>)> {
    let mut groups: HashMap<(StoreId, CurrencyCode), Vec<CommissionTransaction>> = HashMap::new();
    for tx in rows {
        groups
            .entry((tx.store_id.clone(), tx.net.currency))
            .or_default()
            .push(tx);
    }
    let mut ordered: Vec<_> = groups.into_iter().collect();
    ordered.sort_by(|((sa, ca), _), ((sb, cb), _)| sa.cmp(sb).then_with(|| ca.code().cmp(cb.code())));
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use vendora_observe::{MemoryMetrics, NoopMetrics};
    use vendora_store::MemoryStore;
    use vendora_types::{
        LineItemId, OrderId, PayoutStatus, RuleId, TenantId, TransactionId, TransactionKind,
        TransactionStatus,
    };

    fn approved_tx(
        vendor: &VendorId,
        store: &StoreId,
        currency: CurrencyCode,
        net_minor: i64,
        kind: TransactionKind,
    ) -> CommissionTransaction {
        let gross = Money::new(net_minor + net_minor.signum() * 100, currency);
        let net = Money::new(net_minor, currency);
        CommissionTransaction {
            id: TransactionId::new(),
            tenant_id: TenantId::new(),
            store_id: store.clone(),
            vendor_id: vendor.clone(),
            order_id: OrderId::new(),
            line_item_id: LineItemId::new(),
            rule_id: RuleId::new(),
            kind,
            gross,
            commission_rate: dec!(0.10),
            commission: gross.checked_sub(net).unwrap(),
            net,
            status: TransactionStatus::Approved,
            payout_status: PayoutStatus::Unpaid,
            transaction_date: Utc::now() - Duration::hours(1),
            approved_at: Some(Utc::now()),
            paid_at: None,
            payout_id: None,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    fn batcher(store: Arc<MemoryStore>) -> PayoutBatcher {
        PayoutBatcher::new(
            store.clone(),
            store,
            Arc::new(NoRiskPolicy),
            Arc::new(NoopMetrics),
            BatcherConfig::default(),
        )
    }

    fn period() -> (DateTime<Utc>, DateTime<Utc>) {
        (Utc::now() - Duration::days(7), Utc::now())
    }

    #[tokio::test]
    async fn test_batch_groups_and_sums() {
        let store = Arc::new(MemoryStore::new());
        let vendor = VendorId::new();
        let shop = StoreId::new();
        let a = approved_tx(&vendor, &shop, CurrencyCode::USD, 9_000, TransactionKind::Sale);
        let b = approved_tx(&vendor, &shop, CurrencyCode::USD, 7_510, TransactionKind::Sale);
        store.insert(a).await.unwrap();
        store.insert(b).await.unwrap();

        let batcher = batcher(store.clone());
        let (start, end) = period();
        let payouts = batcher.run_batch(&vendor, start, end).await.unwrap();
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].amount.minor, 16_510);
        assert_eq!(payouts[0].transaction_count, 2);
        assert_eq!(payouts[0].state, PayoutState::Pending);
    }

    #[tokio::test]
    async fn test_run_batch_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let vendor = VendorId::new();
        let shop = StoreId::new();
        store
            .insert(approved_tx(&vendor, &shop, CurrencyCode::USD, 9_000, TransactionKind::Sale))
            .await
            .unwrap();

        let batcher = batcher(store.clone());
        let (start, end) = period();
        let first = batcher.run_batch(&vendor, start, end).await.unwrap();
        let second = batcher.run_batch(&vendor, start, end).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].id, second[0].id);

        let all = store
            .list_for_vendor(&vendor, &Default::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_selection_creates_nothing() {
        let store = Arc::new(MemoryStore::new());
        let vendor = VendorId::new();
        let batcher = batcher(store.clone());
        let (start, end) = period();
        let payouts = batcher.run_batch(&vendor, start, end).await.unwrap();
        assert!(payouts.is_empty());
    }

    #[tokio::test]
    async fn test_currencies_never_mix() {
        let store = Arc::new(MemoryStore::new());
        let vendor = VendorId::new();
        let shop = StoreId::new();
        store
            .insert(approved_tx(&vendor, &shop, CurrencyCode::USD, 9_000, TransactionKind::Sale))
            .await
            .unwrap();
        store
            .insert(approved_tx(&vendor, &shop, CurrencyCode::EUR, 4_000, TransactionKind::Sale))
            .await
            .unwrap();

        let batcher = batcher(store.clone());
        let (start, end) = period();
        let payouts = batcher.run_batch(&vendor, start, end).await.unwrap();
        assert_eq!(payouts.len(), 2);
        let currencies: Vec<_> = payouts.iter().map(|p| p.currency).collect();
        assert!(currencies.contains(&CurrencyCode::USD));
        assert!(currencies.contains(&CurrencyCode::EUR));
    }

    #[tokio::test]
    async fn test_unapproved_rows_are_not_swept() {
        let store = Arc::new(MemoryStore::new());
        let vendor = VendorId::new();
        let shop = StoreId::new();
        let mut tx = approved_tx(&vendor, &shop, CurrencyCode::USD, 9_000, TransactionKind::Sale);
        tx.status = TransactionStatus::Calculated;
        tx.approved_at = None;
        store.insert(tx).await.unwrap();

        let batcher = batcher(store.clone());
        let (start, end) = period();
        let payouts = batcher.run_batch(&vendor, start, end).await.unwrap();
        assert!(payouts.is_empty());
    }

    #[tokio::test]
    async fn test_negative_sum_group_is_deferred() {
        let store = Arc::new(MemoryStore::new());
        let vendor = VendorId::new();
        let shop = StoreId::new();
        store
            .insert(approved_tx(&vendor, &shop, CurrencyCode::USD, 2_000, TransactionKind::Sale))
            .await
            .unwrap();
        store
            .insert(approved_tx(
                &vendor,
                &shop,
                CurrencyCode::USD,
                -9_000,
                TransactionKind::Refund,
            ))
            .await
            .unwrap();

        let batcher = batcher(store.clone());
        let (start, end) = period();
        let payouts = batcher.run_batch(&vendor, start, end).await.unwrap();
        assert!(payouts.is_empty());
    }

    #[tokio::test]
    async fn test_sale_and_full_reversal_net_to_zero() {
        let store = Arc::new(MemoryStore::new());
        let vendor = VendorId::new();
        let shop = StoreId::new();
        store
            .insert(approved_tx(&vendor, &shop, CurrencyCode::USD, 9_000, TransactionKind::Sale))
            .await
            .unwrap();
        store
            .insert(approved_tx(
                &vendor,
                &shop,
                CurrencyCode::USD,
                -9_000,
                TransactionKind::Refund,
            ))
            .await
            .unwrap();

        let batcher = batcher(store.clone());
        let (start, end) = period();
        let payouts = batcher.run_batch(&vendor, start, end).await.unwrap();
        assert!(payouts.is_empty());
    }

    #[tokio::test]
    async fn test_reversal_debits_next_payout() {
        let store = Arc::new(MemoryStore::new());
        let vendor = VendorId::new();
        let shop = StoreId::new();
        store
            .insert(approved_tx(&vendor, &shop, CurrencyCode::USD, 9_000, TransactionKind::Sale))
            .await
            .unwrap();
        store
            .insert(approved_tx(
                &vendor,
                &shop,
                CurrencyCode::USD,
                -2_000,
                TransactionKind::Refund,
            ))
            .await
            .unwrap();

        let batcher = batcher(store.clone());
        let (start, end) = period();
        let payouts = batcher.run_batch(&vendor, start, end).await.unwrap();
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].amount.minor, 7_000);
        assert_eq!(payouts[0].transaction_count, 2);
    }

    #[tokio::test]
    async fn test_threshold_flags_approval() {
        let store = Arc::new(MemoryStore::new());
        let vendor = VendorId::new();
        let shop = StoreId::new();
        store
            .insert(approved_tx(
                &vendor,
                &shop,
                CurrencyCode::USD,
                250_000,
                TransactionKind::Sale,
            ))
            .await
            .unwrap();

        let batcher = batcher(store.clone());
        let (start, end) = period();
        let payouts = batcher.run_batch(&vendor, start, end).await.unwrap();
        assert!(payouts[0].requires_approval);
    }

    #[tokio::test]
    async fn test_concurrent_runs_create_one_payout() {
        let store = Arc::new(MemoryStore::new());
        let vendor = VendorId::new();
        let shop = StoreId::new();
        for _ in 0..4 {
            store
                .insert(approved_tx(&vendor, &shop, CurrencyCode::USD, 1_000, TransactionKind::Sale))
                .await
                .unwrap();
        }

        let batcher = Arc::new(batcher(store.clone()));
        let (start, end) = period();
        let (left, right) = tokio::join!(
            batcher.run_batch(&vendor, start, end),
            batcher.run_batch(&vendor, start, end),
        );
        let left = left.unwrap();
        let right = right.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(right.len(), 1);
        assert_eq!(left[0].id, right[0].id);

        // Every transaction is linked exactly once
        let links = store.links_for(&left[0].id).await.unwrap();
        assert_eq!(links.len(), 4);
        let all = store
            .list_for_vendor(&vendor, &Default::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_metrics_observed() {
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(MemoryMetrics::new());
        let vendor = VendorId::new();
        let shop = StoreId::new();
        store
            .insert(approved_tx(&vendor, &shop, CurrencyCode::USD, 9_000, TransactionKind::Sale))
            .await
            .unwrap();

        let batcher = PayoutBatcher::new(
            store.clone(),
            store.clone(),
            Arc::new(NoRiskPolicy),
            metrics.clone(),
            BatcherConfig::default(),
        );
        let (start, end) = period();
        batcher.run_batch(&vendor, start, end).await.unwrap();
        assert_eq!(metrics.counter("batcher.payouts_created"), 1);
        assert_eq!(metrics.observations("batcher.payout_amount_minor"), vec![9_000.0]);
    }
}
