//! In-memory store backing every repository trait
//!
//! All tables live behind one `RwLock`, so a cross-table operation such as
//! payout creation commits atomically: the uniqueness key, the unpaid
//! re-check, the link rows, and the transaction flips are one critical
//! section. Thread-safe and designed for concurrent access.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use vendora_types::{
    CommissionRule, CommissionTransaction, CurrencyCode, Payout, PayoutId, PayoutState,
    PayoutStatus, PayoutTransactionLink, Result, RuleId, RuleStatus, StoreId, TenantId,
    TransactionId, TransactionStatus, VendoraError, VendorId,
};

use crate::{PayoutFilter, PayoutRepository, RuleRepository, TransactionFilter,
    TransactionRepository};

#[derive(Default)]
struct Tables {
    rules: HashMap<RuleId, CommissionRule>,
    transactions: HashMap<TransactionId, CommissionTransaction>,
    payouts: HashMap<PayoutId, Payout>,
    links: HashMap<PayoutId, Vec<PayoutTransactionLink>>,
}

impl Tables {
    fn rule_default_conflict(&self, candidate: &CommissionRule) -> bool {
        candidate.is_default
            && self.rules.values().any(|r| {
                r.id != candidate.id
                    && r.is_default
                    && r.status == RuleStatus::Active
                    && r.tenant_id == candidate.tenant_id
                    && r.store_id == candidate.store_id
            })
    }

    fn transaction_mut(&mut self, id: &TransactionId) -> Result<&mut CommissionTransaction> {
        self.transactions
            .get_mut(id)
            .ok_or_else(|| VendoraError::TransactionNotFound {
                transaction_id: id.to_string(),
            })
    }

    fn payout_mut(&mut self, id: &PayoutId) -> Result<&mut Payout> {
        self.payouts
            .get_mut(id)
            .ok_or_else(|| VendoraError::PayoutNotFound {
                payout_id: id.to_string(),
            })
    }

    /// Cascade a payout-state change onto the linked transactions
    fn set_linked_payout_status(&mut self, payout_id: &PayoutId, status: PayoutStatus) {
        let tx_ids: Vec<TransactionId> = self
            .links
            .get(payout_id)
            .map(|links| links.iter().map(|l| l.transaction_id.clone()).collect())
            .unwrap_or_default();
        for tx_id in tx_ids {
            if let Some(tx) = self.transactions.get_mut(&tx_id) {
                tx.payout_status = status;
            }
        }
    }
}

/// The in-memory Vendora store
///
/// Implements every repository trait over one lock so components share a
/// consistent view.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

/// Transitions the processor may persist through `update`
fn update_transition_ok(from: PayoutState, to: PayoutState) -> bool {
    matches!(
        (from, to),
        (PayoutState::Pending, PayoutState::Processing)
            | (PayoutState::Processing, PayoutState::Failed)
            | (PayoutState::Failed, PayoutState::Processing)
    )
}

#[async_trait::async_trait]
impl RuleRepository for MemoryStore {
    async fn create(&self, rule: CommissionRule) -> Result<CommissionRule> {
        rule.validate()?;
        let mut tables = self.inner.write().await;
        if tables.rule_default_conflict(&rule) {
            return Err(VendoraError::DuplicateDefaultRule {
                tenant_id: rule.tenant_id.to_string(),
                store_id: rule
                    .store_id
                    .as_ref()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "*".to_string()),
            });
        }
        debug!(rule = %rule.id, default = rule.is_default, "commission rule created");
        tables.rules.insert(rule.id.clone(), rule.clone());
        Ok(rule)
    }

    async fn get(&self, id: &RuleId) -> Result<CommissionRule> {
        let tables = self.inner.read().await;
        tables
            .rules
            .get(id)
            .cloned()
            .ok_or_else(|| VendoraError::RuleNotFound {
                rule_id: id.to_string(),
            })
    }

    async fn update(&self, rule: CommissionRule) -> Result<CommissionRule> {
        rule.validate()?;
        let mut tables = self.inner.write().await;
        if !tables.rules.contains_key(&rule.id) {
            return Err(VendoraError::RuleNotFound {
                rule_id: rule.id.to_string(),
            });
        }
        if tables.rule_default_conflict(&rule) {
            return Err(VendoraError::DuplicateDefaultRule {
                tenant_id: rule.tenant_id.to_string(),
                store_id: rule
                    .store_id
                    .as_ref()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "*".to_string()),
            });
        }
        tables.rules.insert(rule.id.clone(), rule.clone());
        Ok(rule)
    }

    async fn deactivate(&self, id: &RuleId) -> Result<()> {
        let mut tables = self.inner.write().await;
        let rule = tables
            .rules
            .get_mut(id)
            .ok_or_else(|| VendoraError::RuleNotFound {
                rule_id: id.to_string(),
            })?;
        rule.status = RuleStatus::Inactive;
        info!(rule = %id, "commission rule deactivated");
        Ok(())
    }

    async fn list_active(
        &self,
        tenant: &TenantId,
        store: &StoreId,
    ) -> Result<Vec<CommissionRule>> {
        let tables = self.inner.read().await;
        Ok(tables
            .rules
            .values()
            .filter(|r| {
                r.status == RuleStatus::Active
                    && r.tenant_id == *tenant
                    && (r.store_id.is_none() || r.store_id.as_ref() == Some(store))
            })
            .cloned()
            .collect())
    }

    async fn find_default(
        &self,
        tenant: &TenantId,
        store: &StoreId,
    ) -> Result<Option<CommissionRule>> {
        let tables = self.inner.read().await;
        // Prefer a store-scoped default over a tenant-wide one
        let mut fallback = None;
        for rule in tables.rules.values() {
            if rule.status != RuleStatus::Active || !rule.is_default || rule.tenant_id != *tenant {
                continue;
            }
            match &rule.store_id {
                Some(s) if s == store => return Ok(Some(rule.clone())),
                None => fallback = Some(rule.clone()),
                _ => {}
            }
        }
        Ok(fallback)
    }
}

#[async_trait::async_trait]
impl TransactionRepository for MemoryStore {
    async fn insert(&self, tx: CommissionTransaction) -> Result<CommissionTransaction> {
        let mut tables = self.inner.write().await;
        tables.transactions.insert(tx.id.clone(), tx.clone());
        Ok(tx)
    }

    async fn get(&self, id: &TransactionId) -> Result<CommissionTransaction> {
        let tables = self.inner.read().await;
        tables
            .transactions
            .get(id)
            .cloned()
            .ok_or_else(|| VendoraError::TransactionNotFound {
                transaction_id: id.to_string(),
            })
    }

    async fn replace(&self, tx: CommissionTransaction) -> Result<CommissionTransaction> {
        let mut tables = self.inner.write().await;
        let stored = tables.transaction_mut(&tx.id)?;
        if stored.status.is_frozen() {
            return Err(VendoraError::ImmutableField {
                transaction_id: tx.id.to_string(),
            });
        }
        *stored = tx.clone();
        Ok(tx)
    }

    async fn set_status(
        &self,
        id: &TransactionId,
        next: TransactionStatus,
    ) -> Result<CommissionTransaction> {
        let mut tables = self.inner.write().await;
        let stored = tables.transaction_mut(id)?;
        if stored.status == next {
            return Ok(stored.clone());
        }
        if !stored.status.can_transition_to(next) {
            return Err(VendoraError::InvalidTransition {
                entity: "transaction".to_string(),
                from: format!("{:?}", stored.status),
                to: format!("{:?}", next),
            });
        }
        stored.status = next;
        if next == TransactionStatus::Approved {
            stored.approved_at = Some(Utc::now());
        }
        Ok(stored.clone())
    }

    async fn annotate(
        &self,
        id: &TransactionId,
        key: &str,
        value: serde_json::Value,
    ) -> Result<CommissionTransaction> {
        let mut tables = self.inner.write().await;
        let stored = tables.transaction_mut(id)?;
        if !stored.metadata.is_object() {
            stored.metadata = serde_json::json!({});
        }
        if let Some(obj) = stored.metadata.as_object_mut() {
            obj.insert(key.to_string(), value);
        }
        Ok(stored.clone())
    }

    async fn query(&self, filter: &TransactionFilter) -> Result<Vec<CommissionTransaction>> {
        let tables = self.inner.read().await;
        let mut rows: Vec<CommissionTransaction> = tables
            .transactions
            .values()
            .filter(|tx| {
                filter.tenant_id.as_ref().map_or(true, |t| tx.tenant_id == *t)
                    && filter.store_id.as_ref().map_or(true, |s| tx.store_id == *s)
                    && filter.vendor_id.as_ref().map_or(true, |v| tx.vendor_id == *v)
                    && filter.status.map_or(true, |s| tx.status == s)
                    && filter.payout_status.map_or(true, |s| tx.payout_status == s)
                    && filter.kind.map_or(true, |k| tx.kind == k)
                    && filter.date_from.map_or(true, |d| tx.transaction_date >= d)
                    && filter.date_to.map_or(true, |d| tx.transaction_date < d)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.transaction_date
                .cmp(&b.transaction_date)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(rows)
    }

    async fn unpaid_approved_in_period(
        &self,
        vendor: &VendorId,
        start: chrono::DateTime<Utc>,
        end: chrono::DateTime<Utc>,
    ) -> Result<Vec<CommissionTransaction>> {
        let tables = self.inner.read().await;
        let mut rows: Vec<CommissionTransaction> = tables
            .transactions
            .values()
            .filter(|tx| {
                tx.vendor_id == *vendor
                    && tx.is_payable()
                    && tx.transaction_date >= start
                    && tx.transaction_date < end
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.transaction_date.cmp(&b.transaction_date));
        Ok(rows)
    }

    async fn cumulative_gross(&self, vendor: &VendorId, currency: CurrencyCode) -> Result<i64> {
        let tables = self.inner.read().await;
        let mut total: i64 = 0;
        for tx in tables.transactions.values() {
            if tx.vendor_id == *vendor
                && tx.kind == vendora_types::TransactionKind::Sale
                && tx.gross.currency == currency
            {
                total = total
                    .checked_add(tx.gross.minor)
                    .ok_or(VendoraError::AmountOverflow)?;
            }
        }
        Ok(total)
    }

    async fn vendors_with_payable_work(&self) -> Result<Vec<VendorId>> {
        let tables = self.inner.read().await;
        let mut vendors: Vec<VendorId> = tables
            .transactions
            .values()
            .filter(|tx| tx.is_payable())
            .map(|tx| tx.vendor_id.clone())
            .collect();
        vendors.sort();
        vendors.dedup();
        Ok(vendors)
    }
}

#[async_trait::async_trait]
impl PayoutRepository for MemoryStore {
    async fn create_with_links(
        &self,
        payout: Payout,
        links: Vec<PayoutTransactionLink>,
    ) -> Result<Payout> {
        let mut tables = self.inner.write().await;

        // Uniqueness key over active payouts, checked under the write lock
        // so it survives concurrent schedulers
        let duplicate = tables.payouts.values().any(|p| {
            p.state.is_active()
                && p.vendor_id == payout.vendor_id
                && p.store_id == payout.store_id
                && p.currency == payout.currency
                && p.period_start == payout.period_start
                && p.period_end == payout.period_end
        });
        if duplicate {
            return Err(VendoraError::ConcurrentBatchConflict {
                vendor_id: payout.vendor_id.to_string(),
                reason: "an active payout already covers this period".to_string(),
            });
        }

        // Commit-time re-check: every linked transaction must still be
        // eligible, and the payout amount must equal the link sum
        let mut link_sum: i64 = 0;
        for link in &links {
            let tx = tables.transactions.get(&link.transaction_id).ok_or_else(|| {
                VendoraError::TransactionNotFound {
                    transaction_id: link.transaction_id.to_string(),
                }
            })?;
            if !tx.is_payable() {
                return Err(VendoraError::StaleUpdate {
                    transaction_id: link.transaction_id.to_string(),
                });
            }
            if link.amount.currency != payout.currency {
                return Err(VendoraError::CurrencyMismatch {
                    expected: payout.currency.code().to_string(),
                    actual: link.amount.currency.code().to_string(),
                });
            }
            link_sum = link_sum
                .checked_add(link.amount.minor)
                .ok_or(VendoraError::AmountOverflow)?;
        }
        if link_sum != payout.amount.minor {
            return Err(VendoraError::invalid_input(
                "amount",
                "payout amount must equal the sum of linked amounts",
            ));
        }

        // All checks passed: write payout, links, and transaction flips
        for link in &links {
            if let Some(tx) = tables.transactions.get_mut(&link.transaction_id) {
                tx.payout_status = PayoutStatus::Scheduled;
                tx.payout_id = Some(payout.id.clone());
            }
        }
        tables.links.insert(payout.id.clone(), links);
        tables.payouts.insert(payout.id.clone(), payout.clone());
        info!(
            payout = %payout.id,
            vendor = %payout.vendor_id,
            amount = %payout.amount,
            transactions = payout.transaction_count,
            "payout created"
        );
        Ok(payout)
    }

    async fn get(&self, id: &PayoutId) -> Result<Payout> {
        let tables = self.inner.read().await;
        tables
            .payouts
            .get(id)
            .cloned()
            .ok_or_else(|| VendoraError::PayoutNotFound {
                payout_id: id.to_string(),
            })
    }

    async fn find_active(
        &self,
        vendor: &VendorId,
        store: &StoreId,
        currency: CurrencyCode,
        period_start: chrono::DateTime<Utc>,
        period_end: chrono::DateTime<Utc>,
    ) -> Result<Option<Payout>> {
        let tables = self.inner.read().await;
        Ok(tables
            .payouts
            .values()
            .find(|p| {
                p.state.is_active()
                    && p.vendor_id == *vendor
                    && p.store_id == *store
                    && p.currency == currency
                    && p.period_start == period_start
                    && p.period_end == period_end
            })
            .cloned())
    }

    async fn update(&self, payout: Payout) -> Result<Payout> {
        let mut tables = self.inner.write().await;
        let stored = tables.payout_mut(&payout.id)?;
        let from = stored.state;
        let to = payout.state;
        if from != to && !update_transition_ok(from, to) {
            return Err(VendoraError::InvalidTransition {
                entity: "payout".to_string(),
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        *stored = payout.clone();
        if from != to {
            let cascade = match to {
                PayoutState::Processing => Some(PayoutStatus::Processing),
                PayoutState::Failed => Some(PayoutStatus::Failed),
                _ => None,
            };
            if let Some(status) = cascade {
                tables.set_linked_payout_status(&payout.id, status);
            }
        }
        Ok(payout)
    }

    async fn complete(&self, id: &PayoutId) -> Result<Payout> {
        let mut tables = self.inner.write().await;
        let stored = tables.payout_mut(id)?;
        if stored.state != PayoutState::Processing {
            return Err(VendoraError::InvalidTransition {
                entity: "payout".to_string(),
                from: stored.state.to_string(),
                to: PayoutState::Completed.to_string(),
            });
        }
        let now = Utc::now();
        stored.state = PayoutState::Completed;
        stored.completed_at = Some(now);
        let payout = stored.clone();

        let tx_ids: Vec<TransactionId> = tables
            .links
            .get(id)
            .map(|links| links.iter().map(|l| l.transaction_id.clone()).collect())
            .unwrap_or_default();
        for tx_id in tx_ids {
            if let Some(tx) = tables.transactions.get_mut(&tx_id) {
                if tx.status.can_transition_to(TransactionStatus::Paid) {
                    tx.status = TransactionStatus::Paid;
                }
                tx.payout_status = PayoutStatus::Paid;
                tx.paid_at = Some(now);
            }
        }
        info!(payout = %id, amount = %payout.amount, "payout completed");
        Ok(payout)
    }

    async fn cancel(&self, id: &PayoutId) -> Result<Payout> {
        let mut tables = self.inner.write().await;
        let stored = tables.payout_mut(id)?;
        if !stored.state.can_cancel() {
            return Err(VendoraError::InvalidTransition {
                entity: "payout".to_string(),
                from: stored.state.to_string(),
                to: PayoutState::Cancelled.to_string(),
            });
        }
        stored.state = PayoutState::Cancelled;
        let payout = stored.clone();

        // Unlink: every transaction returns to the pool for the next batch
        let tx_ids: Vec<TransactionId> = tables
            .links
            .get(id)
            .map(|links| links.iter().map(|l| l.transaction_id.clone()).collect())
            .unwrap_or_default();
        for tx_id in tx_ids {
            if let Some(tx) = tables.transactions.get_mut(&tx_id) {
                tx.payout_status = PayoutStatus::Unpaid;
                tx.payout_id = None;
            }
        }
        warn!(payout = %id, "payout cancelled; linked transactions released");
        Ok(payout)
    }

    async fn links_for(&self, id: &PayoutId) -> Result<Vec<PayoutTransactionLink>> {
        let tables = self.inner.read().await;
        Ok(tables.links.get(id).cloned().unwrap_or_default())
    }

    async fn list_for_vendor(
        &self,
        vendor: &VendorId,
        filter: &PayoutFilter,
    ) -> Result<Vec<Payout>> {
        let tables = self.inner.read().await;
        let mut rows: Vec<Payout> = tables
            .payouts
            .values()
            .filter(|p| {
                p.vendor_id == *vendor
                    && filter.state.map_or(true, |s| p.state == s)
                    && filter.created_from.map_or(true, |d| p.created_at >= d)
                    && filter.created_to.map_or(true, |d| p.created_at < d)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}
