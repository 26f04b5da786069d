//! Payout state machine driver
//!
//! States: `Pending -> Processing -> {Completed, Failed}`, with `Cancelled`
//! reachable from `Pending` or `Failed` only. The processor persists every
//! transition through the payout repository, so a crashed process resumes by
//! re-reading state rather than relying on in-memory continuation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};
use vendora_observe::MetricsSink;
use vendora_store::PayoutRepository;
use vendora_types::{
    ApproverId, Payout, PayoutId, PayoutState, Result, VendoraError,
};

use crate::{PaymentProvider, TransferOutcome, TransferRequest};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum transfer attempts before the payout fails
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Processor configuration
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub retry: RetryConfig,
    /// Per-attempt budget; an elapsed timeout counts as retryable, not as
    /// success and not as final failure
    pub transfer_timeout: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            transfer_timeout: Duration::from_secs(30),
        }
    }
}

/// Drives payouts through the transfer lifecycle
pub struct PayoutProcessor {
    payouts: Arc<dyn PayoutRepository>,
    provider: Arc<dyn PaymentProvider>,
    metrics: Arc<dyn MetricsSink>,
    config: ProcessorConfig,
}

impl PayoutProcessor {
    pub fn new(
        payouts: Arc<dyn PayoutRepository>,
        provider: Arc<dyn PaymentProvider>,
        metrics: Arc<dyn MetricsSink>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            payouts,
            provider,
            metrics,
            config,
        }
    }

    /// Record an external approval; idempotent
    pub async fn approve(&self, id: &PayoutId, approver: &ApproverId) -> Result<Payout> {
        let mut payout = self.payouts.get(id).await?;
        if payout.approved_by.is_some() {
            return Ok(payout);
        }
        payout.approved_by = Some(approver.clone());
        payout.approved_at = Some(Utc::now());
        let payout = self.payouts.update(payout).await?;
        info!(payout = %id, approver = %approver, "payout approved");
        Ok(payout)
    }

    /// Process a pending payout to a terminal outcome
    ///
    /// A payout gated on approval is returned unchanged. Anything past
    /// `Pending` is rejected; use [`Self::retry`] for failed payouts.
    pub async fn process(&self, id: &PayoutId, destination: &str) -> Result<Payout> {
        let payout = self.payouts.get(id).await?;
        if payout.state != PayoutState::Pending {
            return Err(VendoraError::InvalidTransition {
                entity: "payout".to_string(),
                from: payout.state.to_string(),
                to: PayoutState::Processing.to_string(),
            });
        }
        if payout.awaiting_approval() {
            info!(payout = %id, "payout waiting on approval");
            return Ok(payout);
        }
        let payout = self.enter_processing(payout).await?;
        self.transfer_loop(payout, destination).await
    }

    /// Manual retry of a failed payout; retry counters are preserved
    pub async fn retry(&self, id: &PayoutId, destination: &str) -> Result<Payout> {
        let payout = self.payouts.get(id).await?;
        if payout.state != PayoutState::Failed {
            return Err(VendoraError::InvalidTransition {
                entity: "payout".to_string(),
                from: payout.state.to_string(),
                to: PayoutState::Processing.to_string(),
            });
        }
        info!(payout = %id, retry_count = payout.retry_count, "manual retry");
        let payout = self.enter_processing(payout).await?;
        self.transfer_loop(payout, destination).await
    }

    /// Cancel a pending or failed payout, releasing its transactions
    pub async fn cancel(&self, id: &PayoutId) -> Result<Payout> {
        let payout = self.payouts.cancel(id).await?;
        self.metrics.incr_counter("processor.payouts_cancelled", 1);
        Ok(payout)
    }

    async fn enter_processing(&self, mut payout: Payout) -> Result<Payout> {
        payout.state = PayoutState::Processing;
        payout.processing_started_at = Some(Utc::now());
        self.payouts.update(payout).await
    }

    async fn transfer_loop(&self, mut payout: Payout, destination: &str) -> Result<Payout> {
        let request = TransferRequest {
            payout_id: payout.id.clone(),
            destination: destination.to_string(),
            amount: payout.amount,
            currency: payout.currency,
            idempotency_key: payout.id.to_string(),
        };
        loop {
            self.metrics.incr_counter("processor.transfer_attempts", 1);
            let outcome = match tokio::time::timeout(
                self.config.transfer_timeout,
                self.provider.transfer(&request),
            )
            .await
            {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(err)) => TransferOutcome::Retryable {
                    reason: err.to_string(),
                },
                Err(_) => TransferOutcome::Retryable {
                    reason: "transfer call timed out".to_string(),
                },
            };

            match outcome {
                TransferOutcome::Success { provider_ref } => {
                    let payout = self.payouts.complete(&payout.id).await?;
                    self.metrics.incr_counter("processor.payouts_completed", 1);
                    self.metrics
                        .observe("processor.payout_amount_minor", payout.amount.minor as f64);
                    info!(
                        payout = %payout.id,
                        provider_ref = %provider_ref,
                        amount = %payout.amount,
                        "transfer completed"
                    );
                    return Ok(payout);
                }
                TransferOutcome::Retryable { reason } => {
                    payout.retry_count += 1;
                    payout.last_retry_at = Some(Utc::now());
                    payout = self.payouts.update(payout).await?;
                    if payout.retry_count >= self.config.retry.max_attempts {
                        return self
                            .fail(
                                payout,
                                format!("retry budget exhausted: {}", reason),
                            )
                            .await;
                    }
                    let delay = backoff_delay(&self.config.retry, payout.retry_count);
                    warn!(
                        payout = %payout.id,
                        retry_count = payout.retry_count,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "transient transfer failure; backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                TransferOutcome::Terminal { reason } => {
                    return self.fail(payout, reason).await;
                }
            }
        }
    }

    /// A failed payout keeps its identity: state plus reason, no exception
    async fn fail(&self, mut payout: Payout, reason: String) -> Result<Payout> {
        payout.state = PayoutState::Failed;
        payout.failed_at = Some(Utc::now());
        payout.failure_reason = Some(reason.clone());
        let payout = self.payouts.update(payout).await?;
        self.metrics.incr_counter("processor.payouts_failed", 1);
        error!(payout = %payout.id, reason = %reason, "payout failed");
        Ok(payout)
    }
}

/// Exponential backoff: `base * 2^(attempt - 1)`, capped
fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let delay = retry.base_delay.saturating_mul(2u32.saturating_pow(exponent));
    delay.min(retry.max_delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;
    use vendora_observe::{MemoryMetrics, NoopMetrics};
    use vendora_store::{MemoryStore, TransactionRepository};
    use vendora_types::{
        CommissionTransaction, CurrencyCode, LineItemId, Money, OrderId, PayoutStatus,
        PayoutTransactionLink, RuleId, StoreId, TenantId, TransactionId, TransactionKind,
        TransactionStatus, VendorId,
    };

    fn fast_config() -> ProcessorConfig {
        ProcessorConfig {
            retry: RetryConfig {
                max_attempts: 5,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(4),
            },
            transfer_timeout: Duration::from_millis(200),
        }
    }

    async fn seed_payout(
        store: &Arc<MemoryStore>,
        requires_approval: bool,
    ) -> (Payout, CommissionTransaction) {
        let vendor = VendorId::new();
        let shop = StoreId::new();
        let gross = Money::new(10_000, CurrencyCode::USD);
        let net = Money::new(9_000, CurrencyCode::USD);
        let tx = CommissionTransaction {
            id: TransactionId::new(),
            tenant_id: TenantId::new(),
            store_id: shop.clone(),
            vendor_id: vendor.clone(),
            order_id: OrderId::new(),
            line_item_id: LineItemId::new(),
            rule_id: RuleId::new(),
            kind: TransactionKind::Sale,
            gross,
            commission_rate: dec!(0.10),
            commission: gross.checked_sub(net).unwrap(),
            net,
            status: TransactionStatus::Approved,
            payout_status: PayoutStatus::Unpaid,
            transaction_date: Utc::now() - ChronoDuration::hours(1),
            approved_at: Some(Utc::now()),
            paid_at: None,
            payout_id: None,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        };
        store.insert(tx.clone()).await.unwrap();

        let payout = Payout {
            id: PayoutId::new(),
            vendor_id: vendor,
            store_id: shop,
            period_start: Utc::now() - ChronoDuration::days(7),
            period_end: Utc::now(),
            amount: net,
            currency: CurrencyCode::USD,
            transaction_count: 1,
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
        let links = vec![PayoutTransactionLink {
            payout_id: payout.id.clone(),
            transaction_id: tx.id.clone(),
            amount: tx.net,
        }];
        let payout = store.create_with_links(payout, links).await.unwrap();
        (payout, tx)
    }

    fn processor(
        store: Arc<MemoryStore>,
        provider: Arc<MockProvider>,
    ) -> PayoutProcessor {
        PayoutProcessor::new(store, provider, Arc::new(NoopMetrics), fast_config())
    }

    use crate::MockProvider;

    #[tokio::test]
    async fn test_success_completes_payout_and_pays_transactions() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockProvider::new());
        let (payout, tx) = seed_payout(&store, false).await;

        let processor = processor(store.clone(), provider.clone());
        let done = processor.process(&payout.id, "acct_vendor").await.unwrap();
        assert_eq!(done.state, PayoutState::Completed);
        assert!(done.completed_at.is_some());
        assert!(done.processing_started_at.is_some());

        let tx_after = TransactionRepository::get(store.as_ref(), &tx.id).await.unwrap();
        assert_eq!(tx_after.status, TransactionStatus::Paid);
        assert_eq!(tx_after.payout_status, PayoutStatus::Paid);
        assert!(tx_after.paid_at.is_some());
    }

    #[tokio::test]
    async fn test_approval_gate_holds_payout() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockProvider::new());
        let (payout, _) = seed_payout(&store, true).await;

        let processor = processor(store.clone(), provider.clone());
        let held = processor.process(&payout.id, "acct_vendor").await.unwrap();
        assert_eq!(held.state, PayoutState::Pending);
        assert_eq!(provider.call_count(), 0);

        let approver = ApproverId::new();
        processor.approve(&payout.id, &approver).await.unwrap();
        let done = processor.process(&payout.id, "acct_vendor").await.unwrap();
        assert_eq!(done.state, PayoutState::Completed);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_approve_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockProvider::new());
        let (payout, _) = seed_payout(&store, true).await;

        let processor = processor(store.clone(), provider);
        let first_approver = ApproverId::new();
        let approved = processor.approve(&payout.id, &first_approver).await.unwrap();
        let again = processor.approve(&payout.id, &ApproverId::new()).await.unwrap();
        assert_eq!(again.approved_by, Some(first_approver));
        assert_eq!(again.approved_at, approved.approved_at);
    }

    #[tokio::test]
    async fn test_three_timeouts_then_success() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockProvider::new());
        provider.queue_retryable("gateway timeout");
        provider.queue_retryable("gateway timeout");
        provider.queue_retryable("gateway timeout");
        provider.queue_success();
        let (payout, _) = seed_payout(&store, false).await;

        let processor = processor(store.clone(), provider.clone());
        let done = processor.process(&payout.id, "acct_vendor").await.unwrap();
        assert_eq!(done.state, PayoutState::Completed);
        assert_eq!(done.retry_count, 3);
        assert!(done.last_retry_at.is_some());
        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion_fails_payout() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockProvider::new());
        for _ in 0..5 {
            provider.queue_retryable("rate limited");
        }
        let (payout, tx) = seed_payout(&store, false).await;

        let processor = processor(store.clone(), provider.clone());
        let failed = processor.process(&payout.id, "acct_vendor").await.unwrap();
        assert_eq!(failed.state, PayoutState::Failed);
        assert_eq!(failed.retry_count, 5);
        assert!(failed
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("retry budget exhausted"));

        let tx_after = TransactionRepository::get(store.as_ref(), &tx.id).await.unwrap();
        assert_eq!(tx_after.payout_status, PayoutStatus::Failed);
    }

    #[tokio::test]
    async fn test_terminal_decline_fails_immediately() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockProvider::new());
        provider.queue_terminal("invalid destination");
        let (payout, _) = seed_payout(&store, false).await;

        let processor = processor(store.clone(), provider.clone());
        let failed = processor.process(&payout.id, "acct_vendor").await.unwrap();
        assert_eq!(failed.state, PayoutState::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("invalid destination"));
        assert_eq!(failed.retry_count, 0);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_manual_retry_preserves_counters() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockProvider::new());
        provider.queue_terminal("destination closed");
        provider.queue_success();
        let (payout, _) = seed_payout(&store, false).await;

        let processor = processor(store.clone(), provider.clone());
        let failed = processor.process(&payout.id, "acct_vendor").await.unwrap();
        assert_eq!(failed.state, PayoutState::Failed);

        let done = processor.retry(&payout.id, "acct_vendor_new").await.unwrap();
        assert_eq!(done.state, PayoutState::Completed);
        assert_eq!(done.retry_count, failed.retry_count);

        // Both attempts used the same idempotency key
        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].idempotency_key, calls[1].idempotency_key);
        assert_eq!(calls[0].idempotency_key, payout.id.to_string());
    }

    #[tokio::test]
    async fn test_process_rejects_non_pending_states() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockProvider::new());
        let (payout, _) = seed_payout(&store, false).await;

        let processor = processor(store.clone(), provider);
        processor.process(&payout.id, "acct_vendor").await.unwrap();

        let err = processor.process(&payout.id, "acct_vendor").await;
        assert!(matches!(err, Err(VendoraError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_cancel_from_failed_releases_transactions() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockProvider::new());
        provider.queue_terminal("compliance block");
        let (payout, tx) = seed_payout(&store, false).await;

        let processor = processor(store.clone(), provider);
        processor.process(&payout.id, "acct_vendor").await.unwrap();
        let cancelled = processor.cancel(&payout.id).await.unwrap();
        assert_eq!(cancelled.state, PayoutState::Cancelled);

        let tx_after = TransactionRepository::get(store.as_ref(), &tx.id).await.unwrap();
        assert_eq!(tx_after.payout_status, PayoutStatus::Unpaid);
        assert!(tx_after.payout_id.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_hang_counts_as_retryable() {
        struct HangingProvider {
            inner: MockProvider,
        }

        #[async_trait::async_trait]
        impl PaymentProvider for HangingProvider {
            async fn transfer(&self, request: &TransferRequest) -> Result<TransferOutcome> {
                if self.inner.call_count() == 0 {
                    self.inner.transfer(request).await?;
                    // First call hangs well past the per-attempt budget
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                self.inner.transfer(request).await
            }
        }

        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(HangingProvider {
            inner: MockProvider::new(),
        });
        let (payout, _) = seed_payout(&store, false).await;

        let processor =
            PayoutProcessor::new(store.clone(), provider, Arc::new(NoopMetrics), fast_config());
        let done = processor.process(&payout.id, "acct_vendor").await.unwrap();
        assert_eq!(done.state, PayoutState::Completed);
        assert_eq!(done.retry_count, 1);
    }

    #[tokio::test]
    async fn test_metrics_count_outcomes() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockProvider::new());
        provider.queue_retryable("blip");
        provider.queue_success();
        let metrics = Arc::new(MemoryMetrics::new());
        let (payout, _) = seed_payout(&store, false).await;

        let processor =
            PayoutProcessor::new(store.clone(), provider, metrics.clone(), fast_config());
        processor.process(&payout.id, "acct_vendor").await.unwrap();
        assert_eq!(metrics.counter("processor.transfer_attempts"), 2);
        assert_eq!(metrics.counter("processor.payouts_completed"), 1);
    }
}
