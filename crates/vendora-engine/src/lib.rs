//! Vendora Engine - Commission calculation and payout settlement facade
//!
//! The engine wires every component over one shared store and exposes the
//! interfaces the rest of the marketplace consumes:
//!
//! - Order subsystem: [`CommissionEngine::on_sale_completed`]
//! - Dispute subsystem: [`CommissionEngine::on_dispute_resolved`]
//! - Approval workflow: [`CommissionEngine::approve_payout`]
//! - Reporting: balances, transaction and payout listings, statements
//!
//! The payment provider is injected as an `Arc<dyn PaymentProvider>`; swap
//! in [`vendora_settlement::MockProvider`] for tests.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use vendora_engine::{CommissionEngine, EngineConfig, VendorProfile};
//! use vendora_settlement::MockProvider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = CommissionEngine::new(Arc::new(MockProvider::new()), EngineConfig::default());
//!
//!     let tx = engine.on_sale_completed(sale_context).await?;
//!     engine.approve_transaction(&tx.id).await?;
//!
//!     let payouts = engine.run_batch(&tx.vendor_id, period_start, period_end).await?;
//!     engine.process_payout(&payouts[0].id).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod directory;
pub mod reporting;

pub use config::*;
pub use directory::*;
pub use reporting::*;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{info, warn};
use vendora_batching::{BatcherConfig, PayoutBatcher};
use vendora_ledger::CommissionLedger;
use vendora_observe::{MetricsSink, NoopMetrics};
use vendora_reversals::{DisputeResolution, ReversalHandler};
use vendora_rules::RuleResolver;
use vendora_settlement::{PaymentProvider, PayoutProcessor, ProcessorConfig};
use vendora_store::{
    MemoryStore, PayoutFilter, PayoutRepository, RuleRepository, TransactionFilter,
    TransactionRepository,
};
use vendora_types::{
    ApproverId, CommissionRule, CommissionTransaction, Money, Payout, PayoutId, Result, RuleId,
    SaleContext, TransactionId, VendorBalance, VendorId,
};

/// The assembled settlement engine
pub struct CommissionEngine {
    store: Arc<MemoryStore>,
    resolver: RuleResolver,
    ledger: CommissionLedger,
    batcher: PayoutBatcher,
    processor: PayoutProcessor,
    reversals: ReversalHandler,
    directory: Arc<VendorDirectory>,
    config: EngineConfig,
}

impl CommissionEngine {
    /// Assemble an engine with no metrics sink
    pub fn new(provider: Arc<dyn PaymentProvider>, config: EngineConfig) -> Self {
        Self::with_metrics(provider, config, Arc::new(NoopMetrics))
    }

    /// Assemble an engine with an injected metrics sink
    pub fn with_metrics(
        provider: Arc<dyn PaymentProvider>,
        config: EngineConfig,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let directory = Arc::new(VendorDirectory::new());
        let resolver = RuleResolver::new(store.clone());
        let ledger = CommissionLedger::new(store.clone(), metrics.clone());
        let batcher = PayoutBatcher::new(
            store.clone(),
            store.clone(),
            directory.clone(),
            metrics.clone(),
            BatcherConfig {
                approval_threshold_minor: config.approval_threshold_minor,
            },
        );
        let processor = PayoutProcessor::new(
            store.clone(),
            provider,
            metrics.clone(),
            ProcessorConfig {
                retry: config.retry.clone(),
                transfer_timeout: config.transfer_timeout,
            },
        );
        let reversals = ReversalHandler::new(store.clone(), metrics);
        Self {
            store,
            resolver,
            ledger,
            batcher,
            processor,
            reversals,
            directory,
            config,
        }
    }

    /// The vendor directory, for registration and risk flags
    pub fn directory(&self) -> &VendorDirectory {
        &self.directory
    }

    /// Register a vendor's settlement profile
    pub fn register_vendor(&self, profile: VendorProfile) {
        self.directory.register(profile);
    }

    // ------------------------------------------------------------------
    // Rule administration
    // ------------------------------------------------------------------

    pub async fn create_rule(&self, rule: CommissionRule) -> Result<CommissionRule> {
        RuleRepository::create(self.store.as_ref(), rule).await
    }

    pub async fn update_rule(&self, rule: CommissionRule) -> Result<CommissionRule> {
        RuleRepository::update(self.store.as_ref(), rule).await
    }

    pub async fn deactivate_rule(&self, id: &RuleId) -> Result<()> {
        self.store.deactivate(id).await
    }

    // ------------------------------------------------------------------
    // Consumed interfaces
    // ------------------------------------------------------------------

    /// Price and record one completed sale line item
    pub async fn on_sale_completed(&self, ctx: SaleContext) -> Result<CommissionTransaction> {
        let resolved = self.resolver.resolve(&ctx).await?;
        self.ledger.record_sale(&ctx, &resolved).await
    }

    /// Approve a calculated transaction for settlement
    pub async fn approve_transaction(&self, id: &TransactionId) -> Result<CommissionTransaction> {
        self.ledger.approve(id).await
    }

    /// Record a resolved dispute against a sale
    pub async fn on_dispute_resolved(
        &self,
        original_id: &TransactionId,
        resolution: DisputeResolution,
        refund_amount: Option<Money>,
    ) -> Result<CommissionTransaction> {
        self.reversals
            .on_dispute_resolved(original_id, resolution, refund_amount)
            .await
    }

    /// External approval of a gated payout
    pub async fn approve_payout(&self, id: &PayoutId, approver: &ApproverId) -> Result<Payout> {
        self.processor.approve(id, approver).await
    }

    // ------------------------------------------------------------------
    // Batching and processing
    // ------------------------------------------------------------------

    /// Batch one vendor's eligible transactions for a period
    pub async fn run_batch(
        &self,
        vendor: &VendorId,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Vec<Payout>> {
        self.batcher.run_batch(vendor, period_start, period_end).await
    }

    /// Drive a pending payout through transfer to a terminal outcome
    pub async fn process_payout(&self, id: &PayoutId) -> Result<Payout> {
        let payout = PayoutRepository::get(self.store.as_ref(), id).await?;
        let profile = self.directory.get(&payout.vendor_id)?;
        self.processor.process(id, &profile.payout_destination).await
    }

    /// Manual retry of a failed payout, e.g. after fixing the destination
    pub async fn retry_payout(&self, id: &PayoutId) -> Result<Payout> {
        let payout = PayoutRepository::get(self.store.as_ref(), id).await?;
        let profile = self.directory.get(&payout.vendor_id)?;
        self.processor.retry(id, &profile.payout_destination).await
    }

    /// Cancel a pending or failed payout, releasing its transactions
    pub async fn cancel_payout(&self, id: &PayoutId) -> Result<Payout> {
        self.processor.cancel(id).await
    }

    /// Batch every vendor holding eligible work for the period
    ///
    /// Cross-vendor runs execute concurrently; a failure for one vendor is
    /// logged and skipped rather than aborting the sweep.
    pub async fn sweep(
        &self,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Vec<Payout>> {
        let vendors = self.store.vendors_with_payable_work().await?;
        info!(vendors = vendors.len(), "sweep started");
        let runs = vendors
            .iter()
            .map(|vendor| self.batcher.run_batch(vendor, period_start, period_end));
        let results = join_all(runs).await;

        let mut payouts = Vec::new();
        for (vendor, result) in vendors.iter().zip(results) {
            match result {
                Ok(mut created) => payouts.append(&mut created),
                Err(err) => {
                    warn!(vendor = %vendor, error = %err, "sweep failed for vendor")
                }
            }
        }
        info!(payouts = payouts.len(), "sweep finished");
        Ok(payouts)
    }

    /// Periodic sweep loop; callers spawn this on the runtime
    ///
    /// Each tick batches the window that ended at the tick, sized to the
    /// configured interval.
    pub async fn run_sweep_scheduler(&self) {
        let mut ticker = tokio::time::interval(self.config.sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so every sweep
        // covers a full window
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let period_end = Utc::now();
            let period_start = period_end
                - chrono::Duration::from_std(self.config.sweep_interval)
                    .unwrap_or_else(|_| chrono::Duration::days(1));
            if let Err(err) = self.sweep(period_start, period_end).await {
                warn!(error = %err, "scheduled sweep failed");
            }
        }
    }

    // ------------------------------------------------------------------
    // Exposed reporting interfaces
    // ------------------------------------------------------------------

    /// A vendor's settlement position in their profile currency
    pub async fn vendor_balance(&self, vendor: &VendorId) -> Result<VendorBalance> {
        let profile = self.directory.get(vendor)?;
        self.ledger.vendor_balance(vendor, profile.currency).await
    }

    /// Query transaction rows
    pub async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<CommissionTransaction>> {
        self.store.query(filter).await
    }

    /// A vendor's payouts, newest first
    pub async fn list_payouts(
        &self,
        vendor: &VendorId,
        filter: &PayoutFilter,
    ) -> Result<Vec<Payout>> {
        self.store.list_for_vendor(vendor, filter).await
    }

    /// Aggregate a vendor's activity over a period
    pub async fn vendor_statement(
        &self,
        vendor: &VendorId,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<VendorStatement> {
        let profile = self.directory.get(vendor)?;
        let rows = self
            .store
            .query(&TransactionFilter {
                vendor_id: Some(vendor.clone()),
                date_from: Some(period_start),
                date_to: Some(period_end),
                ..Default::default()
            })
            .await?;
        build_statement(
            vendor.clone(),
            profile.currency,
            period_start,
            period_end,
            &rows,
        )
    }
}
