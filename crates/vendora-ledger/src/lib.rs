//! Vendora Ledger - Commission calculation and the transaction lifecycle
//!
//! The ledger owns the commission arithmetic and creates every
//! `CommissionTransaction`. Rows are append-only financial facts.
//!
//! # Invariants
//!
//! 1. `commission + net == gross` on every row the ledger writes
//! 2. `0 <= commission <= gross` for sales, whatever the rule says
//! 3. Approval freezes monetary fields; approving twice is a no-op
//! 4. Arithmetic is deterministic: a row advances `Pending -> Calculated`
//!    with no external input

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info};
use vendora_observe::MetricsSink;
use vendora_rules::{RateSchedule, ResolvedRule};
use vendora_store::{TransactionFilter, TransactionRepository};
use vendora_types::{
    CommissionTransaction, CurrencyCode, Money, PayoutStatus, RateTier, Result, SaleContext,
    TierBasis, TransactionId, TransactionKind, TransactionStatus, VendoraError, VendorBalance,
    VendorId,
};

/// Records sales and drives transactions through approval
pub struct CommissionLedger {
    transactions: Arc<dyn TransactionRepository>,
    metrics: Arc<dyn MetricsSink>,
}

impl CommissionLedger {
    pub fn new(transactions: Arc<dyn TransactionRepository>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            transactions,
            metrics,
        }
    }

    /// Price one completed sale line item and record it
    ///
    /// Creates the row `Pending` and immediately advances it to
    /// `Calculated`; approval is a separate step.
    pub async fn record_sale(
        &self,
        ctx: &SaleContext,
        resolved: &ResolvedRule,
    ) -> Result<CommissionTransaction> {
        if !ctx.gross.is_positive() {
            return Err(VendoraError::invalid_input(
                "gross",
                "sale gross must be positive",
            ));
        }

        let commission = self.commission_for(ctx, &resolved.schedule).await?;
        let net = ctx.gross.checked_sub(commission)?;
        let rate = effective_rate(commission, ctx.gross);

        let tx = CommissionTransaction {
            id: TransactionId::new(),
            tenant_id: ctx.tenant_id.clone(),
            store_id: ctx.store_id.clone(),
            vendor_id: ctx.vendor_id.clone(),
            order_id: ctx.order_id.clone(),
            line_item_id: ctx.line_item_id.clone(),
            rule_id: resolved.rule.id.clone(),
            kind: TransactionKind::Sale,
            gross: ctx.gross,
            commission_rate: rate,
            commission,
            net,
            status: TransactionStatus::Pending,
            payout_status: PayoutStatus::Unpaid,
            transaction_date: ctx.occurred_at,
            approved_at: None,
            paid_at: None,
            payout_id: None,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        };

        self.transactions.insert(tx.clone()).await?;
        let tx = self
            .transactions
            .set_status(&tx.id, TransactionStatus::Calculated)
            .await?;

        self.metrics.incr_counter("ledger.sales_recorded", 1);
        self.metrics
            .observe("ledger.commission_minor", commission.minor as f64);
        info!(
            transaction = %tx.id,
            vendor = %tx.vendor_id,
            gross = %tx.gross,
            commission = %tx.commission,
            net = %tx.net,
            rule = %tx.rule_id,
            "sale recorded"
        );
        Ok(tx)
    }

    /// Approve a calculated transaction, freezing its monetary fields
    ///
    /// Idempotent: approving an already-approved row returns it unchanged.
    pub async fn approve(&self, id: &TransactionId) -> Result<CommissionTransaction> {
        let current = self.transactions.get(id).await?;
        if current.status == TransactionStatus::Approved {
            return Ok(current);
        }
        let tx = self
            .transactions
            .set_status(id, TransactionStatus::Approved)
            .await?;
        self.metrics.incr_counter("ledger.approved", 1);
        debug!(transaction = %id, "transaction approved");
        Ok(tx)
    }

    /// A vendor's settlement position in one currency
    pub async fn vendor_balance(
        &self,
        vendor: &VendorId,
        currency: CurrencyCode,
    ) -> Result<VendorBalance> {
        let rows = self
            .transactions
            .query(&TransactionFilter::for_vendor(vendor.clone()))
            .await?;

        let mut available = Money::zero(currency);
        let mut pending = Money::zero(currency);
        let mut total_paid = Money::zero(currency);
        for tx in rows.iter().filter(|tx| tx.net.currency == currency) {
            match tx.payout_status {
                PayoutStatus::Unpaid if tx.is_payable() => {
                    available = available.checked_add(tx.net)?;
                }
                PayoutStatus::Scheduled | PayoutStatus::Processing => {
                    pending = pending.checked_add(tx.net)?;
                }
                PayoutStatus::Paid => {
                    total_paid = total_paid.checked_add(tx.net)?;
                }
                _ => {}
            }
        }
        Ok(VendorBalance {
            available,
            pending,
            total_paid,
        })
    }

    async fn commission_for(&self, ctx: &SaleContext, schedule: &RateSchedule) -> Result<Money> {
        let raw = match schedule {
            RateSchedule::Percentage { rate } => ctx.gross.apply_rate(*rate)?,
            RateSchedule::Fixed { amount } => {
                if amount.currency != ctx.gross.currency {
                    return Err(VendoraError::CurrencyMismatch {
                        expected: ctx.gross.currency.code().to_string(),
                        actual: amount.currency.code().to_string(),
                    });
                }
                // Commission never exceeds gross
                Money::new(amount.minor.min(ctx.gross.minor), ctx.gross.currency)
            }
            RateSchedule::Tiered { tiers, basis } => {
                let window_start = match basis {
                    TierBasis::TransactionGross => 0,
                    TierBasis::CumulativeVendorVolume => {
                        self.transactions
                            .cumulative_gross(&ctx.vendor_id, ctx.gross.currency)
                            .await?
                    }
                };
                let window_end = window_start
                    .checked_add(ctx.gross.minor)
                    .ok_or(VendoraError::AmountOverflow)?;
                tiered_commission(tiers, window_start, window_end, ctx.gross.currency)?
            }
        };

        // Clamp into [0, gross]
        let minor = raw.minor.clamp(0, ctx.gross.minor);
        Ok(Money::new(minor, ctx.gross.currency))
    }
}

/// Progressive accumulation: each tier prices the overlap of its band with
/// the basis window, each contribution rounded half-up, then summed
fn tiered_commission(
    tiers: &[RateTier],
    window_start: i64,
    window_end: i64,
    currency: CurrencyCode,
) -> Result<Money> {
    let mut total = Money::zero(currency);
    for tier in tiers {
        let lo = tier.lower.max(window_start);
        let hi = match tier.upper {
            Some(upper) => upper.min(window_end),
            None => window_end,
        };
        if hi > lo {
            let portion = Money::new(hi - lo, currency);
            total = total.checked_add(portion.apply_rate(tier.rate)?)?;
        }
    }
    Ok(total)
}

/// The blended rate actually charged, recorded for audit
fn effective_rate(commission: Money, gross: Money) -> Decimal {
    if gross.minor == 0 {
        return Decimal::ZERO;
    }
    Decimal::from(commission.minor) / Decimal::from(gross.minor)
}
