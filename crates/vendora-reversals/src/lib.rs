//! Vendora Reversals - Dispute and refund handling
//!
//! A resolved dispute becomes a new negative-amount transaction mirroring
//! the original sale. The original row is never edited beyond its status and
//! metadata.
//!
//! # Invariants
//!
//! 1. Reversals are new rows; the original is referenced via metadata
//! 2. Cumulative reversals never exceed the original gross
//! 3. A reversal is born `Approved` (the dispute resolution is the
//!    approval) and `Unpaid`, so it debits the vendor's next batch
//! 4. An already-paid original stays `Paid`; the money comes back through
//!    the next payout cycle, never clawed back from a completed one

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use vendora_observe::MetricsSink;
use vendora_store::TransactionRepository;
use vendora_types::{
    CommissionTransaction, Money, PayoutStatus, Result, TransactionId, TransactionKind,
    TransactionStatus, VendoraError,
};

/// How a dispute was resolved against the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeResolution {
    Refund,
    Chargeback,
}

impl DisputeResolution {
    fn transaction_kind(&self) -> TransactionKind {
        match self {
            Self::Refund => TransactionKind::Refund,
            Self::Chargeback => TransactionKind::Chargeback,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Refund => "refund",
            Self::Chargeback => "chargeback",
        }
    }
}

/// Converts dispute resolutions into ledger reversals
pub struct ReversalHandler {
    transactions: Arc<dyn TransactionRepository>,
    metrics: Arc<dyn MetricsSink>,
}

impl ReversalHandler {
    pub fn new(transactions: Arc<dyn TransactionRepository>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            transactions,
            metrics,
        }
    }

    /// Record a resolved dispute against a sale transaction
    ///
    /// `refund_amount` of `None` reverses the full remaining gross. Partial
    /// refunds pro-rate the commission half-up.
    pub async fn on_dispute_resolved(
        &self,
        original_id: &TransactionId,
        resolution: DisputeResolution,
        refund_amount: Option<Money>,
    ) -> Result<CommissionTransaction> {
        let original = self.transactions.get(original_id).await?;
        if original.kind != TransactionKind::Sale {
            return Err(VendoraError::invalid_input(
                "original_transaction_id",
                "only sale transactions can be reversed",
            ));
        }
        if !original.status.is_frozen() {
            return Err(VendoraError::invalid_input(
                "original_transaction_id",
                "sale has not been approved yet",
            ));
        }

        let already_reversed = reversed_minor(&original);
        let remaining = original.gross.minor - already_reversed;
        let refund_gross = match refund_amount {
            Some(amount) => {
                if amount.currency != original.gross.currency {
                    return Err(VendoraError::CurrencyMismatch {
                        expected: original.gross.currency.code().to_string(),
                        actual: amount.currency.code().to_string(),
                    });
                }
                amount.minor
            }
            None => remaining,
        };
        if refund_gross <= 0 {
            return Err(VendoraError::invalid_input(
                "refund_amount",
                "refund must be positive",
            ));
        }
        if refund_gross > remaining {
            return Err(VendoraError::invalid_input(
                "refund_amount",
                "cumulative refunds would exceed the original gross",
            ));
        }

        // Pro-rata commission reversal, half-up like everything else
        let ratio = Decimal::from(refund_gross) / Decimal::from(original.gross.minor);
        let commission_back = original.commission.apply_rate(ratio)?;
        let gross_back = Money::new(refund_gross, original.gross.currency);
        let net_back = gross_back.checked_sub(commission_back)?;

        let now = Utc::now();
        let reversal = CommissionTransaction {
            id: TransactionId::new(),
            tenant_id: original.tenant_id.clone(),
            store_id: original.store_id.clone(),
            vendor_id: original.vendor_id.clone(),
            order_id: original.order_id.clone(),
            line_item_id: original.line_item_id.clone(),
            rule_id: original.rule_id.clone(),
            kind: resolution.transaction_kind(),
            gross: gross_back.negate(),
            commission_rate: original.commission_rate,
            commission: commission_back.negate(),
            net: net_back.negate(),
            // The dispute resolution is the approval
            status: TransactionStatus::Approved,
            payout_status: PayoutStatus::Unpaid,
            transaction_date: now,
            approved_at: Some(now),
            paid_at: None,
            payout_id: None,
            metadata: serde_json::json!({
                "reversal_of": original.id.to_string(),
                "resolution": resolution.as_str(),
            }),
            created_at: now,
        };
        self.transactions.insert(reversal.clone()).await?;

        // Annotate the original and advance its status where legal
        self.transactions
            .annotate(
                original_id,
                "reversed_minor",
                serde_json::json!(already_reversed + refund_gross),
            )
            .await?;
        self.transactions
            .annotate(original_id, "last_resolution", serde_json::json!(resolution.as_str()))
            .await?;
        if original.status != TransactionStatus::Paid {
            let next = if already_reversed + refund_gross == original.gross.minor {
                TransactionStatus::Refunded
            } else {
                TransactionStatus::Disputed
            };
            self.transactions.set_status(original_id, next).await?;
        }

        self.metrics.incr_counter("reversals.created", 1);
        self.metrics
            .observe("reversals.gross_minor", refund_gross as f64);
        info!(
            reversal = %reversal.id,
            original = %original.id,
            resolution = resolution.as_str(),
            gross = %reversal.gross,
            net = %reversal.net,
            "reversal recorded"
        );
        Ok(reversal)
    }
}

fn reversed_minor(tx: &CommissionTransaction) -> i64 {
    tx.metadata
        .get("reversed_minor")
        .and_then(|v| v.as_i64())
        .unwrap_or(0)
}
