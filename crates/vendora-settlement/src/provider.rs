//! Payment provider trait and the scriptable mock

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use vendora_types::{CurrencyCode, Money, PayoutId, Result};

/// One transfer instruction to the payment provider
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub payout_id: PayoutId,
    /// Vendor's payout destination (account token, IBAN, etc.)
    pub destination: String,
    pub amount: Money,
    pub currency: CurrencyCode,
    /// Derived from the payout id; stable across retries and restarts so
    /// the provider can dedupe
    pub idempotency_key: String,
}

/// What the provider said about a transfer
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    /// Funds moved; `provider_ref` is the provider's transfer id
    Success { provider_ref: String },
    /// Timeout, 5xx, rate limit: worth retrying
    Retryable { reason: String },
    /// Invalid destination, compliance block: no automatic retry
    Terminal { reason: String },
}

/// External transfer API
///
/// `Err` means the call itself failed in transport; the processor treats
/// that the same as a retryable outcome.
#[async_trait::async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferOutcome>;
}

/// Scriptable provider for tests
///
/// Outcomes queue up front-to-back; once the script runs dry every call
/// succeeds. All requests are recorded for assertion.
#[derive(Default)]
pub struct MockProvider {
    script: Mutex<VecDeque<TransferOutcome>>,
    calls: Mutex<Vec<TransferRequest>>,
    sequence: AtomicU64,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a success outcome
    pub fn queue_success(&self) {
        self.script.lock().push_back(TransferOutcome::Success {
            provider_ref: format!("scripted_{}", self.sequence.fetch_add(1, Ordering::Relaxed)),
        });
    }

    /// Queue a retryable failure
    pub fn queue_retryable(&self, reason: &str) {
        self.script.lock().push_back(TransferOutcome::Retryable {
            reason: reason.to_string(),
        });
    }

    /// Queue a terminal decline
    pub fn queue_terminal(&self, reason: &str) {
        self.script.lock().push_back(TransferOutcome::Terminal {
            reason: reason.to_string(),
        });
    }

    /// Every request seen so far
    pub fn calls(&self) -> Vec<TransferRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait::async_trait]
impl PaymentProvider for MockProvider {
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferOutcome> {
        self.calls.lock().push(request.clone());
        let outcome = self.script.lock().pop_front().unwrap_or_else(|| {
            TransferOutcome::Success {
                provider_ref: format!("mock_{}", self.sequence.fetch_add(1, Ordering::Relaxed)),
            }
        });
        Ok(outcome)
    }
}
