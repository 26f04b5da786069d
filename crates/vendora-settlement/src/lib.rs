//! Vendora Settlement - Payout processing and provider transfers
//!
//! The processor drives a `Payout` through approval, transfer, retry with
//! exponential backoff, and terminal outcomes. The payment provider sits
//! behind the [`PaymentProvider`] trait; transfers carry an idempotency key
//! derived from the payout id so a retried call never double-transfers.
//!
//! # Invariants
//!
//! 1. A payout in `Processing` stays there until a definitive provider
//!    outcome arrives or the retry budget is exhausted
//! 2. Failure is a state plus an operator-visible reason, never a lost
//!    payout
//! 3. Cancellation is illegal from `Processing` and `Completed`

pub mod processor;
pub mod provider;

pub use processor::*;
pub use provider::*;
