//! Vendora Types - Canonical domain types for commission settlement
//!
//! This crate contains all foundational types for Vendora with zero
//! dependencies on other vendora crates. It defines the complete type system
//! for:
//!
//! - Identity types (TenantId, VendorId, PayoutId, etc.)
//! - Currency codes and minor-unit money
//! - Commission rules (percentage, fixed, tiered)
//! - Commission transactions and their state machine
//! - Payouts and payout-transaction links
//!
//! # Architectural Invariants
//!
//! These types support the core Vendora settlement invariants:
//!
//! 1. Money is never double-paid: a transaction links to at most one
//!    active payout
//! 2. Money is never silently lost: every sale resolves to a rule or
//!    fails loudly
//! 3. Monetary fields freeze once a transaction is approved
//! 4. Reversals are new rows, never edits

pub mod currency;
pub mod error;
pub mod identity;
pub mod money;
pub mod payout;
pub mod rule;
pub mod transaction;

pub use currency::*;
pub use error::*;
pub use identity::*;
pub use money::*;
pub use payout::*;
pub use rule::*;
pub use transaction::*;

/// Version of the Vendora types schema
pub const TYPES_VERSION: &str = "0.1.0";
