//! Vendora Store - Repository layer for the settlement engine
//!
//! One async-trait repository per entity, all implemented by a single
//! `MemoryStore` so cross-table operations commit under one write lock.
//!
//! # Invariants
//!
//! 1. Every mutation re-validates its preconditions under the write lock
//!    before touching any table: full success or full rollback
//! 2. Monetary fields are rejected once a transaction is approved
//! 3. The payout uniqueness key and the unpaid re-check live here, not in
//!    application-level read-then-write code

pub mod filter;
pub mod memory;
pub mod traits;

pub use filter::*;
pub use memory::*;
pub use traits::*;
