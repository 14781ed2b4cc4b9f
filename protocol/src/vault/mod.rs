//! # Vault Module — Per-Party Record Store
//!
//! Each party keeps its own vault: the unconsumed records it participates
//! in. The exchange protocol reads coupons and payments from it while
//! building a proposal and writes the final transaction into it once the
//! notary commits.
//!
//! ```text
//! store.rs    — Vault trait and the in-memory implementation
//! snapshot.rs — serialisable summary of a vault's contents
//! ```
//!
//! All amounts are `u64` in the currency's smallest unit.

pub mod snapshot;
pub mod store;

pub use snapshot::VaultSnapshot;
pub use store::{InMemoryVault, Vault, VaultError};
