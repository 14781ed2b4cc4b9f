//! # Transaction Module
//!
//! Construction, signing, and contract verification of ledger transactions.
//! A transaction consumes input records, produces output records, and
//! carries commands naming who must sign.
//!
//! ```text
//! types.rs        — CommandKind, Command, TimeWindow
//! builder.rs      — Transaction and the fluent TransactionBuilder
//! signing.rs      — SignatureSet, SignedTransaction, sign_transaction
//! verification.rs — purchase-order contract rules (verify)
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build**: the buyer assembles the proposal with [`TransactionBuilder`].
//! 2. **Verify**: both parties run [`verify`] independently.
//! 3. **Sign**: each party adds its entry with [`sign_transaction`].
//! 4. **Collect**: the signature collector checks coverage of the required
//!    signers before the notary sees it.
//!
//! The id is `double_sha256` of the canonical encoding and does not cover
//! signatures, so signing never changes what is being signed.

pub mod builder;
pub mod signing;
pub mod types;
pub mod verification;

pub use builder::{Transaction, TransactionBuilder};
pub use signing::{sign_transaction, SignatureSet, SignedTransaction};
pub use types::{Command, CommandKind, TimeWindow};
pub use verification::{verify, Violation};
