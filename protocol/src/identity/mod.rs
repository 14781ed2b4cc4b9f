//! # Identity Module
//!
//! Parties are identified by a [`PartyId`]: the BLAKE3 hash of their
//! Ed25519 public key, shown as a Bech32 address with the `bzr` prefix.
//! Two parties are the same party exactly when their ids are equal, which
//! is the notion of identity the transaction verifier relies on when it
//! compares sellers, buyers, and required signers.
//!
//! Resolving an id back to a verification key is the job of a
//! [`KeyRegistry`]. Registries are ordinary values passed to whoever needs
//! them; there is no process-wide directory.

pub mod party;
pub mod registry;

pub use party::{PartyId, PartyIdError};
pub use registry::{InMemoryKeyRegistry, KeyRegistry};
