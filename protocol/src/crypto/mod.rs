//! # Cryptographic Primitives
//!
//! Thin, type-safe wrappers over audited implementations:
//!
//! - **Ed25519** for party signatures over transaction digests.
//! - **SHA-256** (doubled) for transaction ids.
//! - **BLAKE3** for party identifiers and record-reference ids.

pub mod hash;
pub mod keys;

pub use hash::{blake3_hash, double_sha256, sha256};
pub use keys::{KeyError, PartyKeypair, PartyPublicKey, PartySignature};
