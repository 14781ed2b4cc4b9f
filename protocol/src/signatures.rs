//! # Signature Collection
//!
//! Turns a transaction plus whatever signatures have been gathered into a
//! [`FullySignedTransaction`], the only form the notary accepts. Coverage
//! is checked against the command's required signers; a signature that is
//! present but does not verify counts the same as an absent one.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::identity::{KeyRegistry, PartyId};
use crate::transaction::{SignatureSet, SignedTransaction, Transaction};

/// Errors from signature collection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// Required parties without a valid signature.
    #[error("missing signatures from {}", display_parties(.0))]
    MissingSigners(BTreeSet<PartyId>),

    /// The transaction's id does not match its contents.
    #[error("transaction id {claimed} does not match its contents ({actual})")]
    DigestMismatch { claimed: String, actual: String },
}

fn display_parties(parties: &BTreeSet<PartyId>) -> String {
    parties
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A transaction carrying a valid signature from every required signer.
///
/// Constructed only by [`SignatureCollector::collect`]; fields are read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FullySignedTransaction {
    tx: Transaction,
    signatures: SignatureSet,
}

impl FullySignedTransaction {
    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn signatures(&self) -> &SignatureSet {
        &self.signatures
    }

    pub fn id(&self) -> &str {
        &self.tx.id
    }

    pub fn into_signed(self) -> SignedTransaction {
        SignedTransaction {
            tx: self.tx,
            signatures: self.signatures,
        }
    }
}

impl fmt::Display for FullySignedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} signatures)", self.tx.id, self.signatures.len())
    }
}

/// Checks signature coverage against a key registry.
pub struct SignatureCollector<'a> {
    registry: &'a dyn KeyRegistry,
}

impl<'a> SignatureCollector<'a> {
    pub fn new(registry: &'a dyn KeyRegistry) -> Self {
        Self { registry }
    }

    /// Verify that every party in `required` has validly signed `tx`.
    ///
    /// A signature is valid when the registry knows the party's key, the key
    /// hashes to that party's id, and the signature verifies over the
    /// transaction digest. All missing parties are reported together.
    pub fn collect(
        &self,
        tx: &Transaction,
        required: &BTreeSet<PartyId>,
        available: &SignatureSet,
    ) -> Result<FullySignedTransaction, SignatureError> {
        let actual = tx.compute_id();
        if tx.id != actual {
            return Err(SignatureError::DigestMismatch {
                claimed: tx.id.clone(),
                actual,
            });
        }

        let digest = tx.digest();
        let missing: BTreeSet<PartyId> = required
            .iter()
            .filter(|party| !self.has_valid_signature(party, &digest, available))
            .copied()
            .collect();

        if !missing.is_empty() {
            warn!(tx_id = %tx.id, missing = missing.len(), "signature coverage incomplete");
            return Err(SignatureError::MissingSigners(missing));
        }

        debug!(tx_id = %tx.id, signers = required.len(), "all required signatures present");
        Ok(FullySignedTransaction {
            tx: tx.clone(),
            signatures: available.clone(),
        })
    }

    /// Shorthand for collecting over a [`SignedTransaction`] against the
    /// signers its commands require.
    pub fn collect_signed(
        &self,
        stx: &SignedTransaction,
    ) -> Result<FullySignedTransaction, SignatureError> {
        self.collect(&stx.tx, &stx.tx.required_signers(), &stx.signatures)
    }

    fn has_valid_signature(
        &self,
        party: &PartyId,
        digest: &[u8; 32],
        available: &SignatureSet,
    ) -> bool {
        let Some(signature) = available.get(party) else {
            return false;
        };
        let Some(public_key) = self.registry.public_key_of(party) else {
            return false;
        };
        party.is_owned_by(&public_key) && public_key.verify(digest, signature)
    }
}
