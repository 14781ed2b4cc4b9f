//! Transaction signing with Ed25519 keypairs.
//!
//! Every party signs the same 32-byte digest ([`Transaction::digest`]), so
//! signatures from different parties can be gathered in any order. A
//! [`SignatureSet`] only ever grows: an entry, once present, is never
//! replaced.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::builder::Transaction;
use crate::crypto::{PartyKeypair, PartySignature};
use crate::identity::PartyId;

/// Signatures keyed by the party that produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSet {
    entries: BTreeMap<PartyId, PartySignature>,
}

impl SignatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `signature` for `party`. Returns `false` and leaves the set
    /// untouched when the party already has an entry.
    pub fn insert(&mut self, party: PartyId, signature: PartySignature) -> bool {
        if self.entries.contains_key(&party) {
            return false;
        }
        self.entries.insert(party, signature);
        true
    }

    /// Merge every entry of `other` that this set lacks.
    pub fn absorb(&mut self, other: &SignatureSet) {
        for (party, signature) in &other.entries {
            self.insert(*party, signature.clone());
        }
    }

    pub fn get(&self, party: &PartyId) -> Option<&PartySignature> {
        self.entries.get(party)
    }

    pub fn signers(&self) -> BTreeSet<PartyId> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A transaction travelling with the signatures gathered so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub signatures: SignatureSet,
}

impl SignedTransaction {
    pub fn unsigned(tx: Transaction) -> Self {
        Self {
            tx,
            signatures: SignatureSet::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.tx.id
    }

    pub fn is_signed_by(&self, party: &PartyId) -> bool {
        self.signatures.get(party).is_some()
    }
}

/// Sign `stx` with `keypair` and record the signature under the keypair's
/// party id. Signing twice with the same key is a no-op.
pub fn sign_transaction<'a>(
    stx: &'a mut SignedTransaction,
    keypair: &PartyKeypair,
) -> &'a SignedTransaction {
    let signer = PartyId::from_public_key(&keypair.public_key());
    let signature = keypair.sign(&stx.tx.digest());
    stx.signatures.insert(signer, signature);
    stx
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
