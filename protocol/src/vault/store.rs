//! The [`Vault`] trait and its in-memory implementation.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

use super::snapshot::VaultSnapshot;
use crate::identity::PartyId;
use crate::ledger::{Record, RecordAndRef, RecordRef};
use crate::transaction::Transaction;

/// Errors from vault operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// A reference to consume is not stored (never seen, or already spent).
    #[error("unknown or already consumed record {0}")]
    UnknownRecord(RecordRef),
}

/// A party's store of unconsumed records.
pub trait Vault: Send + Sync {
    /// The party this vault belongs to.
    fn owner(&self) -> PartyId;

    /// Store a record. Re-inserting an existing reference replaces it.
    fn put(&self, item: RecordAndRef);

    /// Every stored record matching `predicate`, in reference order.
    fn query(&self, predicate: &dyn Fn(&RecordAndRef) -> bool) -> Vec<RecordAndRef>;

    /// Remove all of `refs`, or none of them if any is missing.
    fn consume(&self, refs: &[RecordRef]) -> Result<(), VaultError>;

    /// Atomically drop whichever of `spent` are stored and add `produced`.
    fn apply(&self, spent: &[RecordRef], produced: Vec<RecordAndRef>);

    fn contains(&self, reference: &RecordRef) -> bool;

    /// Fold a final transaction into this vault: spend the inputs held
    /// here and keep the outputs the owner participates in. Returns the
    /// number of outputs kept.
    fn record_transaction(&self, tx: &Transaction) -> usize {
        let owner = self.owner();
        let produced: Vec<RecordAndRef> = tx
            .output_refs()
            .filter(|o| o.record.participants().contains(&owner))
            .collect();
        let kept = produced.len();
        self.apply(&tx.input_refs(), produced);
        debug!(owner = %owner, tx_id = %tx.id, kept, "transaction recorded");
        kept
    }

    /// Sum of the owner's payments in `currency`.
    fn payment_balance(&self, currency: &str) -> u64 {
        let owner = self.owner();
        self.query(&|r| {
            r.record
                .as_payment()
                .is_some_and(|p| p.holder == owner && p.currency == currency)
        })
        .iter()
        .filter_map(|r| r.record.as_payment())
        .fold(0u64, |acc, p| acc.saturating_add(p.quantity))
    }

    fn purchase_orders(&self) -> Vec<RecordAndRef> {
        self.query(&|r| matches!(r.record, Record::PurchaseOrder(_)))
    }

    /// Coupons held by the owner and issued by `issuer`.
    fn coupons_from(&self, issuer: &PartyId) -> Vec<RecordAndRef> {
        let owner = self.owner();
        self.query(&|r| {
            r.record
                .as_coupon()
                .is_some_and(|c| c.issuer == *issuer && c.holder == owner)
        })
    }

    fn snapshot(&self) -> VaultSnapshot {
        VaultSnapshot::collect(self.owner(), &self.query(&|_| true))
    }
}

/// Vault held in process memory behind a read-write lock.
#[derive(Debug)]
pub struct InMemoryVault {
    owner: PartyId,
    records: RwLock<BTreeMap<RecordRef, Record>>,
}

impl InMemoryVault {
    pub fn new(owner: PartyId) -> Self {
        Self {
            owner,
            records: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Vault for InMemoryVault {
    fn owner(&self) -> PartyId {
        self.owner
    }

    fn put(&self, item: RecordAndRef) {
        self.records.write().insert(item.reference, item.record);
    }

    fn query(&self, predicate: &dyn Fn(&RecordAndRef) -> bool) -> Vec<RecordAndRef> {
        self.records
            .read()
            .iter()
            .map(|(reference, record)| RecordAndRef::new(reference.clone(), record.clone()))
            .filter(|item| predicate(item))
            .collect()
    }

    fn consume(&self, refs: &[RecordRef]) -> Result<(), VaultError> {
        let mut records = self.records.write();
        if let Some(missing) = refs.iter().find(|r| !records.contains_key(*r)) {
            return Err(VaultError::UnknownRecord(missing.clone()));
        }
        for reference in refs {
            records.remove(reference);
        }
        Ok(())
    }

    fn apply(&self, spent: &[RecordRef], produced: Vec<RecordAndRef>) {
        let mut records = self.records.write();
        for reference in spent {
            records.remove(reference);
        }
        for item in produced {
            records.insert(item.reference, item.record);
        }
    }

    fn contains(&self, reference: &RecordRef) -> bool {
        self.records.read().contains_key(reference)
    }
}
