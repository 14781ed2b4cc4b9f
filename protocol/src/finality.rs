//! # Finality
//!
//! The notary is the single point that orders transactions. It keeps the
//! ledger's unconsumed records: issued records enter it through
//! [`Notary::record_issuance`], committed outputs replace the inputs they
//! consumed. A transaction is committed only when every input it names is
//! unconsumed ledger state with exactly the content the transaction claims.
//! Only a [`FullySignedTransaction`] can be submitted, so signature coverage
//! is settled before the notary is involved.
//!
//! ## Outcomes
//!
//! - **Committed**: the transaction is final, its inputs are spent and its
//!   outputs are ledger state.
//! - **Rejected**: double spend, unknown or altered input, replay, or
//!   outside its time window. Nothing changes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::ledger::{Record, RecordAndRef, RecordRef};
use crate::signatures::FullySignedTransaction;
use crate::transaction::SignedTransaction;

/// Result of a finality submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalityOutcome {
    /// The transaction is final.
    Committed(SignedTransaction),
    /// The transaction was refused and has no effect.
    Rejected { reason: String },
}

impl FinalityOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

/// A finality service and the ledger state it guards.
#[async_trait]
pub trait Notary: Send + Sync {
    /// Commit or reject `tx`. Never partially applies.
    async fn submit(&self, tx: FullySignedTransaction) -> FinalityOutcome;

    /// The unconsumed record at `reference`, if the ledger holds one.
    fn unconsumed(&self, reference: &RecordRef) -> Option<Record>;

    /// The committed transaction with id `tx_id`, if there is one.
    fn committed(&self, tx_id: &str) -> Option<SignedTransaction>;

    /// Admit a freshly issued record as unconsumed ledger state.
    fn record_issuance(&self, item: &RecordAndRef);
}

#[derive(Debug, Default)]
struct NotaryLedger {
    /// Spent reference to the id of the transaction that spent it.
    spent: HashMap<RecordRef, String>,
    unconsumed: HashMap<RecordRef, Record>,
    committed: HashMap<String, SignedTransaction>,
}

/// Notary keeping the ledger in memory.
#[derive(Debug, Default)]
pub struct InMemoryNotary {
    ledger: Mutex<NotaryLedger>,
}

impl InMemoryNotary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous core of [`Notary::submit`], evaluated at `now`.
    pub fn submit_at(&self, tx: FullySignedTransaction, now: DateTime<Utc>) -> FinalityOutcome {
        let id = tx.id().to_string();
        let mut ledger = self.ledger.lock();

        if ledger.committed.contains_key(&id) {
            return reject(&id, format!("transaction {} already committed", id));
        }

        if let Some(window) = tx.tx().time_window {
            if !window.contains(now) {
                return reject(
                    &id,
                    format!(
                        "outside time window [{}, {}) at {}",
                        window.from_ms,
                        window.until_ms,
                        now.timestamp_millis()
                    ),
                );
            }
        }

        for input in &tx.tx().inputs {
            if let Some(spender) = ledger.spent.get(&input.reference) {
                let reason = format!(
                    "double spend: input {} already spent by {}",
                    input.reference, spender
                );
                return reject(&id, reason);
            }
            match ledger.unconsumed.get(&input.reference) {
                None => {
                    return reject(
                        &id,
                        format!("unknown input {}: never issued or committed", input.reference),
                    )
                }
                Some(held) if *held != input.record => {
                    return reject(
                        &id,
                        format!("input {} does not match ledger state", input.reference),
                    )
                }
                Some(_) => {}
            }
        }

        for reference in tx.tx().input_refs() {
            ledger.unconsumed.remove(&reference);
            ledger.spent.insert(reference, id.clone());
        }
        for output in tx.tx().output_refs() {
            ledger.unconsumed.insert(output.reference, output.record);
        }
        let signed = tx.into_signed();
        ledger.committed.insert(id.clone(), signed.clone());
        drop(ledger);

        info!(tx_id = %id, "transaction notarised");
        FinalityOutcome::Committed(signed)
    }

    pub fn is_spent(&self, reference: &RecordRef) -> bool {
        self.ledger.lock().spent.contains_key(reference)
    }

    pub fn committed_count(&self) -> usize {
        self.ledger.lock().committed.len()
    }
}

fn reject(tx_id: &str, reason: String) -> FinalityOutcome {
    warn!(tx_id, %reason, "transaction rejected by notary");
    FinalityOutcome::Rejected { reason }
}

#[async_trait]
impl Notary for InMemoryNotary {
    async fn submit(&self, tx: FullySignedTransaction) -> FinalityOutcome {
        self.submit_at(tx, Utc::now())
    }

    fn unconsumed(&self, reference: &RecordRef) -> Option<Record> {
        self.ledger.lock().unconsumed.get(reference).cloned()
    }

    fn committed(&self, tx_id: &str) -> Option<SignedTransaction> {
        self.ledger.lock().committed.get(tx_id).cloned()
    }

    fn record_issuance(&self, item: &RecordAndRef) {
        debug!(reference = %item.reference, kind = %item.record.kind(), "issued record admitted");
        self.ledger
            .lock()
            .unconsumed
            .insert(item.reference.clone(), item.record.clone());
    }
}
