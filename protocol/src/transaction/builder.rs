//! Transaction construction via the builder pattern.
//!
//! The [`TransactionBuilder`] collects inputs, outputs, commands and an
//! optional time window, then `.build()` returns an unsigned
//! [`Transaction`] whose id is derived from exactly those contents.
//!
//! The builder does not sign; that happens in [`super::signing`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::types::{Command, CommandKind, TimeWindow};
use crate::crypto::double_sha256;
use crate::identity::PartyId;
use crate::ledger::{Coupon, FungiblePayment, PurchaseOrder, Record, RecordAndRef, RecordRef};

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A proposed or final ledger transaction.
///
/// Inputs are carried together with the records they reference so that
/// contract verification needs no vault lookups.
///
/// # Canonical Byte Format
///
/// [`Transaction::signable_bytes`] serializes, in order: input count and
/// each input's reference and record, output count and each output, command
/// count and each command, then a presence flag and the time window bounds.
/// `id` and signatures are excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// `hex(double_sha256(signable_bytes))`.
    pub id: String,
    pub inputs: Vec<RecordAndRef>,
    pub outputs: Vec<Record>,
    pub commands: Vec<Command>,
    pub time_window: Option<TimeWindow>,
}

impl Transaction {
    /// Canonical byte representation hashed into the id.
    ///
    /// Hand-rolled rather than serde-based so the digest cannot drift with
    /// serializer field ordering.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(512);

        buf.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            input.reference.write_canonical(&mut buf);
            input.record.write_canonical(&mut buf);
        }

        buf.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            output.write_canonical(&mut buf);
        }

        buf.extend_from_slice(&(self.commands.len() as u32).to_le_bytes());
        for command in &self.commands {
            command.write_canonical(&mut buf);
        }

        match self.time_window {
            Some(window) => {
                buf.push(0x01);
                buf.extend_from_slice(&window.from_ms.to_le_bytes());
                buf.extend_from_slice(&window.until_ms.to_le_bytes());
            }
            None => buf.push(0x00),
        }

        buf
    }

    /// The 32-byte digest every party signs.
    pub fn digest(&self) -> [u8; 32] {
        double_sha256(&self.signable_bytes())
    }

    /// Recompute the id from the current contents.
    pub fn compute_id(&self) -> String {
        hex::encode(self.digest())
    }

    /// Whether `id` still matches the contents.
    pub fn id_is_consistent(&self) -> bool {
        self.id == self.compute_id()
    }

    /// Reference under which output `index` will be stored once final.
    pub fn output_ref(&self, index: usize) -> RecordRef {
        RecordRef::new(self.id.clone(), index as u32)
    }

    /// Outputs paired with their future references.
    pub fn output_refs(&self) -> impl Iterator<Item = RecordAndRef> + '_ {
        self.outputs
            .iter()
            .enumerate()
            .map(|(i, record)| RecordAndRef::new(self.output_ref(i), record.clone()))
    }

    pub fn input_refs(&self) -> Vec<RecordRef> {
        self.inputs.iter().map(|i| i.reference.clone()).collect()
    }

    pub fn purchase_order_outputs(&self) -> Vec<&PurchaseOrder> {
        self.outputs
            .iter()
            .filter_map(Record::as_purchase_order)
            .collect()
    }

    pub fn coupon_inputs(&self) -> Vec<&Coupon> {
        self.inputs
            .iter()
            .filter_map(|i| i.record.as_coupon())
            .collect()
    }

    pub fn payment_outputs(&self) -> impl Iterator<Item = &FungiblePayment> {
        self.outputs.iter().filter_map(Record::as_payment)
    }

    /// Total `currency` paid to `holder` across outputs.
    pub fn paid_to(&self, holder: &PartyId, currency: &str) -> u64 {
        self.payment_outputs()
            .filter(|p| p.holder == *holder && p.currency == currency)
            .fold(0u64, |acc, p| acc.saturating_add(p.quantity))
    }

    /// Union of every command's required signers.
    pub fn required_signers(&self) -> BTreeSet<PartyId> {
        self.commands
            .iter()
            .flat_map(|c| c.required_signers.iter().copied())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for unsigned [`Transaction`]s.
///
/// ```
/// use bazaar_protocol::crypto::PartyKeypair;
/// use bazaar_protocol::identity::PartyId;
/// use bazaar_protocol::ledger::PurchaseOrder;
/// use bazaar_protocol::transaction::{CommandKind, TransactionBuilder};
///
/// let seller = PartyId::from_public_key(&PartyKeypair::generate().public_key());
/// let buyer = PartyId::from_public_key(&PartyKeypair::generate().public_key());
///
/// let tx = TransactionBuilder::new()
///     .output(PurchaseOrder::new(seller, buyer, "item123"))
///     .command(CommandKind::Issue, [seller, buyer])
///     .build();
/// assert!(tx.id_is_consistent());
/// ```
#[derive(Debug, Default)]
pub struct TransactionBuilder {
    inputs: Vec<RecordAndRef>,
    outputs: Vec<Record>,
    commands: Vec<Command>,
    time_window: Option<TimeWindow>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, input: RecordAndRef) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn inputs(mut self, inputs: impl IntoIterator<Item = RecordAndRef>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn output(mut self, output: impl Into<Record>) -> Self {
        self.outputs.push(output.into());
        self
    }

    pub fn outputs(mut self, outputs: impl IntoIterator<Item = Record>) -> Self {
        self.outputs.extend(outputs);
        self
    }

    pub fn command(
        mut self,
        kind: CommandKind,
        signers: impl IntoIterator<Item = PartyId>,
    ) -> Self {
        self.commands.push(Command::new(kind, signers));
        self
    }

    pub fn time_window(mut self, window: TimeWindow) -> Self {
        self.time_window = Some(window);
        self
    }

    /// Consume the builder and produce a transaction with its id set.
    pub fn build(self) -> Transaction {
        let mut tx = Transaction {
            id: String::new(),
            inputs: self.inputs,
            outputs: self.outputs,
            commands: self.commands,
            time_window: self.time_window,
        };
        tx.id = tx.compute_id();
        tx
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PartyKeypair;
    use crate::ledger::RecordRef;

    fn party() -> PartyId {
        PartyId::from_public_key(&PartyKeypair::generate().public_key())
    }

    fn cash(holder: PartyId, issuer: PartyId, quantity: u64) -> RecordAndRef {
        RecordAndRef::new(
            RecordRef::new("issuance", 0),
            FungiblePayment {
                issuer,
                holder,
                currency: "JPY".into(),
                quantity,
            },
        )
    }

    #[test]
    fn build_sets_consistent_id() {
        let (seller, buyer, bank) = (party(), party(), party());
        let tx = TransactionBuilder::new()
            .input(cash(buyer, bank, 2000))
            .output(PurchaseOrder::new(seller, buyer, "item123"))
            .command(CommandKind::Purchase, [seller, buyer])
            .build();
        assert_eq!(tx.id.len(), 64);
        assert!(tx.id_is_consistent());
    }

    #[test]
    fn id_changes_with_content() {
        let (seller, buyer) = (party(), party());
        let a = TransactionBuilder::new()
            .output(PurchaseOrder::new(seller, buyer, "item123"))
            .build();
        let b = TransactionBuilder::new()
            .output(PurchaseOrder::new(seller, buyer, "item124"))
            .build();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn tampering_breaks_id_consistency() {
        let (seller, buyer) = (party(), party());
        let mut tx = TransactionBuilder::new()
            .output(PurchaseOrder::new(seller, buyer, "item123"))
            .build();
        tx.outputs.push(Record::from(PurchaseOrder::new(seller, buyer, "extra")));
        assert!(!tx.id_is_consistent());
    }

    #[test]
    fn paid_to_filters_holder_and_currency() {
        let (seller, buyer, bank) = (party(), party(), party());
        let tx = TransactionBuilder::new()
            .output(FungiblePayment {
                issuer: bank,
                holder: seller,
                currency: "JPY".into(),
                quantity: 500,
            })
            .output(FungiblePayment {
                issuer: bank,
                holder: seller,
                currency: "USD".into(),
                quantity: 7,
            })
            .output(FungiblePayment {
                issuer: bank,
                holder: buyer,
                currency: "JPY".into(),
                quantity: 1500,
            })
            .build();
        assert_eq!(tx.paid_to(&seller, "JPY"), 500);
        assert_eq!(tx.paid_to(&buyer, "JPY"), 1500);
        assert_eq!(tx.paid_to(&seller, "EUR"), 0);
    }

    #[test]
    fn output_refs_use_tx_id_and_position() {
        let (seller, buyer) = (party(), party());
        let tx = TransactionBuilder::new()
            .output(PurchaseOrder::new(seller, buyer, "a"))
            .output(PurchaseOrder::new(seller, buyer, "b"))
            .build();
        let refs: Vec<_> = tx.output_refs().map(|r| r.reference).collect();
        assert_eq!(refs[0], RecordRef::new(tx.id.clone(), 0));
        assert_eq!(refs[1], RecordRef::new(tx.id.clone(), 1));
    }
}
