//! Purchase-order contract verification.
//!
//! [`verify`] is a pure function of the transaction: no clock, no vault, no
//! network. Buyer and seller run it independently on the same bytes and
//! must reach the same verdict.
//!
//! Checks run from cheapest to most specific and the first failure wins:
//!
//! 1. **Command count**: exactly one command.
//! 2. **Command kind**: `Issue` or `Purchase`.
//! 3. **Shape**: input/output structure for that command.
//! 4. **Content**: the purchase order names two distinct parties and an item.
//! 5. **Signers**: the command demands signatures from both participants.

use thiserror::Error;

use super::builder::Transaction;
use super::types::{Command, CommandKind};
use crate::ledger::{PurchaseOrder, RecordKind};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why a transaction breaks the purchase-order contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// Wrong number of commands, inputs, or purchase-order outputs.
    #[error("shape violation: {reason}")]
    Shape { reason: String },

    /// The purchase order itself is malformed.
    #[error("content violation: {reason}")]
    Content { reason: String },

    /// The command does not demand the right signatures.
    #[error("signer violation: {reason}")]
    Signer { reason: String },

    /// The command belongs to another contract.
    #[error("command not supported: {command}")]
    UnsupportedCommand { command: CommandKind },
}

impl Violation {
    fn shape(reason: impl Into<String>) -> Self {
        Self::Shape {
            reason: reason.into(),
        }
    }

    fn content(reason: impl Into<String>) -> Self {
        Self::Content {
            reason: reason.into(),
        }
    }

    fn signer(reason: impl Into<String>) -> Self {
        Self::Signer {
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Check `tx` against the purchase-order contract.
///
/// Signers beyond the purchase order's participants are accepted; only
/// missing participants are a violation.
pub fn verify(tx: &Transaction) -> Result<(), Violation> {
    let command = single_command(tx)?;

    let order = match command.kind {
        CommandKind::Issue => verify_issue_shape(tx)?,
        CommandKind::Purchase => verify_purchase_shape(tx)?,
        other => return Err(Violation::UnsupportedCommand { command: other }),
    };

    verify_content(order)?;
    verify_signers(command, order)
}

fn single_command(tx: &Transaction) -> Result<&Command, Violation> {
    match tx.commands.as_slice() {
        [command] => Ok(command),
        [] => Err(Violation::shape("transaction carries no command")),
        many => Err(Violation::shape(format!(
            "only one command is allowed, found {}",
            many.len()
        ))),
    }
}

fn verify_issue_shape(tx: &Transaction) -> Result<&PurchaseOrder, Violation> {
    let consumed_orders = tx
        .inputs
        .iter()
        .filter(|i| i.record.kind() == RecordKind::PurchaseOrder)
        .count();
    if consumed_orders != 0 {
        return Err(Violation::shape(
            "issuing a purchase order must not consume an existing one",
        ));
    }
    exactly_one_order(tx)
}

fn verify_purchase_shape(tx: &Transaction) -> Result<&PurchaseOrder, Violation> {
    if tx.inputs.is_empty() {
        return Err(Violation::shape("a purchase must consume at least one input"));
    }
    exactly_one_order(tx)
}

fn exactly_one_order(tx: &Transaction) -> Result<&PurchaseOrder, Violation> {
    match tx.purchase_order_outputs().as_slice() {
        [order] => Ok(*order),
        orders => Err(Violation::shape(format!(
            "exactly one purchase order output is required, found {}",
            orders.len()
        ))),
    }
}

fn verify_content(order: &PurchaseOrder) -> Result<(), Violation> {
    if order.seller == order.buyer {
        return Err(Violation::content("seller and buyer cannot be the same party"));
    }
    if order.item_id.is_empty() {
        return Err(Violation::content("item id must not be empty"));
    }
    Ok(())
}

fn verify_signers(command: &Command, order: &PurchaseOrder) -> Result<(), Violation> {
    let expected = order.participants();
    let required = &command.required_signers;

    if required.len() < expected.len() {
        return Err(Violation::signer(format!(
            "requires exactly {} signers, command names {}",
            expected.len(),
            required.len()
        )));
    }
    if let Some(missing) = expected.iter().find(|p| !required.contains(*p)) {
        return Err(Violation::signer(format!(
            "participant {} is not a required signer",
            missing
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PartyKeypair;
    use crate::identity::PartyId;
    use crate::ledger::{Coupon, FungiblePayment, RecordAndRef, RecordRef};
    use crate::transaction::TransactionBuilder;

    struct Parties {
        seller: PartyId,
        buyer: PartyId,
        bank: PartyId,
    }

    fn parties() -> Parties {
        let id = || PartyId::from_public_key(&PartyKeypair::generate().public_key());
        Parties {
            seller: id(),
            buyer: id(),
            bank: id(),
        }
    }

    fn cash_input(p: &Parties, quantity: u64) -> RecordAndRef {
        RecordAndRef::new(
            RecordRef::new("cash", 0),
            FungiblePayment {
                issuer: p.bank,
                holder: p.buyer,
                currency: "JPY".into(),
                quantity,
            },
        )
    }

    fn order(p: &Parties) -> PurchaseOrder {
        PurchaseOrder::new(p.seller, p.buyer, "item123")
    }

    fn purchase(p: &Parties) -> TransactionBuilder {
        TransactionBuilder::new()
            .input(cash_input(p, 700))
            .output(FungiblePayment {
                issuer: p.bank,
                holder: p.seller,
                currency: "JPY".into(),
                quantity: 700,
            })
            .output(order(p))
    }

    #[test]
    fn valid_purchase_passes() {
        let p = parties();
        let tx = purchase(&p)
            .command(CommandKind::Purchase, [p.seller, p.buyer])
            .build();
        assert_eq!(verify(&tx), Ok(()));
    }

    #[test]
    fn valid_issue_passes() {
        let p = parties();
        let tx = TransactionBuilder::new()
            .output(order(&p))
            .command(CommandKind::Issue, [p.seller, p.buyer])
            .build();
        assert_eq!(verify(&tx), Ok(()));
    }

    #[test]
    fn two_commands_fail_shape() {
        let p = parties();
        let tx = purchase(&p)
            .command(CommandKind::Purchase, [p.seller, p.buyer])
            .command(CommandKind::Purchase, [p.seller, p.buyer])
            .build();
        assert!(matches!(verify(&tx), Err(Violation::Shape { .. })));
    }

    #[test]
    fn missing_command_fails_shape() {
        let p = parties();
        let tx = purchase(&p).build();
        assert!(matches!(verify(&tx), Err(Violation::Shape { .. })));
    }

    #[test]
    fn move_command_is_unsupported() {
        let p = parties();
        let tx = purchase(&p)
            .command(CommandKind::Move, [p.seller, p.buyer])
            .build();
        match verify(&tx) {
            Err(Violation::UnsupportedCommand { command }) => {
                assert_eq!(command, CommandKind::Move)
            }
            other => panic!("expected UnsupportedCommand, got {:?}", other),
        }
    }

    #[test]
    fn issue_consuming_an_order_fails_shape() {
        let p = parties();
        let tx = TransactionBuilder::new()
            .input(RecordAndRef::new(RecordRef::new("old", 0), order(&p)))
            .output(order(&p))
            .command(CommandKind::Issue, [p.seller, p.buyer])
            .build();
        assert!(matches!(verify(&tx), Err(Violation::Shape { .. })));
    }

    #[test]
    fn purchase_without_inputs_fails_shape() {
        let p = parties();
        let tx = TransactionBuilder::new()
            .output(order(&p))
            .command(CommandKind::Purchase, [p.seller, p.buyer])
            .build();
        assert!(matches!(verify(&tx), Err(Violation::Shape { .. })));
    }

    #[test]
    fn zero_or_two_order_outputs_fail_shape() {
        let p = parties();
        let none = TransactionBuilder::new()
            .input(cash_input(&p, 10))
            .command(CommandKind::Purchase, [p.seller, p.buyer])
            .build();
        assert!(matches!(verify(&none), Err(Violation::Shape { .. })));

        let two = purchase(&p)
            .output(order(&p))
            .command(CommandKind::Purchase, [p.seller, p.buyer])
            .build();
        assert!(matches!(verify(&two), Err(Violation::Shape { .. })));
    }

    #[test]
    fn selling_to_self_fails_content() {
        let p = parties();
        let tx = TransactionBuilder::new()
            .input(cash_input(&p, 10))
            .output(PurchaseOrder::new(p.seller, p.seller, "item123"))
            .command(CommandKind::Purchase, [p.seller])
            .build();
        assert!(matches!(verify(&tx), Err(Violation::Content { .. })));
    }

    #[test]
    fn empty_item_fails_content() {
        let p = parties();
        let tx = TransactionBuilder::new()
            .input(cash_input(&p, 10))
            .output(PurchaseOrder::new(p.seller, p.buyer, ""))
            .command(CommandKind::Purchase, [p.seller, p.buyer])
            .build();
        assert!(matches!(verify(&tx), Err(Violation::Content { .. })));
    }

    #[test]
    fn too_few_signers_fails_signer_check() {
        let p = parties();
        let tx = purchase(&p)
            .command(CommandKind::Purchase, [p.buyer])
            .build();
        match verify(&tx) {
            Err(Violation::Signer { reason }) => assert!(reason.contains("requires exactly 2")),
            other => panic!("expected Signer, got {:?}", other),
        }
    }

    #[test]
    fn enough_signers_but_wrong_party_fails_signer_check() {
        let p = parties();
        let tx = purchase(&p)
            .command(CommandKind::Purchase, [p.buyer, p.bank])
            .build();
        assert!(matches!(verify(&tx), Err(Violation::Signer { .. })));
    }

    #[test]
    fn extra_signers_are_accepted() {
        let p = parties();
        let tx = purchase(&p)
            .command(CommandKind::Purchase, [p.seller, p.buyer, p.bank])
            .build();
        assert_eq!(verify(&tx), Ok(()));
    }

    #[test]
    fn coupon_inputs_do_not_affect_contract_shape() {
        let p = parties();
        let coupon = Coupon::new(p.seller, p.buyer, "item123", 10).unwrap();
        let tx = purchase(&p)
            .input(RecordAndRef::new(RecordRef::new("coupon", 0), coupon))
            .command(CommandKind::Purchase, [p.seller, p.buyer])
            .build();
        assert_eq!(verify(&tx), Ok(()));
    }

    #[test]
    fn verdict_is_deterministic() {
        let p = parties();
        let tx = purchase(&p)
            .command(CommandKind::Purchase, [p.buyer])
            .build();
        assert_eq!(verify(&tx), verify(&tx.clone()));
    }
}
