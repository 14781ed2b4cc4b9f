//! Payment selection and move generation.
//!
//! Selection is greedy in vault reference order, so the same vault contents
//! always produce the same proposal. Outputs are aggregated per issuer:
//! change back to the holder first, then payments to the recipient.

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::identity::PartyId;
use crate::ledger::{FungiblePayment, Record, RecordAndRef};
use crate::transaction::{CommandKind, Transaction, TransactionBuilder};
use crate::vault::Vault;

/// Errors from the token layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The holder's payments in the currency do not cover the amount.
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    /// A standalone move of nothing was requested.
    #[error("cannot move a zero amount")]
    ZeroAmount,
}

/// Inputs and outputs that move `amount` from the holder to a recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveProposal {
    pub inputs: Vec<RecordAndRef>,
    pub outputs: Vec<Record>,
}

impl MoveProposal {
    pub fn input_total(&self) -> u64 {
        self.inputs
            .iter()
            .filter_map(|i| i.record.as_payment())
            .fold(0u64, |acc, p| acc.saturating_add(p.quantity))
    }
}

/// The token layer as seen from one holder.
pub trait TokenService: Send + Sync {
    /// Plan a payment of `amount` in `currency` to `recipient`. A zero
    /// amount yields an empty proposal.
    fn generate_move(
        &self,
        recipient: &PartyId,
        currency: &str,
        amount: u64,
    ) -> Result<MoveProposal, TokenError>;
}

/// Token service drawing on a single holder's vault.
#[derive(Clone)]
pub struct LocalTokenService {
    vault: Arc<dyn Vault>,
}

impl LocalTokenService {
    pub fn new(vault: Arc<dyn Vault>) -> Self {
        Self { vault }
    }

    /// Build an unsigned standalone transfer carrying a `Move` command that
    /// only the holder must sign.
    pub fn move_transaction(
        &self,
        recipient: &PartyId,
        currency: &str,
        amount: u64,
    ) -> Result<Transaction, TokenError> {
        if amount == 0 {
            return Err(TokenError::ZeroAmount);
        }
        let proposal = self.generate_move(recipient, currency, amount)?;
        Ok(TransactionBuilder::new()
            .inputs(proposal.inputs)
            .outputs(proposal.outputs)
            .command(CommandKind::Move, [self.vault.owner()])
            .build())
    }
}

impl TokenService for LocalTokenService {
    fn generate_move(
        &self,
        recipient: &PartyId,
        currency: &str,
        amount: u64,
    ) -> Result<MoveProposal, TokenError> {
        if amount == 0 {
            return Ok(MoveProposal::default());
        }

        let holder = self.vault.owner();
        let available = self.vault.query(&|r| {
            r.record
                .as_payment()
                .is_some_and(|p| p.holder == holder && p.currency == currency)
        });

        let mut selected = Vec::new();
        let mut total = 0u64;
        for item in available.iter() {
            if total >= amount {
                break;
            }
            if let Some(p) = item.record.as_payment() {
                total = total.saturating_add(p.quantity);
                selected.push(item.clone());
            }
        }

        if total < amount {
            return Err(TokenError::InsufficientFunds {
                required: amount,
                available: total,
            });
        }

        let mut to_recipient: BTreeMap<PartyId, u64> = BTreeMap::new();
        let mut change: BTreeMap<PartyId, u64> = BTreeMap::new();
        let mut remaining = amount;
        for p in selected.iter().filter_map(|i| i.record.as_payment()) {
            let paid = p.quantity.min(remaining);
            remaining -= paid;
            *to_recipient.entry(p.issuer).or_insert(0) += paid;
            *change.entry(p.issuer).or_insert(0) += p.quantity - paid;
        }

        let payment = |issuer: PartyId, holder: PartyId, quantity: u64| {
            Record::Payment(FungiblePayment {
                issuer,
                holder,
                currency: currency.to_string(),
                quantity,
            })
        };
        let outputs = change
            .into_iter()
            .filter(|(_, q)| *q > 0)
            .map(|(issuer, q)| payment(issuer, holder, q))
            .chain(
                to_recipient
                    .into_iter()
                    .filter(|(_, q)| *q > 0)
                    .map(|(issuer, q)| payment(issuer, *recipient, q)),
            )
            .collect();

        debug!(
            holder = %holder,
            recipient = %recipient,
            currency,
            amount,
            inputs = selected.len(),
            change = total - amount,
            "payment move generated"
        );

        Ok(MoveProposal {
            inputs: selected,
            outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PartyKeypair;
    use crate::finality::InMemoryNotary;
    use crate::tokens::issue_cash;
    use crate::transaction::verify;
    use crate::transaction::Violation;
    use crate::vault::InMemoryVault;

    fn party() -> PartyId {
        PartyId::from_public_key(&PartyKeypair::generate().public_key())
    }

    fn funded(owner: PartyId, bank: PartyId, amounts: &[u64]) -> Arc<InMemoryVault> {
        let vault = Arc::new(InMemoryVault::new(owner));
        let notary = InMemoryNotary::new();
        for amount in amounts {
            issue_cash(vault.as_ref(), &notary, bank, "JPY", *amount);
        }
        vault
    }

    fn quantities_for(outputs: &[Record], holder: PartyId) -> u64 {
        outputs
            .iter()
            .filter_map(Record::as_payment)
            .filter(|p| p.holder == holder)
            .map(|p| p.quantity)
            .sum()
    }

    #[test]
    fn exact_amount_needs_no_change() {
        let (buyer, shop, bank) = (party(), party(), party());
        let tokens = LocalTokenService::new(funded(buyer, bank, &[700]));

        let proposal = tokens.generate_move(&shop, "JPY", 700).unwrap();
        assert_eq!(proposal.inputs.len(), 1);
        assert_eq!(proposal.outputs.len(), 1);
        assert_eq!(quantities_for(&proposal.outputs, shop), 700);
    }

    #[test]
    fn overpayment_returns_change_first() {
        let (buyer, shop, bank) = (party(), party(), party());
        let tokens = LocalTokenService::new(funded(buyer, bank, &[2000]));

        let proposal = tokens.generate_move(&shop, "JPY", 700).unwrap();
        assert_eq!(proposal.input_total(), 2000);
        assert_eq!(
            proposal.outputs[0].as_payment().map(|p| (p.holder, p.quantity)),
            Some((buyer, 1300))
        );
        assert_eq!(quantities_for(&proposal.outputs, shop), 700);
    }

    #[test]
    fn several_inputs_are_combined() {
        let (buyer, shop, bank) = (party(), party(), party());
        let tokens = LocalTokenService::new(funded(buyer, bank, &[300, 300, 300]));

        let proposal = tokens.generate_move(&shop, "JPY", 700).unwrap();
        assert_eq!(proposal.inputs.len(), 3);
        assert_eq!(quantities_for(&proposal.outputs, buyer), 200);
        assert_eq!(quantities_for(&proposal.outputs, shop), 700);
    }

    #[test]
    fn payments_keep_their_issuer() {
        let (buyer, shop, bank_a, bank_b) = (party(), party(), party(), party());
        let vault = Arc::new(InMemoryVault::new(buyer));
        let notary = InMemoryNotary::new();
        issue_cash(vault.as_ref(), &notary, bank_a, "JPY", 400);
        issue_cash(vault.as_ref(), &notary, bank_b, "JPY", 400);
        let tokens = LocalTokenService::new(vault);

        let proposal = tokens.generate_move(&shop, "JPY", 800).unwrap();
        let issuers: Vec<_> = proposal
            .outputs
            .iter()
            .filter_map(Record::as_payment)
            .map(|p| p.issuer)
            .collect();
        assert_eq!(issuers.len(), 2);
        assert!(issuers.contains(&bank_a) && issuers.contains(&bank_b));
    }

    #[test]
    fn insufficient_funds_reports_shortfall() {
        let (buyer, shop, bank) = (party(), party(), party());
        let tokens = LocalTokenService::new(funded(buyer, bank, &[2000]));

        assert_eq!(
            tokens.generate_move(&shop, "JPY", 5000),
            Err(TokenError::InsufficientFunds {
                required: 5000,
                available: 2000
            })
        );
        assert!(matches!(
            tokens.generate_move(&shop, "USD", 1),
            Err(TokenError::InsufficientFunds { available: 0, .. })
        ));
    }

    #[test]
    fn zero_amount_is_an_empty_move() {
        let (buyer, shop) = (party(), party());
        let tokens = LocalTokenService::new(Arc::new(InMemoryVault::new(buyer)));
        assert_eq!(
            tokens.generate_move(&shop, "JPY", 0),
            Ok(MoveProposal::default())
        );
        assert_eq!(
            tokens.move_transaction(&shop, "JPY", 0),
            Err(TokenError::ZeroAmount)
        );
    }

    #[test]
    fn standalone_move_is_not_a_purchase() {
        let (holder, recipient, bank) = (party(), party(), party());
        let tokens = LocalTokenService::new(funded(holder, bank, &[100]));

        let tx = tokens.move_transaction(&recipient, "JPY", 40).unwrap();
        assert_eq!(tx.commands[0].kind, CommandKind::Move);
        assert_eq!(tx.paid_to(&recipient, "JPY"), 40);
        assert_eq!(tx.paid_to(&holder, "JPY"), 60);
        assert!(matches!(
            verify(&tx),
            Err(Violation::UnsupportedCommand { .. })
        ));
    }
}
