//! Seller side of an exchange session.
//!
//! ```text
//! Idle ──open──▶ OfferSent ──offer_delivered──▶ AwaitingCounterSignature
//!  │                                                ▲  │ check_proposal
//!  └──────────────await_order───────────────────────┘  │ countersign
//!                                                      ▼
//!                           Committed ◀──commit── Finalizing
//!
//! any non-terminal state ──abort──▶ Aborted
//! ```
//!
//! A sale session offers an item at a price and expects a `Purchase`. An
//! order session, opened with [`SellerSession::order`], offers nothing and
//! expects the buyer to propose issuing a purchase order under `Issue`.
//!
//! The session never trusts the buyer's copy of anything: every input is
//! resolved against the notary's ledger, and the effective price is
//! recomputed from the seller's own offer and the redeemed coupon.

use serde::Serialize;
use tracing::{debug, warn};

use super::error::ExchangeError;
use super::messages::{SaleRequest, SessionId};
use crate::config::MAX_DISCOUNT_PERCENT;
use crate::coupon::{discounted_price, CouponError};
use crate::crypto::PartyKeypair;
use crate::finality::Notary;
use crate::identity::PartyId;
use crate::ledger::{Record, RecordAndRef};
use crate::transaction::{sign_transaction, verify, CommandKind, SignedTransaction, Transaction};

/// Where a seller session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SellerState {
    Idle,
    OfferSent,
    AwaitingCounterSignature,
    Finalizing,
    Committed,
    Aborted,
}

impl SellerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }
}

/// State machine for one sale, or one order issuance, with one buyer.
#[derive(Debug)]
pub struct SellerSession {
    session_id: SessionId,
    seller: PartyId,
    buyer: PartyId,
    offer: SaleRequest,
    /// `Purchase` for a sale, `Issue` for an order issuance.
    kind: CommandKind,
    state: SellerState,
    /// Proposal that passed [`SellerSession::check_proposal`].
    accepted: Option<SignedTransaction>,
    submitted: bool,
    finalized: Option<SignedTransaction>,
}

impl SellerSession {
    pub fn new(
        session_id: SessionId,
        seller: PartyId,
        buyer: PartyId,
        item_id: impl Into<String>,
        price: u64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            session_id,
            seller,
            buyer,
            offer: SaleRequest {
                item_id: item_id.into(),
                price,
                currency: currency.into(),
            },
            kind: CommandKind::Purchase,
            state: SellerState::Idle,
            accepted: None,
            submitted: false,
            finalized: None,
        }
    }

    /// A session that countersigns the issuance of a purchase order for
    /// `item_id`. Nothing is paid and nothing is consumed.
    pub fn order(
        session_id: SessionId,
        seller: PartyId,
        buyer: PartyId,
        item_id: impl Into<String>,
    ) -> Self {
        Self {
            kind: CommandKind::Issue,
            ..Self::new(session_id, seller, buyer, item_id, 0, String::new())
        }
    }

    pub fn state(&self) -> SellerState {
        self.state
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn offer(&self) -> &SaleRequest {
        &self.offer
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn finalized(&self) -> Option<&SignedTransaction> {
        self.finalized.as_ref()
    }

    /// Validate the offer and produce the message that opens the session.
    pub fn open(&mut self) -> Result<SaleRequest, ExchangeError> {
        self.require_state(SellerState::Idle, "open")?;
        if self.kind != CommandKind::Purchase {
            return Err(self.invalid("open"));
        }
        if self.offer.item_id.is_empty() {
            return Err(ExchangeError::InvalidOffer("item id must not be empty".into()));
        }
        if self.offer.price == 0 {
            return Err(ExchangeError::InvalidOffer(
                "price must be greater than zero".into(),
            ));
        }
        self.transition(SellerState::OfferSent);
        Ok(self.offer.clone())
    }

    pub fn offer_delivered(&mut self) -> Result<(), ExchangeError> {
        self.require_state(SellerState::OfferSent, "offer_delivered")?;
        self.transition(SellerState::AwaitingCounterSignature);
        Ok(())
    }

    /// Start waiting for the buyer's order proposal. Order sessions only.
    pub fn await_order(&mut self) -> Result<(), ExchangeError> {
        self.require_state(SellerState::Idle, "await_order")?;
        if self.kind != CommandKind::Issue {
            return Err(self.invalid("await_order"));
        }
        if self.offer.item_id.is_empty() {
            return Err(ExchangeError::InvalidOffer("item id must not be empty".into()));
        }
        self.transition(SellerState::AwaitingCounterSignature);
        Ok(())
    }

    /// Run every check the seller owes before countersigning.
    ///
    /// In order: contract verification, the command is the one this session
    /// expects, the purchase order describes this deal, and then per kind.
    /// An issuance must consume nothing and produce only the order. A
    /// purchase must spend only unconsumed ledger records the buyer holds,
    /// at most one coupon, which is the seller's own, names the offered
    /// item and carries an in-range discount, and must pay the seller
    /// exactly the price it computes itself. Returns that price.
    pub fn check_proposal(
        &mut self,
        proposal: &SignedTransaction,
        ledger: &dyn Notary,
    ) -> Result<u64, ExchangeError> {
        self.require_state(SellerState::AwaitingCounterSignature, "check_proposal")?;
        let tx = &proposal.tx;

        verify(tx)?;

        // verify() guarantees exactly one command and one purchase order.
        if let Some(command) = tx.commands.first() {
            if command.kind != self.kind {
                return Err(ExchangeError::OfferMismatch(format!(
                    "proposal carries a {} command, session expects {}",
                    command.kind, self.kind
                )));
            }
        }
        let orders = tx.purchase_order_outputs();
        let order = orders.first().ok_or_else(|| {
            ExchangeError::OfferMismatch("proposal carries no purchase order".into())
        })?;
        if order.seller != self.seller {
            return Err(ExchangeError::OfferMismatch(format!(
                "purchase order names seller {}",
                order.seller
            )));
        }
        if order.buyer != self.buyer {
            return Err(ExchangeError::OfferMismatch(format!(
                "purchase order names buyer {}, session is with {}",
                order.buyer, self.buyer
            )));
        }
        if order.item_id != self.offer.item_id {
            return Err(ExchangeError::OfferMismatch(format!(
                "purchase order is for item ({}), offer was for ({})",
                order.item_id, self.offer.item_id
            )));
        }

        let expected = match self.kind {
            CommandKind::Issue => self.check_issuance(tx)?,
            _ => self.check_purchase(tx, ledger)?,
        };

        debug!(
            session_id = %self.session_id,
            tx_id = %tx.id,
            expected,
            "proposal accepted"
        );
        self.accepted = Some(proposal.clone());
        Ok(expected)
    }

    fn check_issuance(&self, tx: &Transaction) -> Result<u64, ExchangeError> {
        if let Some(input) = tx.inputs.first() {
            return Err(rejected(input, "issuing an order must not consume anything"));
        }
        if tx.outputs.len() != 1 {
            return Err(ExchangeError::OfferMismatch(format!(
                "order issuance must produce only the order, found {} outputs",
                tx.outputs.len()
            )));
        }
        Ok(0)
    }

    fn check_purchase(&self, tx: &Transaction, ledger: &dyn Notary) -> Result<u64, ExchangeError> {
        for input in &tx.inputs {
            match ledger.unconsumed(&input.reference) {
                Some(held) if held == input.record => {}
                Some(_) => return Err(rejected(input, "content differs from ledger state")),
                None => return Err(rejected(input, "not unconsumed ledger state")),
            }
            match &input.record {
                Record::Payment(payment) if payment.holder != self.buyer => {
                    return Err(rejected(
                        input,
                        format!("payment held by {}, not by the buyer", payment.holder),
                    ))
                }
                Record::PurchaseOrder(_) => {
                    return Err(rejected(input, "a purchase must not consume a purchase order"))
                }
                _ => {}
            }
        }

        let expected = match tx.coupon_inputs().as_slice() {
            [] => self.offer.price,
            [coupon] => {
                if coupon.item_id != self.offer.item_id {
                    return Err(ExchangeError::CouponMismatch {
                        reason: format!(
                            "coupon for item ({}) cannot be used for purchase of item ({})",
                            coupon.item_id, self.offer.item_id
                        ),
                    });
                }
                if coupon.issuer != self.seller {
                    return Err(ExchangeError::CouponMismatch {
                        reason: format!("coupon issued by {}, not by this seller", coupon.issuer),
                    });
                }
                if coupon.holder != self.buyer {
                    return Err(ExchangeError::CouponMismatch {
                        reason: format!("coupon held by {}, not by the buyer", coupon.holder),
                    });
                }
                if coupon.discount_percent >= MAX_DISCOUNT_PERCENT {
                    return Err(ExchangeError::CouponMismatch {
                        reason: format!(
                            "discount {}% is not below {}%",
                            coupon.discount_percent, MAX_DISCOUNT_PERCENT
                        ),
                    });
                }
                discounted_price(self.offer.price, coupon.discount_percent)
            }
            many => {
                return Err(CouponError::Ambiguous {
                    item_id: self.offer.item_id.clone(),
                    matches: many.len(),
                }
                .into())
            }
        };

        let paid = tx.paid_to(&self.seller, &self.offer.currency);
        if paid != expected {
            return Err(ExchangeError::AmountMismatch { expected, paid });
        }
        Ok(expected)
    }

    /// Add the seller's signature to the accepted proposal.
    pub fn countersign(&mut self, keypair: &PartyKeypair) -> Result<SignedTransaction, ExchangeError> {
        self.require_state(SellerState::AwaitingCounterSignature, "countersign")?;
        let mut signed = self
            .accepted
            .take()
            .ok_or_else(|| self.invalid("countersign before check_proposal"))?;
        sign_transaction(&mut signed, keypair);
        self.accepted = Some(signed.clone());
        self.transition(SellerState::Finalizing);
        Ok(signed)
    }

    /// Claim the single finality submission this session is allowed.
    pub fn mark_submitted(&mut self) -> Result<(), ExchangeError> {
        self.require_state(SellerState::Finalizing, "mark_submitted")?;
        if self.submitted {
            return Err(self.invalid("second finality submission"));
        }
        self.submitted = true;
        Ok(())
    }

    pub fn commit(&mut self, finalized: SignedTransaction) -> Result<(), ExchangeError> {
        self.require_state(SellerState::Finalizing, "commit")?;
        if !self.submitted {
            return Err(self.invalid("commit before submission"));
        }
        self.finalized = Some(finalized);
        self.transition(SellerState::Committed);
        Ok(())
    }

    /// Move to `Aborted`. Terminal states are left as they are.
    pub fn abort(&mut self, reason: &str) {
        if self.state.is_terminal() {
            return;
        }
        warn!(session_id = %self.session_id, state = ?self.state, reason, "seller session aborted");
        self.transition(SellerState::Aborted);
    }

    fn require_state(&self, expected: SellerState, event: &str) -> Result<(), ExchangeError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.invalid(event))
        }
    }

    fn invalid(&self, event: &str) -> ExchangeError {
        ExchangeError::InvalidState {
            current_state: format!("{:?}", self.state),
            event: event.to_string(),
        }
    }

    fn transition(&mut self, next: SellerState) {
        debug!(session_id = %self.session_id, from = ?self.state, to = ?next, "seller state transition");
        self.state = next;
    }
}

fn rejected(input: &RecordAndRef, reason: impl Into<String>) -> ExchangeError {
    ExchangeError::InputRejected {
        reference: input.reference.to_string(),
        reason: reason.into(),
    }
}
