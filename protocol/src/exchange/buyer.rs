//! Buyer side of an exchange session.
//!
//! ```text
//! Idle ─start─▶ AwaitingOffer ─receive_offer─▶ Resolving ─resolve─▶ BuildingTransaction
//!  │                                                                     │ build
//!  │ draft_order                                                         ▼
//!  └──────────────────────────────────────────────────────────▶ LocalVerification
//!                                                                        │ verify_local, sign
//!                                                                        ▼
//!      Committed ◀─finalize── AwaitingFinality ◀─proposal_sent──── Signed
//!
//! any non-terminal state ─abort─▶ Aborted
//! ```
//!
//! A sale starts with `start` and the seller's offer. An order issuance
//! starts with `draft_order`: no offer, no payment, just the purchase order
//! under an `Issue` command, after which the two paths share verification,
//! signing and finality.

use serde::Serialize;
use tracing::{debug, warn};

use super::error::ExchangeError;
use super::messages::{SaleRequest, SessionId};
use crate::config::CouponStrategy;
use crate::coupon::{self, discounted_price, CouponResolution};
use crate::crypto::PartyKeypair;
use crate::identity::{KeyRegistry, PartyId};
use crate::ledger::{PurchaseOrder, RecordAndRef};
use crate::signatures::SignatureCollector;
use crate::tokens::TokenService;
use crate::transaction::{
    sign_transaction, verify, CommandKind, SignedTransaction, TimeWindow, Transaction,
    TransactionBuilder,
};

/// Where a buyer session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BuyerState {
    Idle,
    AwaitingOffer,
    Resolving,
    BuildingTransaction,
    LocalVerification,
    Signed,
    AwaitingFinality,
    Committed,
    Aborted,
}

impl BuyerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }
}

/// State machine for one purchase from one seller.
#[derive(Debug)]
pub struct BuyerSession {
    session_id: SessionId,
    buyer: PartyId,
    seller: PartyId,
    strategy: CouponStrategy,
    state: BuyerState,
    offer: Option<SaleRequest>,
    resolution: Option<CouponResolution>,
    draft: Option<Transaction>,
    verified: bool,
    proposal: Option<SignedTransaction>,
    finalized: Option<SignedTransaction>,
}

impl BuyerSession {
    pub fn new(
        session_id: SessionId,
        buyer: PartyId,
        seller: PartyId,
        strategy: CouponStrategy,
    ) -> Self {
        Self {
            session_id,
            buyer,
            seller,
            strategy,
            state: BuyerState::Idle,
            offer: None,
            resolution: None,
            draft: None,
            verified: false,
            proposal: None,
            finalized: None,
        }
    }

    pub fn state(&self) -> BuyerState {
        self.state
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn seller(&self) -> PartyId {
        self.seller
    }

    pub fn offer(&self) -> Option<&SaleRequest> {
        self.offer.as_ref()
    }

    pub fn resolution(&self) -> Option<&CouponResolution> {
        self.resolution.as_ref()
    }

    pub fn draft(&self) -> Option<&Transaction> {
        self.draft.as_ref()
    }

    pub fn proposal(&self) -> Option<&SignedTransaction> {
        self.proposal.as_ref()
    }

    pub fn finalized(&self) -> Option<&SignedTransaction> {
        self.finalized.as_ref()
    }

    pub fn start(&mut self) -> Result<(), ExchangeError> {
        self.require_state(BuyerState::Idle, "start")?;
        self.transition(BuyerState::AwaitingOffer);
        Ok(())
    }

    pub fn receive_offer(&mut self, offer: SaleRequest) -> Result<(), ExchangeError> {
        self.require_state(BuyerState::AwaitingOffer, "SaleRequest")?;
        debug!(
            session_id = %self.session_id,
            item_id = %offer.item_id,
            price = offer.price,
            currency = %offer.currency,
            "offer received"
        );
        self.offer = Some(offer);
        self.transition(BuyerState::Resolving);
        Ok(())
    }

    /// Pick the coupon to redeem among `candidates`, the coupons the buyer
    /// holds from this seller, and fix the price to pay.
    pub fn resolve(
        &mut self,
        candidates: &[RecordAndRef],
    ) -> Result<&CouponResolution, ExchangeError> {
        self.require_state(BuyerState::Resolving, "resolve")?;
        let offer = self.offer_or_invalid("resolve")?;

        let resolution = match self.strategy {
            CouponStrategy::Resolve => coupon::resolve(candidates, &offer.item_id, offer.price)?,
            CouponStrategy::RedeemAnyFromSeller => {
                let seller = self.seller;
                let first = candidates.iter().find(|c| {
                    c.record
                        .as_coupon()
                        .is_some_and(|coupon| coupon.issuer == seller)
                });
                match first {
                    Some(item) => CouponResolution {
                        effective_price: item
                            .record
                            .as_coupon()
                            .map(|c| discounted_price(offer.price, c.discount_percent))
                            .unwrap_or(offer.price),
                        redeemed: Some(item.clone()),
                    },
                    None => CouponResolution {
                        effective_price: offer.price,
                        redeemed: None,
                    },
                }
            }
        };

        self.transition(BuyerState::BuildingTransaction);
        Ok(self.resolution.insert(resolution))
    }

    /// Assemble the purchase proposal: payment inputs covering the
    /// effective price plus the redeemed coupon; change and payment outputs
    /// from the token service plus the new purchase order.
    pub fn build(
        &mut self,
        tokens: &dyn TokenService,
        window: TimeWindow,
    ) -> Result<&Transaction, ExchangeError> {
        self.require_state(BuyerState::BuildingTransaction, "build")?;
        let offer = self.offer_or_invalid("build")?;
        let resolution = self
            .resolution
            .clone()
            .ok_or_else(|| self.invalid("build before resolve"))?;

        let movement =
            tokens.generate_move(&self.seller, &offer.currency, resolution.effective_price)?;

        let tx = TransactionBuilder::new()
            .inputs(movement.inputs)
            .inputs(resolution.redeemed)
            .outputs(movement.outputs)
            .output(PurchaseOrder::new(self.seller, self.buyer, offer.item_id))
            .command(CommandKind::Purchase, [self.seller, self.buyer])
            .time_window(window)
            .build();

        debug!(
            session_id = %self.session_id,
            tx_id = %tx.id,
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            "proposal built"
        );
        self.transition(BuyerState::LocalVerification);
        Ok(self.draft.insert(tx))
    }

    /// Draft the issuance of a purchase order for `item_id` with no inputs
    /// and no payment, to be countersigned by the seller.
    pub fn draft_order(
        &mut self,
        item_id: &str,
        window: TimeWindow,
    ) -> Result<&Transaction, ExchangeError> {
        self.require_state(BuyerState::Idle, "draft_order")?;
        if item_id.is_empty() {
            return Err(ExchangeError::InvalidOffer("item id must not be empty".into()));
        }

        let tx = TransactionBuilder::new()
            .output(PurchaseOrder::new(self.seller, self.buyer, item_id))
            .command(CommandKind::Issue, [self.seller, self.buyer])
            .time_window(window)
            .build();

        debug!(session_id = %self.session_id, tx_id = %tx.id, item_id, "order drafted");
        self.transition(BuyerState::LocalVerification);
        Ok(self.draft.insert(tx))
    }

    /// Run the contract over the draft. Nothing is signed unless this passes.
    pub fn verify_local(&mut self) -> Result<(), ExchangeError> {
        self.require_state(BuyerState::LocalVerification, "verify_local")?;
        let draft = self
            .draft
            .as_ref()
            .ok_or_else(|| self.invalid("verify before build"))?;
        verify(draft)?;
        self.verified = true;
        Ok(())
    }

    pub fn sign(&mut self, keypair: &PartyKeypair) -> Result<SignedTransaction, ExchangeError> {
        self.require_state(BuyerState::LocalVerification, "sign")?;
        if !self.verified {
            return Err(self.invalid("sign before verify_local"));
        }
        let draft = self
            .draft
            .clone()
            .ok_or_else(|| self.invalid("sign before build"))?;
        let mut proposal = SignedTransaction::unsigned(draft);
        sign_transaction(&mut proposal, keypair);
        self.proposal = Some(proposal.clone());
        self.transition(BuyerState::Signed);
        Ok(proposal)
    }

    pub fn proposal_sent(&mut self) -> Result<(), ExchangeError> {
        self.require_state(BuyerState::Signed, "proposal_sent")?;
        self.transition(BuyerState::AwaitingFinality);
        Ok(())
    }

    /// Accept the seller's finalized transaction once it is the proposal
    /// the buyer signed and carries every required signature.
    pub fn finalize(
        &mut self,
        finalized: &SignedTransaction,
        registry: &dyn KeyRegistry,
    ) -> Result<(), ExchangeError> {
        self.require_state(BuyerState::AwaitingFinality, "Finalized")?;
        let proposed_id = self
            .proposal
            .as_ref()
            .map(|p| p.id().to_string())
            .ok_or_else(|| self.invalid("Finalized before proposal"))?;
        if finalized.id() != proposed_id {
            return Err(ExchangeError::OfferMismatch(format!(
                "finalized transaction {} is not the proposal {}",
                finalized.id(),
                proposed_id
            )));
        }
        SignatureCollector::new(registry).collect_signed(finalized)?;

        self.finalized = Some(finalized.clone());
        self.transition(BuyerState::Committed);
        Ok(())
    }

    /// Move to `Aborted`. Terminal states are left as they are.
    pub fn abort(&mut self, reason: &str) {
        if self.state.is_terminal() {
            return;
        }
        warn!(session_id = %self.session_id, state = ?self.state, reason, "buyer session aborted");
        self.transition(BuyerState::Aborted);
    }

    fn offer_or_invalid(&self, event: &str) -> Result<SaleRequest, ExchangeError> {
        self.offer.clone().ok_or_else(|| self.invalid(event))
    }

    fn require_state(&self, expected: BuyerState, event: &str) -> Result<(), ExchangeError> {
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

    fn transition(&mut self, next: BuyerState) {
        debug!(session_id = %self.session_id, from = ?self.state, to = ?next, "buyer state transition");
        self.state = next;
    }
}
