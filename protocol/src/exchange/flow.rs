//! Async drivers running one session per call.
//!
//! [`sell`] and [`buy`] run a sale; [`accept_order`] and [`request_order`]
//! run a payment-free order issuance. Each pushes a [`SellerSession`] or
//! [`BuyerSession`] through its states, suspending at every transport
//! receive. Each receive is bounded by the party's configured timeout.
//! Whatever goes wrong before finality aborts the local session and, unless
//! the counterparty already knows, sends it an explicit `Abort`.

use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::buyer::BuyerSession;
use super::error::ExchangeError;
use super::messages::{ExchangeMessage, SessionId};
use super::seller::SellerSession;
use super::transport::SessionTransport;
use crate::config::ExchangeConfig;
use crate::crypto::PartyKeypair;
use crate::finality::{FinalityOutcome, Notary};
use crate::identity::{KeyRegistry, PartyId};
use crate::signatures::SignatureCollector;
use crate::tokens::TokenService;
use crate::transaction::{SignedTransaction, TimeWindow};
use crate::vault::Vault;

/// The collaborators one party brings to its sessions.
#[derive(Clone)]
pub struct PartyServices {
    pub keypair: Arc<PartyKeypair>,
    pub vault: Arc<dyn Vault>,
    pub tokens: Arc<dyn TokenService>,
    pub registry: Arc<dyn KeyRegistry>,
    pub notary: Arc<dyn Notary>,
    pub transport: Arc<dyn SessionTransport>,
    pub config: ExchangeConfig,
}

impl PartyServices {
    pub fn party(&self) -> PartyId {
        PartyId::from_public_key(&self.keypair.public_key())
    }
}

impl fmt::Debug for PartyServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartyServices")
            .field("party", &self.party())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A committed exchange as seen by one party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOutcome {
    pub session_id: SessionId,
    pub transaction: SignedTransaction,
}

// ---------------------------------------------------------------------------
// Seller
// ---------------------------------------------------------------------------

/// Offer `item_id` at `price` to `buyer` and drive the session to finality.
///
/// On success the committed transaction is already recorded in the
/// seller's vault.
pub async fn sell(
    services: &PartyServices,
    session_id: SessionId,
    buyer: PartyId,
    item_id: &str,
    price: u64,
) -> Result<ExchangeOutcome, ExchangeError> {
    let mut session = SellerSession::new(
        session_id,
        services.party(),
        buyer,
        item_id,
        price,
        services.config.currency.clone(),
    );
    info!(session_id = %session_id, buyer = %buyer, item_id, price, "sale session started");

    let result = run_sale(services, &mut session).await;
    close_seller(services, &mut session, result).await
}

/// Countersign `buyer`'s issuance of a purchase order for `item_id` and
/// drive it to finality. No payment changes hands.
pub async fn accept_order(
    services: &PartyServices,
    session_id: SessionId,
    buyer: PartyId,
    item_id: &str,
) -> Result<ExchangeOutcome, ExchangeError> {
    let mut session = SellerSession::order(session_id, services.party(), buyer, item_id);
    info!(session_id = %session_id, buyer = %buyer, item_id, "order session started");

    let result = match session.await_order() {
        Ok(()) => settle_as_seller(services, &mut session).await,
        Err(err) => Err(err),
    };
    close_seller(services, &mut session, result).await
}

async fn run_sale(
    services: &PartyServices,
    session: &mut SellerSession,
) -> Result<ExchangeOutcome, ExchangeError> {
    let offer = session.open()?;
    services
        .transport
        .send(session.session_id(), ExchangeMessage::SaleRequest(offer))
        .await?;
    session.offer_delivered()?;
    settle_as_seller(services, session).await
}

/// Receive the proposal, check it, countersign and submit it once.
async fn settle_as_seller(
    services: &PartyServices,
    session: &mut SellerSession,
) -> Result<ExchangeOutcome, ExchangeError> {
    let session_id = session.session_id();
    let transport = services.transport.as_ref();

    let proposal = match receive(services, session_id, "proposal").await? {
        ExchangeMessage::Proposal(stx) => stx,
        other => return Err(unexpected(session.state(), other)),
    };
    session.check_proposal(&proposal, services.notary.as_ref())?;

    let countersigned = session.countersign(&services.keypair)?;
    let full = SignatureCollector::new(services.registry.as_ref()).collect_signed(&countersigned)?;

    session.mark_submitted()?;
    match services.notary.submit(full).await {
        FinalityOutcome::Committed(finalized) => {
            services.vault.record_transaction(&finalized.tx);
            if let Err(err) = transport
                .send(session_id, ExchangeMessage::Finalized(finalized.clone()))
                .await
            {
                warn!(session_id = %session_id, error = %err, "could not deliver finalized transaction");
            }
            session.commit(finalized.clone())?;
            info!(session_id = %session_id, tx_id = %finalized.id(), kind = %session.kind(), "seller committed");
            Ok(ExchangeOutcome {
                session_id,
                transaction: finalized,
            })
        }
        FinalityOutcome::Rejected { reason } => {
            if let Err(err) = transport
                .send(
                    session_id,
                    ExchangeMessage::FinalityRejected {
                        reason: reason.clone(),
                    },
                )
                .await
            {
                warn!(session_id = %session_id, error = %err, "could not deliver finality rejection");
            }
            Err(ExchangeError::NotarizationRejected(reason))
        }
    }
}

async fn close_seller(
    services: &PartyServices,
    session: &mut SellerSession,
    result: Result<ExchangeOutcome, ExchangeError>,
) -> Result<ExchangeOutcome, ExchangeError> {
    let session_id = session.session_id();
    if let Err(err) = &result {
        session.abort(&err.to_string());
        notify_abort(services, session_id, err).await;
    }
    services.transport.close(session_id);
    result
}

// ---------------------------------------------------------------------------
// Buyer
// ---------------------------------------------------------------------------

/// Wait for the counterparty's offer on `session_id` and buy it.
///
/// On success the committed transaction is already recorded in the
/// buyer's vault.
pub async fn buy(
    services: &PartyServices,
    session_id: SessionId,
) -> Result<ExchangeOutcome, ExchangeError> {
    let mut session = buyer_session(services, session_id)?;
    info!(session_id = %session_id, seller = %session.seller(), "purchase session started");

    let result = run_purchase(services, &mut session).await;
    close_buyer(services, &mut session, result).await
}

/// Propose issuing a purchase order for `item_id` to the counterparty on
/// `session_id` and drive it to finality.
pub async fn request_order(
    services: &PartyServices,
    session_id: SessionId,
    item_id: &str,
) -> Result<ExchangeOutcome, ExchangeError> {
    let mut session = buyer_session(services, session_id)?;
    info!(session_id = %session_id, seller = %session.seller(), item_id, "order request started");

    let window = TimeWindow::from_now(services.config.time_window);
    let drafted = session.draft_order(item_id, window).map(|_| ());
    let result = match drafted {
        Ok(()) => settle_as_buyer(services, &mut session).await,
        Err(err) => Err(err),
    };
    close_buyer(services, &mut session, result).await
}

fn buyer_session(
    services: &PartyServices,
    session_id: SessionId,
) -> Result<BuyerSession, ExchangeError> {
    let seller = services.transport.counterparty(session_id)?;
    Ok(BuyerSession::new(
        session_id,
        services.party(),
        seller,
        services.config.coupon_strategy,
    ))
}

async fn run_purchase(
    services: &PartyServices,
    session: &mut BuyerSession,
) -> Result<ExchangeOutcome, ExchangeError> {
    session.start()?;
    let offer = match receive(services, session.session_id(), "sale request").await? {
        ExchangeMessage::SaleRequest(offer) => offer,
        other => return Err(unexpected(session.state(), other)),
    };
    session.receive_offer(offer)?;

    session.resolve(&services.vault.coupons_from(&session.seller()))?;
    session.build(
        services.tokens.as_ref(),
        TimeWindow::from_now(services.config.time_window),
    )?;
    settle_as_buyer(services, session).await
}

/// Verify and sign the draft, send it, and wait for the seller's verdict.
///
/// A seller that falls silent after the proposal went out may still have
/// submitted it. The buyer then waits out the proposal's time window, after
/// which the notary can no longer commit it, and takes the notary's record
/// as final: committed means the purchase stands, anything else is the
/// original timeout.
async fn settle_as_buyer(
    services: &PartyServices,
    session: &mut BuyerSession,
) -> Result<ExchangeOutcome, ExchangeError> {
    let session_id = session.session_id();

    session.verify_local()?;
    let proposal = session.sign(&services.keypair)?;
    services
        .transport
        .send(session_id, ExchangeMessage::Proposal(proposal))
        .await?;
    session.proposal_sent()?;

    let finalized = match receive(services, session_id, "finalized transaction").await {
        Ok(ExchangeMessage::Finalized(stx)) => stx,
        Ok(other) => return Err(unexpected(session.state(), other)),
        Err(err @ ExchangeError::Timeout { .. }) => {
            match verdict_after_window(services, session).await {
                Some(stx) => stx,
                None => return Err(err),
            }
        }
        Err(err) => return Err(err),
    };
    session.finalize(&finalized, services.registry.as_ref())?;
    services.vault.record_transaction(&finalized.tx);
    info!(session_id = %session_id, tx_id = %finalized.id(), "buyer committed");

    Ok(ExchangeOutcome {
        session_id,
        transaction: finalized,
    })
}

/// The notary's record of the buyer's proposal once its time window has
/// closed.
async fn verdict_after_window(
    services: &PartyServices,
    session: &BuyerSession,
) -> Option<SignedTransaction> {
    let proposal = session.proposal()?;
    if let Some(window) = proposal.tx.time_window {
        let remaining_ms = window.until_ms.saturating_sub(Utc::now().timestamp_millis());
        if let Ok(remaining_ms) = u64::try_from(remaining_ms) {
            debug!(
                session_id = %session.session_id(),
                remaining_ms,
                "seller silent after proposal, waiting out the time window"
            );
            tokio::time::sleep(Duration::from_millis(remaining_ms)).await;
        }
    }
    let committed = services.notary.committed(proposal.id());
    if committed.is_some() {
        info!(session_id = %session.session_id(), tx_id = %proposal.id(), "finality learned from notary");
    }
    committed
}

async fn close_buyer(
    services: &PartyServices,
    session: &mut BuyerSession,
    result: Result<ExchangeOutcome, ExchangeError>,
) -> Result<ExchangeOutcome, ExchangeError> {
    let session_id = session.session_id();
    if let Err(err) = &result {
        session.abort(&err.to_string());
        notify_abort(services, session_id, err).await;
    }
    services.transport.close(session_id);
    result
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn receive(
    services: &PartyServices,
    session_id: SessionId,
    waiting_for: &'static str,
) -> Result<ExchangeMessage, ExchangeError> {
    let limit = services.config.receive_timeout;
    match tokio::time::timeout(limit, services.transport.receive(session_id)).await {
        Ok(message) => {
            let message = message?;
            debug!(session_id = %session_id, kind = message.kind(), "message received");
            Ok(message)
        }
        Err(_) => Err(ExchangeError::Timeout {
            waiting_for,
            timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

fn unexpected(state: impl fmt::Debug, message: ExchangeMessage) -> ExchangeError {
    match message {
        ExchangeMessage::Abort { reason } => ExchangeError::CounterpartyAbort(reason),
        ExchangeMessage::FinalityRejected { reason } => ExchangeError::NotarizationRejected(reason),
        other => ExchangeError::InvalidState {
            current_state: format!("{:?}", state),
            event: other.kind().to_string(),
        },
    }
}

async fn notify_abort(services: &PartyServices, session_id: SessionId, err: &ExchangeError) {
    if err.counterparty_informed() {
        return;
    }
    let message = ExchangeMessage::Abort {
        reason: err.to_string(),
    };
    if let Err(send_err) = services.transport.send(session_id, message).await {
        debug!(session_id = %session_id, error = %send_err, "abort not delivered");
    }
}
