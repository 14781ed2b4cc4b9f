//! Error types for the exchange protocol.
//!
//! Every exchange operation that can fail returns an [`ExchangeError`].
//! Errors raised by the lower layers (contract verification, coupon
//! resolution, signature collection, token selection, transport) convert
//! into it with `?`.

use thiserror::Error;

use super::transport::TransportError;
use crate::coupon::CouponError;
use crate::signatures::SignatureError;
use crate::tokens::TokenError;
use crate::transaction::Violation;

/// Errors that can end an exchange session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// The proposal breaks the purchase-order contract.
    #[error(transparent)]
    Violation(#[from] Violation),

    /// More than one coupon applies to the item.
    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// A redeemed coupon cannot be used for this purchase.
    #[error("coupon mismatch: {reason}")]
    CouponMismatch { reason: String },

    /// A proposal input is not the buyer's own unconsumed ledger state.
    #[error("input {reference} rejected: {reason}")]
    InputRejected { reference: String, reason: String },

    /// The seller is not paid exactly the price it computed.
    #[error("amount paid ({paid}) does not match sale price ({expected})")]
    AmountMismatch { expected: u64, paid: u64 },

    /// Required signatures are absent or invalid.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// The buyer cannot cover the price.
    #[error(transparent)]
    Funds(#[from] TokenError),

    /// The counterparty gave up on the session.
    #[error("counterparty aborted: {0}")]
    CounterpartyAbort(String),

    /// The notary refused the transaction.
    #[error("notarisation rejected: {0}")]
    NotarizationRejected(String),

    /// No message arrived within the receive timeout.
    #[error("timed out after {timeout_ms}ms waiting for {waiting_for}")]
    Timeout {
        waiting_for: &'static str,
        timeout_ms: u64,
    },

    /// The seller refused to publish an offer.
    #[error("invalid offer: {0}")]
    InvalidOffer(String),

    /// The proposal describes a different deal from the one offered.
    #[error("proposal does not match offer: {0}")]
    OfferMismatch(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The session state machine received an out-of-order event.
    #[error("unexpected state: in {current_state}, received {event}")]
    InvalidState {
        current_state: String,
        event: String,
    },
}

impl ExchangeError {
    /// Whether the counterparty already knows the session is over, so no
    /// `Abort` needs to be sent.
    pub fn counterparty_informed(&self) -> bool {
        matches!(
            self,
            Self::CounterpartyAbort(_)
                | Self::NotarizationRejected(_)
                | Self::Transport(TransportError::Closed(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::SessionId;

    #[test]
    fn lower_layer_errors_convert() {
        let err: ExchangeError = TokenError::InsufficientFunds {
            required: 5000,
            available: 0,
        }
        .into();
        assert_eq!(err.to_string(), "insufficient funds: required 5000, available 0");

        let err: ExchangeError = CouponError::Ambiguous {
            item_id: "item123".into(),
            matches: 2,
        }
        .into();
        assert!(matches!(err, ExchangeError::Coupon(_)));
    }

    #[test]
    fn amount_mismatch_message_names_both_amounts() {
        let err = ExchangeError::AmountMismatch {
            expected: 700,
            paid: 630,
        };
        assert_eq!(
            err.to_string(),
            "amount paid (630) does not match sale price (700)"
        );
    }

    #[test]
    fn rejected_input_message_names_the_reference() {
        let err = ExchangeError::InputRejected {
            reference: "never-issued:0".into(),
            reason: "not unconsumed ledger state".into(),
        };
        assert_eq!(
            err.to_string(),
            "input never-issued:0 rejected: not unconsumed ledger state"
        );
    }

    #[test]
    fn abort_needed_only_when_peer_is_unaware() {
        assert!(ExchangeError::CounterpartyAbort("x".into()).counterparty_informed());
        assert!(
            ExchangeError::Transport(TransportError::Closed(SessionId::new()))
                .counterparty_informed()
        );
        assert!(!ExchangeError::Timeout {
            waiting_for: "proposal",
            timeout_ms: 10
        }
        .counterparty_informed());
        assert!(!ExchangeError::AmountMismatch {
            expected: 1,
            paid: 2
        }
        .counterparty_informed());
    }
}
