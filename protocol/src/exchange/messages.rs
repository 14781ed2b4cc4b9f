//! Wire messages exchanged between seller and buyer within one session.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::transaction::SignedTransaction;

/// Identifies one buyer/seller conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The seller's offer: an item at a base price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRequest {
    pub item_id: String,
    pub price: u64,
    pub currency: String,
}

/// Everything that can travel over a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExchangeMessage {
    /// Seller to buyer: the offer.
    SaleRequest(SaleRequest),
    /// Buyer to seller: the buyer-signed proposal.
    Proposal(SignedTransaction),
    /// Seller to buyer: the notarised transaction.
    Finalized(SignedTransaction),
    /// Seller to buyer: the notary refused the transaction.
    FinalityRejected { reason: String },
    /// Either direction: the sender has given up on the session.
    Abort { reason: String },
}

impl ExchangeMessage {
    /// Short name used in logs and state errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SaleRequest(_) => "SaleRequest",
            Self::Proposal(_) => "Proposal",
            Self::Finalized(_) => "Finalized",
            Self::FinalityRejected { .. } => "FinalityRejected",
            Self::Abort { .. } => "Abort",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn messages_are_tagged_on_the_wire() {
        let msg = ExchangeMessage::SaleRequest(SaleRequest {
            item_id: "item123".into(),
            price: 700,
            currency: "JPY".into(),
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "sale_request");
        assert_eq!(json["price"], 700);

        let abort = ExchangeMessage::Abort {
            reason: "no".into(),
        };
        let back: ExchangeMessage =
            serde_json::from_str(&serde_json::to_string(&abort).unwrap()).unwrap();
        assert_eq!(back.kind(), "Abort");
    }
}
