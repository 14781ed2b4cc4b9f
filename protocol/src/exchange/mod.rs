//! # Exchange Protocol
//!
//! A two-party negotiation producing one notarised purchase. The seller
//! offers an item, the buyer pays for it (redeeming at most one coupon) and
//! signs, the seller re-checks everything, countersigns and submits to the
//! notary.
//!
//! ```text
//! Seller                                   Buyer
//!   │ ── SaleRequest{item, price} ──────────▶ │  resolve coupon
//!   │                                         │  build + verify + sign
//!   │ ◀────────────── Proposal(tx, sig_b) ─── │
//!   │  verify + business checks               │
//!   │  countersign, submit to notary          │
//!   │ ── Finalized(tx, sig_b, sig_s) ───────▶ │
//!   │         or FinalityRejected / Abort     │
//! ```
//!
//! An order issuance skips the offer and the payment: the buyer proposes a
//! purchase order under `Issue`, the seller checks and countersigns it.
//!
//! ```text
//! messages.rs  — SessionId, SaleRequest, ExchangeMessage
//! transport.rs — SessionTransport trait, in-process LocalTransport
//! seller.rs    — SellerSession state machine
//! buyer.rs     — BuyerSession state machine
//! flow.rs      — async sell / buy / order drivers over PartyServices
//! error.rs     — ExchangeError
//! ```
//!
//! Sessions share nothing but the collaborators in [`PartyServices`]; one
//! seller can run any number of them at once.

pub mod buyer;
pub mod error;
pub mod flow;
pub mod messages;
pub mod seller;
pub mod transport;

pub use buyer::{BuyerSession, BuyerState};
pub use error::ExchangeError;
pub use flow::{accept_order, buy, request_order, sell, ExchangeOutcome, PartyServices};
pub use messages::{ExchangeMessage, SaleRequest, SessionId};
pub use seller::{SellerSession, SellerState};
pub use transport::{LocalTransport, SessionTransport, TransportError};
