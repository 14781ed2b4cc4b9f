//! # Protocol Configuration & Constants
//!
//! Every constant the exchange protocol depends on lives here, together with
//! [`ExchangeConfig`], the per-party runtime settings handed to each session
//! driver. Nothing in this crate reads global state; a party's config travels
//! inside its [`PartyServices`](crate::exchange::PartyServices).

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Crate-level protocol version, reported by the node binary.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Bech32 human-readable prefix for party addresses.
pub const PARTY_ID_HRP: &str = "bzr";

// ---------------------------------------------------------------------------
// Exchange Parameters
// ---------------------------------------------------------------------------

/// Currency quoted by sellers unless configured otherwise.
pub const DEFAULT_CURRENCY: &str = "JPY";

/// Upper bound on how long a party waits for the counterparty's next message.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Width of the validity window the buyer stamps on a proposal. The notary
/// refuses to commit a transaction outside of it.
pub const DEFAULT_TIME_WINDOW: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Coupon Parameters
// ---------------------------------------------------------------------------

/// Exclusive upper bound on a coupon's discount percentage. A coupon worth
/// 100% or more would let the buyer take the item for free.
pub const MAX_DISCOUNT_PERCENT: u8 = 100;

/// Discount used when issuing a coupon without an explicit rate.
pub const DEFAULT_DISCOUNT_PERCENT: u8 = 10;

/// Item a coupon is bound to when none is named at issuance.
pub const DEFAULT_COUPON_ITEM: &str = "dummy-item-101";

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

/// How a buyer picks the coupon it redeems against an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponStrategy {
    /// Redeem the single held coupon bound to the offered item, if any.
    #[default]
    Resolve,
    /// Redeem the first coupon issued by the seller, whatever item it names.
    /// The seller is expected to refuse mismatched coupons; this mode exists
    /// to exercise that refusal against legacy buyers.
    RedeemAnyFromSeller,
}

/// Settings that shape one party's behaviour in an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// Bound on every wait for a counterparty message.
    pub receive_timeout: Duration,
    /// Currency a seller quotes and a buyer pays in.
    pub currency: String,
    /// Validity window stamped on proposals built by a buyer.
    pub time_window: Duration,
    /// Buyer-side coupon selection.
    pub coupon_strategy: CouponStrategy,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            currency: DEFAULT_CURRENCY.to_string(),
            time_window: DEFAULT_TIME_WINDOW,
            coupon_strategy: CouponStrategy::default(),
        }
    }
}

impl ExchangeConfig {
    /// Override the receive timeout.
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Override the quoted currency.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Override the proposal validity window.
    pub fn with_time_window(mut self, window: Duration) -> Self {
        self.time_window = window;
        self
    }

    /// Override the buyer's coupon strategy.
    pub fn with_coupon_strategy(mut self, strategy: CouponStrategy) -> Self {
        self.coupon_strategy = strategy;
        self
    }
}
