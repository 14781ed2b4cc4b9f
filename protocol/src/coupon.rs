//! # Coupon Discount Resolution
//!
//! Picks the coupon a buyer redeems against an offer and computes the price
//! it pays. The seller recomputes the same price with [`discounted_price`]
//! when it checks the proposal, so both sides share one rounding rule:
//!
//! ```text
//! discount        = round_half_up(base * percent / 100)
//! effective_price = base - discount
//! ```
//!
//! All arithmetic is integer; the product is taken in `u128` so large base
//! prices cannot overflow.

use thiserror::Error;
use tracing::debug;

use crate::ledger::{Coupon, RecordAndRef};

/// Errors from coupon resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    /// More than one held coupon targets the item.
    #[error("ambiguous coupon: {matches} coupons match item '{item_id}'")]
    Ambiguous { item_id: String, matches: usize },
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponResolution {
    /// Price the buyer must pay.
    pub effective_price: u64,
    /// The coupon to consume, with its reference.
    pub redeemed: Option<RecordAndRef>,
}

impl CouponResolution {
    pub fn coupon(&self) -> Option<&Coupon> {
        self.redeemed.as_ref().and_then(|r| r.record.as_coupon())
    }
}

/// Amount knocked off `base_price` by a `percent` coupon, rounded half up.
pub fn discount_amount(base_price: u64, percent: u8) -> u64 {
    let scaled = u128::from(base_price) * u128::from(percent) + 50;
    u64::try_from(scaled / 100).unwrap_or(u64::MAX)
}

/// `base_price` after a `percent` discount. Never underflows.
pub fn discounted_price(base_price: u64, percent: u8) -> u64 {
    base_price.saturating_sub(discount_amount(base_price, percent))
}

/// Choose the coupon to redeem for `item_id` among `candidates`.
///
/// Non-coupon candidates and coupons for other items are ignored. With no
/// match the base price stands; with one match its discount applies; with
/// more than one the caller must not guess.
pub fn resolve(
    candidates: &[RecordAndRef],
    item_id: &str,
    base_price: u64,
) -> Result<CouponResolution, CouponError> {
    let mut matching = candidates.iter().filter(|c| {
        c.record
            .as_coupon()
            .is_some_and(|coupon| coupon.item_id == item_id)
    });

    let Some(first) = matching.next() else {
        debug!(item_id, base_price, "no coupon applies");
        return Ok(CouponResolution {
            effective_price: base_price,
            redeemed: None,
        });
    };

    let extra = matching.count();
    if extra > 0 {
        return Err(CouponError::Ambiguous {
            item_id: item_id.to_string(),
            matches: extra + 1,
        });
    }

    let percent = first
        .record
        .as_coupon()
        .map(|c| c.discount_percent)
        .unwrap_or(0);
    let effective_price = discounted_price(base_price, percent);
    debug!(
        item_id,
        base_price,
        percent,
        effective_price,
        coupon = %first.reference,
        "coupon resolved"
    );

    Ok(CouponResolution {
        effective_price,
        redeemed: Some(first.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PartyKeypair;
    use crate::identity::PartyId;
    use crate::ledger::{FungiblePayment, RecordRef};

    fn party() -> PartyId {
        PartyId::from_public_key(&PartyKeypair::generate().public_key())
    }

    fn coupon(reference: &str, item: &str, percent: u8) -> RecordAndRef {
        RecordAndRef::new(
            RecordRef::new(reference, 0),
            Coupon::new(party(), party(), item, percent).unwrap(),
        )
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(discount_amount(700, 10), 70);
        assert_eq!(discount_amount(700, 50), 350);
        // 15 * 10% = 1.5 -> 2
        assert_eq!(discount_amount(15, 10), 2);
        // 14 * 10% = 1.4 -> 1
        assert_eq!(discount_amount(14, 10), 1);
        // 1 * 50% = 0.5 -> 1, leaving nothing to pay
        assert_eq!(discounted_price(1, 50), 0);
    }

    #[test]
    fn huge_prices_do_not_overflow() {
        assert_eq!(discounted_price(u64::MAX, 0), u64::MAX);
        assert!(discounted_price(u64::MAX, 99) < u64::MAX);
    }

    #[test]
    fn no_coupon_keeps_base_price() {
        let res = resolve(&[], "item123", 700).unwrap();
        assert_eq!(res.effective_price, 700);
        assert!(res.redeemed.is_none());
    }

    #[test]
    fn single_matching_coupon_applies() {
        let candidates = vec![coupon("c1", "item123", 50)];
        let res = resolve(&candidates, "item123", 700).unwrap();
        assert_eq!(res.effective_price, 350);
        assert_eq!(res.coupon().map(|c| c.discount_percent), Some(50));
    }

    #[test]
    fn coupon_for_another_item_is_ignored() {
        let candidates = vec![coupon("c1", "item456", 50)];
        let res = resolve(&candidates, "item123", 700).unwrap();
        assert_eq!(res.effective_price, 700);
        assert!(res.redeemed.is_none());
    }

    #[test]
    fn two_matching_coupons_are_ambiguous() {
        let candidates = vec![coupon("c1", "item123", 10), coupon("c2", "item123", 20)];
        match resolve(&candidates, "item123", 700) {
            Err(CouponError::Ambiguous { matches, .. }) => assert_eq!(matches, 2),
            other => panic!("expected Ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn result_does_not_depend_on_candidate_order() {
        let cash = RecordAndRef::new(
            RecordRef::new("cash", 0),
            FungiblePayment {
                issuer: party(),
                holder: party(),
                currency: "JPY".into(),
                quantity: 5,
            },
        );
        let matching = coupon("c1", "item123", 20);
        let other = coupon("c2", "item999", 40);

        let a = resolve(&[cash.clone(), matching.clone(), other.clone()], "item123", 1000).unwrap();
        let b = resolve(&[other, matching, cash], "item123", 1000).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.effective_price, 800);
    }
}
