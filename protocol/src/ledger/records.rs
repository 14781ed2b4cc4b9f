//! Record kinds and the references that point at them.
//!
//! Records are plain values. The one construction-time rule is the coupon
//! discount bound; everything else (distinct parties, non-empty item) is
//! checked by the transaction verifier, because a malformed record must be
//! representable to be rejected.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use crate::config::MAX_DISCOUNT_PERCENT;
use crate::identity::PartyId;

/// Errors raised when constructing a record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    /// Coupon discounts must lie in `[0, 100)`.
    #[error("discount rate must be smaller than {max}%, got {got}%")]
    DiscountOutOfRange {
        /// The exclusive upper bound.
        max: u8,
        /// The rejected rate.
        got: u8,
    },
}

// ---------------------------------------------------------------------------
// Record kinds
// ---------------------------------------------------------------------------

/// Agreement that `seller` sells `item_id` to `buyer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub seller: PartyId,
    pub buyer: PartyId,
    pub item_id: String,
}

impl PurchaseOrder {
    pub fn new(seller: PartyId, buyer: PartyId, item_id: impl Into<String>) -> Self {
        Self {
            seller,
            buyer,
            item_id: item_id.into(),
        }
    }

    /// Seller then buyer.
    pub fn participants(&self) -> [PartyId; 2] {
        [self.seller, self.buyer]
    }
}

/// A quantity of currency held by `holder`, issued by `issuer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FungiblePayment {
    pub issuer: PartyId,
    pub holder: PartyId,
    pub currency: String,
    pub quantity: u64,
}

/// A non-fungible discount voucher, redeemable against one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub issuer: PartyId,
    pub holder: PartyId,
    pub item_id: String,
    pub discount_percent: u8,
}

impl Coupon {
    /// Build a coupon, refusing discounts of 100% or more.
    pub fn new(
        issuer: PartyId,
        holder: PartyId,
        item_id: impl Into<String>,
        discount_percent: u8,
    ) -> Result<Self, RecordError> {
        if discount_percent >= MAX_DISCOUNT_PERCENT {
            return Err(RecordError::DiscountOutOfRange {
                max: MAX_DISCOUNT_PERCENT,
                got: discount_percent,
            });
        }
        Ok(Self {
            issuer,
            holder,
            item_id: item_id.into(),
            discount_percent,
        })
    }
}

/// Discriminant of [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    PurchaseOrder,
    Payment,
    Coupon,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PurchaseOrder => write!(f, "PurchaseOrder"),
            Self::Payment => write!(f, "Payment"),
            Self::Coupon => write!(f, "Coupon"),
        }
    }
}

/// Any record that can appear as a transaction input or output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    PurchaseOrder(PurchaseOrder),
    Payment(FungiblePayment),
    Coupon(Coupon),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::PurchaseOrder(_) => RecordKind::PurchaseOrder,
            Self::Payment(_) => RecordKind::Payment,
            Self::Coupon(_) => RecordKind::Coupon,
        }
    }

    /// Parties whose vaults store this record.
    pub fn participants(&self) -> BTreeSet<PartyId> {
        match self {
            Self::PurchaseOrder(po) => po.participants().into_iter().collect(),
            Self::Payment(p) => BTreeSet::from([p.holder]),
            Self::Coupon(c) => BTreeSet::from([c.holder]),
        }
    }

    pub fn as_purchase_order(&self) -> Option<&PurchaseOrder> {
        match self {
            Self::PurchaseOrder(po) => Some(po),
            _ => None,
        }
    }

    pub fn as_payment(&self) -> Option<&FungiblePayment> {
        match self {
            Self::Payment(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_coupon(&self) -> Option<&Coupon> {
        match self {
            Self::Coupon(c) => Some(c),
            _ => None,
        }
    }

    /// Append the canonical encoding of this record to `buf`.
    ///
    /// Layout: one tag byte, then fields in declaration order. Party ids are
    /// their raw 32-byte hashes, strings are null-terminated, integers are
    /// little-endian.
    pub fn write_canonical(&self, buf: &mut Vec<u8>) {
        match self {
            Self::PurchaseOrder(po) => {
                buf.push(0x01);
                buf.extend_from_slice(po.seller.key_hash());
                buf.extend_from_slice(po.buyer.key_hash());
                buf.extend_from_slice(po.item_id.as_bytes());
                buf.push(0x00);
            }
            Self::Payment(p) => {
                buf.push(0x02);
                buf.extend_from_slice(p.issuer.key_hash());
                buf.extend_from_slice(p.holder.key_hash());
                buf.extend_from_slice(p.currency.as_bytes());
                buf.push(0x00);
                buf.extend_from_slice(&p.quantity.to_le_bytes());
            }
            Self::Coupon(c) => {
                buf.push(0x03);
                buf.extend_from_slice(c.issuer.key_hash());
                buf.extend_from_slice(c.holder.key_hash());
                buf.extend_from_slice(c.item_id.as_bytes());
                buf.push(0x00);
                buf.push(c.discount_percent);
            }
        }
    }
}

impl From<PurchaseOrder> for Record {
    fn from(po: PurchaseOrder) -> Self {
        Self::PurchaseOrder(po)
    }
}

impl From<FungiblePayment> for Record {
    fn from(p: FungiblePayment) -> Self {
        Self::Payment(p)
    }
}

impl From<Coupon> for Record {
    fn from(c: Coupon) -> Self {
        Self::Coupon(c)
    }
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// Points at output `index` of the transaction (or issuance batch) `tx_id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub tx_id: String,
    pub index: u32,
}

impl RecordRef {
    pub fn new(tx_id: impl Into<String>, index: u32) -> Self {
        Self {
            tx_id: tx_id.into(),
            index,
        }
    }

    pub fn write_canonical(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.tx_id.as_bytes());
        buf.push(0x00);
        buf.extend_from_slice(&self.index.to_le_bytes());
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.index)
    }
}

/// A record together with the reference it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAndRef {
    pub reference: RecordRef,
    pub record: Record,
}

impl RecordAndRef {
    pub fn new(reference: RecordRef, record: impl Into<Record>) -> Self {
        Self {
            reference,
            record: record.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PartyKeypair;

    fn party() -> PartyId {
        PartyId::from_public_key(&PartyKeypair::generate().public_key())
    }

    #[test]
    fn coupon_discount_bounds() {
        let (shop, buyer) = (party(), party());
        assert!(Coupon::new(shop, buyer, "item123", 0).is_ok());
        assert!(Coupon::new(shop, buyer, "item123", 99).is_ok());
        assert_eq!(
            Coupon::new(shop, buyer, "item123", 100),
            Err(RecordError::DiscountOutOfRange { max: 100, got: 100 })
        );
        assert!(Coupon::new(shop, buyer, "item123", 255).is_err());
    }

    #[test]
    fn participants_per_kind() {
        let (seller, buyer, bank) = (party(), party(), party());

        let po = Record::from(PurchaseOrder::new(seller, buyer, "item123"));
        assert_eq!(po.participants(), BTreeSet::from([seller, buyer]));

        let cash = Record::from(FungiblePayment {
            issuer: bank,
            holder: buyer,
            currency: "JPY".into(),
            quantity: 10,
        });
        assert_eq!(cash.participants(), BTreeSet::from([buyer]));

        let coupon = Record::from(Coupon::new(seller, buyer, "item123", 10).unwrap());
        assert_eq!(coupon.participants(), BTreeSet::from([buyer]));
        assert_eq!(coupon.kind(), RecordKind::Coupon);
    }

    #[test]
    fn canonical_encoding_distinguishes_fields() {
        let (seller, buyer) = (party(), party());
        let mut a = Vec::new();
        let mut b = Vec::new();
        Record::from(PurchaseOrder::new(seller, buyer, "item1")).write_canonical(&mut a);
        Record::from(PurchaseOrder::new(buyer, seller, "item1")).write_canonical(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn record_json_is_tagged() {
        let po = Record::from(PurchaseOrder::new(party(), party(), "item123"));
        let json = serde_json::to_value(&po).unwrap();
        assert_eq!(json["kind"], "purchase_order");
        assert_eq!(json["item_id"], "item123");
    }
}
