//! Human-facing summary of a vault: balances per currency, held coupons and
//! purchase orders. The node binary prints one per party after an exchange.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::identity::PartyId;
use crate::ledger::{Coupon, PurchaseOrder, RecordAndRef};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VaultSnapshot {
    pub owner: Option<PartyId>,
    /// Currency code to total quantity held by the owner.
    pub balances: BTreeMap<String, u64>,
    pub coupons: Vec<Coupon>,
    pub purchase_orders: Vec<PurchaseOrder>,
}

impl VaultSnapshot {
    pub fn collect(owner: PartyId, records: &[RecordAndRef]) -> Self {
        let mut snapshot = Self {
            owner: Some(owner),
            ..Self::default()
        };
        for item in records {
            if let Some(payment) = item.record.as_payment() {
                if payment.holder == owner {
                    let total = snapshot
                        .balances
                        .entry(payment.currency.clone())
                        .or_insert(0);
                    *total = total.saturating_add(payment.quantity);
                }
            } else if let Some(coupon) = item.record.as_coupon() {
                snapshot.coupons.push(coupon.clone());
            } else if let Some(order) = item.record.as_purchase_order() {
                snapshot.purchase_orders.push(order.clone());
            }
        }
        snapshot
    }

    pub fn balance(&self, currency: &str) -> u64 {
        self.balances.get(currency).copied().unwrap_or(0)
    }
}
