//! Minting records directly into a holder's vault.
//!
//! Issuance happens outside the exchange: a bank hands a buyer cash, a shop
//! hands a buyer a coupon. Each mint gets its own batch id, the BLAKE3 hash
//! of a fresh UUID, so references never collide with transaction outputs.
//! Every minted record is admitted to the notary's ledger as well as the
//! holder's vault; a record the notary never saw cannot be spent.

use tracing::info;
use uuid::Uuid;

use crate::crypto::blake3_hash;
use crate::finality::Notary;
use crate::identity::PartyId;
use crate::ledger::{Coupon, FungiblePayment, RecordAndRef, RecordError, RecordRef};
use crate::vault::Vault;

fn fresh_batch_ref() -> RecordRef {
    let batch = blake3_hash(Uuid::new_v4().as_bytes());
    RecordRef::new(hex::encode(batch), 0)
}

/// Mint `quantity` of `currency` from `issuer` to the vault's owner.
pub fn issue_cash(
    holder_vault: &dyn Vault,
    notary: &dyn Notary,
    issuer: PartyId,
    currency: &str,
    quantity: u64,
) -> RecordAndRef {
    let holder = holder_vault.owner();
    let item = RecordAndRef::new(
        fresh_batch_ref(),
        FungiblePayment {
            issuer,
            holder,
            currency: currency.to_string(),
            quantity,
        },
    );
    notary.record_issuance(&item);
    holder_vault.put(item.clone());
    info!(issuer = %issuer, holder = %holder, currency, quantity, "cash issued");
    item
}

/// Mint a coupon from `issuer` for `item_id` to the vault's owner.
///
/// Fails without touching the vault when the discount is out of range.
pub fn issue_coupon(
    holder_vault: &dyn Vault,
    notary: &dyn Notary,
    issuer: PartyId,
    item_id: &str,
    discount_percent: u8,
) -> Result<RecordAndRef, RecordError> {
    let holder = holder_vault.owner();
    let coupon = Coupon::new(issuer, holder, item_id, discount_percent)?;
    let item = RecordAndRef::new(fresh_batch_ref(), coupon);
    notary.record_issuance(&item);
    holder_vault.put(item.clone());
    info!(
        issuer = %issuer,
        holder = %holder,
        item_id,
        discount_percent,
        "coupon issued"
    );
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PartyKeypair;
    use crate::finality::InMemoryNotary;
    use crate::vault::InMemoryVault;

    fn party() -> PartyId {
        PartyId::from_public_key(&PartyKeypair::generate().public_key())
    }

    #[test]
    fn issued_cash_lands_in_vault() {
        let (buyer, bank) = (party(), party());
        let vault = InMemoryVault::new(buyer);
        let notary = InMemoryNotary::new();
        let a = issue_cash(&vault, &notary, bank, "JPY", 2000);
        let b = issue_cash(&vault, &notary, bank, "JPY", 500);

        assert_ne!(a.reference, b.reference);
        assert_eq!(vault.payment_balance("JPY"), 2500);
        assert_eq!(notary.unconsumed(&a.reference), Some(a.record));
    }

    #[test]
    fn coupon_issuance_validates_discount() {
        let (buyer, shop) = (party(), party());
        let vault = InMemoryVault::new(buyer);
        let notary = InMemoryNotary::new();

        let ok = issue_coupon(&vault, &notary, shop, "item123", 10).unwrap();
        assert_eq!(ok.record.as_coupon().map(|c| c.holder), Some(buyer));
        assert!(notary.unconsumed(&ok.reference).is_some());

        assert!(issue_coupon(&vault, &notary, shop, "item123", 100).is_err());
        assert_eq!(vault.len(), 1);
        assert_eq!(vault.coupons_from(&shop).len(), 1);
    }
}
