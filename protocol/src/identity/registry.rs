//! Party directory: resolves a [`PartyId`] to the key that verifies its
//! signatures and to a display name.

use dashmap::DashMap;

use super::PartyId;
use crate::crypto::PartyPublicKey;

/// Lookup of party keys, consulted when checking signatures.
pub trait KeyRegistry: Send + Sync {
    /// The verification key registered for `party`.
    fn public_key_of(&self, party: &PartyId) -> Option<PartyPublicKey>;

    /// Human-readable name registered for `party`.
    fn name_of(&self, party: &PartyId) -> Option<String>;
}

#[derive(Debug, Clone)]
struct RegisteredParty {
    name: String,
    public_key: PartyPublicKey,
}

/// Registry backed by a concurrent map. One instance is shared (via `Arc`)
/// by every party of a test network or of one node process.
#[derive(Debug, Default)]
pub struct InMemoryKeyRegistry {
    parties: DashMap<PartyId, RegisteredParty>,
}

impl InMemoryKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `public_key` under `name` and return the derived id.
    /// Registering the same key again replaces its name.
    pub fn register(&self, name: impl Into<String>, public_key: PartyPublicKey) -> PartyId {
        let id = PartyId::from_public_key(&public_key);
        self.parties.insert(
            id,
            RegisteredParty {
                name: name.into(),
                public_key,
            },
        );
        id
    }

    pub fn len(&self) -> usize {
        self.parties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
    }
}

impl KeyRegistry for InMemoryKeyRegistry {
    fn public_key_of(&self, party: &PartyId) -> Option<PartyPublicKey> {
        self.parties.get(party).map(|p| p.public_key.clone())
    }

    fn name_of(&self, party: &PartyId) -> Option<String> {
        self.parties.get(party).map(|p| p.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PartyKeypair;

    #[test]
    fn register_and_resolve() {
        let registry = InMemoryKeyRegistry::new();
        let kp = PartyKeypair::generate();
        let id = registry.register("ShopA", kp.public_key());

        assert_eq!(registry.public_key_of(&id), Some(kp.public_key()));
        assert_eq!(registry.name_of(&id).as_deref(), Some("ShopA"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_party_resolves_to_none() {
        let registry = InMemoryKeyRegistry::new();
        let stranger = PartyId::from_public_key(&PartyKeypair::generate().public_key());
        assert!(registry.public_key_of(&stranger).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn re_registering_keeps_one_entry() {
        let registry = InMemoryKeyRegistry::new();
        let kp = PartyKeypair::generate();
        let first = registry.register("Buyer", kp.public_key());
        let second = registry.register("BuyerRenamed", kp.public_key());
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.name_of(&first).as_deref(), Some("BuyerRenamed"));
    }
}
