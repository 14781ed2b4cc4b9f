//! # Party Identifiers
//!
//! ```text
//! public_key (32 bytes)
//!     -> BLAKE3(public_key) -> 32 bytes
//!     -> Bech32("bzr", hash) -> bzr1qw508d6qe...
//! ```
//!
//! A [`PartyId`] carries only the hash. It is `Copy`, totally ordered, and
//! cheap to put in sets, so required-signer sets are plain
//! `BTreeSet<PartyId>` with a deterministic iteration order.

use bech32::{Bech32, Hrp};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::PARTY_ID_HRP;
use crate::crypto::{blake3_hash, PartyPublicKey};

const PARTY_HRP: Hrp = Hrp::parse_unchecked(PARTY_ID_HRP);

/// Errors from decoding a party address.
#[derive(Debug, Error)]
pub enum PartyIdError {
    /// The Bech32 string could not be decoded.
    #[error("bech32 decode error: {0}")]
    Bech32Decode(String),

    /// The address belongs to another network or scheme.
    #[error("invalid HRP: expected '{expected}', got '{got}'")]
    InvalidHrp {
        /// The expected HRP.
        expected: String,
        /// The HRP that was actually found.
        got: String,
    },

    /// The payload is not a 32-byte key hash.
    #[error("invalid address data length: expected 32 bytes, got {0}")]
    InvalidDataLength(usize),
}

/// Identity of a party: the BLAKE3 hash of its public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartyId {
    key_hash: [u8; 32],
}

impl PartyId {
    /// Derive the id owned by `public_key`.
    pub fn from_public_key(public_key: &PartyPublicKey) -> Self {
        Self {
            key_hash: blake3_hash(public_key.as_bytes()),
        }
    }

    /// Whether `public_key` is the key this id was derived from.
    pub fn is_owned_by(&self, public_key: &PartyPublicKey) -> bool {
        *self == Self::from_public_key(public_key)
    }

    pub fn key_hash(&self) -> &[u8; 32] {
        &self.key_hash
    }

    /// Bech32 address of the form `bzr1...`.
    pub fn to_address(&self) -> String {
        // A 32-byte payload is far below the Bech32 length limit, so the
        // fallback branch is unreachable in practice.
        bech32::encode::<Bech32>(PARTY_HRP, &self.key_hash)
            .unwrap_or_else(|_| hex::encode(self.key_hash))
    }

    /// Parse a `bzr1...` address, validating checksum, prefix and length.
    pub fn from_address(addr: &str) -> Result<Self, PartyIdError> {
        let (hrp, data) =
            bech32::decode(addr).map_err(|e| PartyIdError::Bech32Decode(e.to_string()))?;

        if hrp != PARTY_HRP {
            return Err(PartyIdError::InvalidHrp {
                expected: PARTY_ID_HRP.to_string(),
                got: hrp.to_string(),
            });
        }

        let key_hash: [u8; 32] = data
            .as_slice()
            .try_into()
            .map_err(|_| PartyIdError::InvalidDataLength(data.len()))?;
        Ok(Self { key_hash })
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_address())
    }
}

impl fmt::Debug for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartyId({})", self.to_address())
    }
}

impl Serialize for PartyId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_address())
        } else {
            serializer.serialize_bytes(&self.key_hash)
        }
    }
}

impl<'de> Deserialize<'de> for PartyId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            PartyId::from_address(&s).map_err(serde::de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            let key_hash: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
                serde::de::Error::custom(format!("expected 32-byte key hash, got {}", bytes.len()))
            })?;
            Ok(PartyId { key_hash })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PartyKeypair;

    #[test]
    fn address_roundtrip() {
        let kp = PartyKeypair::generate();
        let id = PartyId::from_public_key(&kp.public_key());
        let addr = id.to_address();
        assert!(addr.starts_with("bzr1"));
        assert_eq!(PartyId::from_address(&addr).unwrap(), id);
    }

    #[test]
    fn different_keys_give_different_ids() {
        let a = PartyId::from_public_key(&PartyKeypair::generate().public_key());
        let b = PartyId::from_public_key(&PartyKeypair::generate().public_key());
        assert_ne!(a, b);
    }

    #[test]
    fn ownership_check() {
        let kp = PartyKeypair::generate();
        let other = PartyKeypair::generate();
        let id = PartyId::from_public_key(&kp.public_key());
        assert!(id.is_owned_by(&kp.public_key()));
        assert!(!id.is_owned_by(&other.public_key()));
    }

    #[test]
    fn foreign_hrp_is_rejected() {
        let hrp = Hrp::parse("shop").unwrap();
        let addr = bech32::encode::<Bech32>(hrp, &[1u8; 32]).unwrap();
        match PartyId::from_address(&addr) {
            Err(PartyIdError::InvalidHrp { got, .. }) => assert_eq!(got, "shop"),
            other => panic!("expected InvalidHrp, got {:?}", other),
        }
    }

    #[test]
    fn short_payload_is_rejected() {
        let addr = bech32::encode::<Bech32>(PARTY_HRP, &[1u8; 20]).unwrap();
        assert!(matches!(
            PartyId::from_address(&addr),
            Err(PartyIdError::InvalidDataLength(20))
        ));
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let id = PartyId::from_public_key(&PartyKeypair::generate().public_key());
        let mut addr = id.to_address();
        let last = addr.pop().unwrap();
        addr.push(if last == 'q' { 'p' } else { 'q' });
        assert!(PartyId::from_address(&addr).is_err());
    }

    #[test]
    fn json_uses_address_form() {
        let id = PartyId::from_public_key(&PartyKeypair::generate().public_key());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_address()));
        let back: PartyId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
