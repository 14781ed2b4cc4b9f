//! # Key Management
//!
//! Ed25519 keypairs for exchange parties. A party signs the 32-byte digest
//! of every transaction it agrees to; the notary and the counterparty check
//! those signatures against the keys held in the
//! [`KeyRegistry`](crate::identity::KeyRegistry).
//!
//! Key bytes are never logged. The `Debug` impl for [`PartyKeypair`] prints
//! the public half only.

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Errors that can occur while parsing key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,
}

/// A party's signing keypair.
///
/// Not `Serialize`: the secret key never leaves the process.
///
/// # Examples
///
/// ```
/// use bazaar_protocol::crypto::PartyKeypair;
///
/// let kp = PartyKeypair::generate();
/// let sig = kp.sign(b"purchase order");
/// assert!(kp.public_key().verify(b"purchase order", &sig));
/// ```
pub struct PartyKeypair {
    signing_key: SigningKey,
}

/// The public half of a party identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyPublicKey {
    bytes: [u8; 32],
}

/// An Ed25519 signature.
///
/// Stored as `Vec<u8>` for serde; a value that is not exactly 64 bytes
/// simply fails verification.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySignature {
    bytes: Vec<u8>,
}

impl PartyKeypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> PartyPublicKey {
        PartyPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Sign `message`. Ed25519 is deterministic, so the same key and
    /// message always yield the same signature.
    pub fn sign(&self, message: &[u8]) -> PartySignature {
        PartySignature {
            bytes: self.signing_key.sign(message).to_bytes().to_vec(),
        }
    }
}

impl Clone for PartyKeypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for PartyKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartyKeypair(pub={})", self.public_key().to_hex())
    }
}

// ---------------------------------------------------------------------------
// PartyPublicKey
// ---------------------------------------------------------------------------

impl PartyPublicKey {
    /// Build from a slice, rejecting wrong lengths and invalid curve points.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Verify `signature` over `message`. Any malformed input yields `false`.
    pub fn verify(&self, message: &[u8], signature: &PartySignature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let Some(sig) = signature.to_dalek_signature() else {
            return false;
        };
        verifying_key.verify(message, &sig).is_ok()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl Hash for PartyPublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Display for PartyPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PartyPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartyPublicKey({})", &self.to_hex()[..16])
    }
}

// ---------------------------------------------------------------------------
// PartySignature
// ---------------------------------------------------------------------------

impl PartySignature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn to_dalek_signature(&self) -> Option<DalekSignature> {
        let arr: [u8; 64] = self.bytes.as_slice().try_into().ok()?;
        Some(DalekSignature::from_bytes(&arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for PartySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        if hex_str.len() >= 128 {
            write!(f, "PartySignature({}...{})", &hex_str[..8], &hex_str[120..])
        } else {
            write!(f, "PartySignature({})", hex_str)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let kp = PartyKeypair::generate();
        let sig = kp.sign(b"buy item123");
        assert!(kp.public_key().verify(b"buy item123", &sig));
    }

    #[test]
    fn wrong_message_fails_verification() {
        let kp = PartyKeypair::generate();
        let sig = kp.sign(b"correct message");
        assert!(!kp.public_key().verify(b"wrong message", &sig));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let kp1 = PartyKeypair::generate();
        let kp2 = PartyKeypair::generate();
        let sig = kp1.sign(b"message");
        assert!(!kp2.public_key().verify(b"message", &sig));
    }

    #[test]
    fn truncated_signature_is_rejected_not_panicking() {
        let kp = PartyKeypair::generate();
        let sig = kp.sign(b"message");
        let truncated = PartySignature {
            bytes: sig.as_bytes()[..32].to_vec(),
        };
        assert!(!kp.public_key().verify(b"message", &truncated));
    }

    #[test]
    fn deterministic_from_seed() {
        let kp1 = PartyKeypair::from_seed(&[7u8; 32]);
        let kp2 = PartyKeypair::from_seed(&[7u8; 32]);
        assert_eq!(kp1.public_key(), kp2.public_key());
        assert_eq!(kp1.sign(b"x"), kp2.sign(b"x"));
    }

    #[test]
    fn public_key_slice_roundtrip() {
        let pk = PartyKeypair::generate().public_key();
        assert_eq!(PartyPublicKey::try_from_slice(pk.as_bytes()).unwrap(), pk);
        assert!(PartyPublicKey::try_from_slice(&[0u8; 16]).is_err());
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = PartyKeypair::from_seed(&[9u8; 32]);
        let debug_str = format!("{:?}", kp);
        assert!(debug_str.starts_with("PartyKeypair(pub="));
        assert!(!debug_str.contains(&hex::encode([9u8; 32])));
    }
}
