//! # Hashing Utilities
//!
//! Two hash functions, each with a fixed job:
//!
//! - **SHA-256**, applied twice, names transactions. The id doubles as the
//!   digest every party signs.
//! - **BLAKE3** derives party identifiers from public keys and names
//!   issuance batches minted outside a transaction.

use sha2::{Digest, Sha256};

/// SHA-256 of `data` as a fixed-size array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// `SHA-256(SHA-256(data))`.
///
/// Used for transaction ids. Doubling guards against length-extension on
/// the canonical encoding, which is a plain concatenation of fields.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// BLAKE3 of `data`.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256("abc") from FIPS 180-2.
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn double_sha256_differs_from_single() {
        let data = b"purchase order";
        assert_ne!(sha256(data), double_sha256(data));
        assert_eq!(double_sha256(data), sha256(&sha256(data)));
    }

    #[test]
    fn blake3_is_deterministic() {
        assert_eq!(blake3_hash(b"bazaar"), blake3_hash(b"bazaar"));
        assert_ne!(blake3_hash(b"bazaar"), blake3_hash(b"bazaar!"));
    }
}
