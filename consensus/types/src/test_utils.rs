//! Helpers for producing deterministic keys in tests.

use crate::{Keypair, SecretKey};

/// Generates a deterministic keypair from the validator `index`.
///
/// The secret key is derived with EIP-2333 `KeyGen` from the index as little-endian input key
/// material, so the same index always yields the same key.
pub fn generate_deterministic_keypair(index: usize) -> Keypair {
    let mut ikm = [0u8; 32];
    ikm[0..8].copy_from_slice(&(index as u64).to_le_bytes());
    // The 32 byte input key material is always long enough for `KeyGen`.
    let sk = match SecretKey::from_ikm(&ikm) {
        Ok(sk) => sk,
        Err(e) => panic!("deterministic key generation failed: {:?}", e),
    };
    Keypair::from_components(sk.public_key(), sk)
}

/// Generates `n` deterministic keypairs, starting from index 0.
pub fn generate_deterministic_keypairs(n: usize) -> Vec<Keypair> {
    (0..n).map(generate_deterministic_keypair).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypairs_are_deterministic_and_distinct() {
        let a = generate_deterministic_keypairs(3);
        let b = generate_deterministic_keypairs(3);
        assert_eq!(a, b);
        assert_ne!(a[0].pk, a[1].pk);
        assert_ne!(a[1].pk, a[2].pk);
    }
}
