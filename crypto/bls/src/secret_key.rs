use crate::{Error, Hash256, PublicKey, SecretHash, Signature, DST};
use blst::min_pk as blst_core;
use rand::RngCore;
use zeroize::Zeroize;

/// The byte-length of a BLS secret key.
pub const SECRET_KEY_BYTES_LEN: usize = 32;

/// A BLS secret key.
///
/// The underlying scalar is zeroized when `self` is dropped. There is intentionally no `Debug`,
/// `Display` or `Serialize` implementation.
#[derive(Clone)]
pub struct SecretKey {
    point: blst_core::SecretKey,
}

impl SecretKey {
    /// Generate a new `Self` using randomness from the thread-local RNG.
    pub fn random() -> Self {
        let mut ikm = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut ikm);
        let result = blst_core::SecretKey::key_gen(&ikm, &[]);
        ikm.zeroize();
        match result {
            Ok(point) => Self { point },
            // `key_gen` only fails when `ikm` is shorter than 32 bytes.
            Err(_) => unreachable!("ikm is 32 bytes"),
        }
    }

    /// Derive a secret key from input key material using the EIP-2333 `KeyGen` function.
    pub fn from_ikm(ikm: &[u8]) -> Result<Self, Error> {
        let point = blst_core::SecretKey::key_gen(ikm, &[])?;
        Ok(Self { point })
    }

    /// Returns the public key that corresponds to self.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_point(self.point.sk_to_pk())
    }

    /// Returns a signature across `msg` using `self`.
    pub fn sign(&self, msg: Hash256) -> Signature {
        Signature::from_point(self.point.sign(msg.as_bytes(), DST, &[]))
    }

    /// Serialize `self` as bytes, wrapped so the copy is zeroized on drop.
    pub fn serialize(&self) -> SecretHash {
        SecretHash::from(self.point.to_bytes())
    }

    /// Deserialize `self` from bytes.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != SECRET_KEY_BYTES_LEN {
            return Err(Error::InvalidSecretKeyLength {
                got: bytes.len(),
                expected: SECRET_KEY_BYTES_LEN,
            });
        }
        let point = blst_core::SecretKey::from_bytes(bytes)?;
        Ok(Self { point })
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.serialize().as_bytes() == other.serialize().as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET_KEY: &str = "68081afeb7ad3e8d469f87010804c3e8d53ef77d393059a55132637206cc59ec";
    const PUBLIC_KEY: &str = "0xb7354252aa5bce27ab9537fd0158515935f3c3861419e1b4b6c8219b5dbd15fcf907bddf275442f3e32f904f79807a2a";

    #[test]
    fn public_key_matches_known_vector() {
        let sk = SecretKey::deserialize(&hex::decode(SECRET_KEY).unwrap()).unwrap();
        assert_eq!(sk.public_key().as_hex_string(), PUBLIC_KEY);
        assert_eq!(hex::encode(sk.serialize().as_bytes()), SECRET_KEY);
    }

    #[test]
    fn bad_length_is_rejected() {
        assert!(matches!(
            SecretKey::deserialize(&[1; 31]),
            Err(Error::InvalidSecretKeyLength {
                got: 31,
                expected: SECRET_KEY_BYTES_LEN
            })
        ));
    }

    #[test]
    fn sign_and_verify() {
        let sk = SecretKey::random();
        let msg = Hash256::repeat_byte(42);
        let sig = sk.sign(msg);
        assert!(sig.verify(&sk.public_key(), msg));
        assert!(!sig.verify(&sk.public_key(), Hash256::repeat_byte(43)));
        assert!(!sig.verify(&SecretKey::random().public_key(), msg));
    }

    #[test]
    fn signing_is_deterministic() {
        let sk = SecretKey::random();
        let msg = Hash256::repeat_byte(7);
        assert_eq!(sk.sign(msg), sk.sign(msg));
    }
}
