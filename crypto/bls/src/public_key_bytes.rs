use crate::{Error, PublicKey, PUBLIC_KEY_BYTES_LEN};
use serde::de::Deserialize;
use serde::ser::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use tree_hash::TreeHash;

/// A wrapper around some bytes that may or may not be a `PublicKey` in compressed form.
///
/// Used as the identity of a validator throughout the signing path, since it is cheap to copy,
/// hash and compare and only needs to be decompressed when a signature must be verified.
#[derive(Clone, Copy)]
pub struct PublicKeyBytes {
    bytes: [u8; PUBLIC_KEY_BYTES_LEN],
}

impl PublicKeyBytes {
    /// Decompress and deserialize the bytes in `self` into an actual public key.
    ///
    /// May fail if the bytes are invalid.
    pub fn decompress(&self) -> Result<PublicKey, Error> {
        PublicKey::deserialize(&self.bytes)
    }

    /// Instantiates `Self` with all-zeros.
    pub fn empty() -> Self {
        Self {
            bytes: [0; PUBLIC_KEY_BYTES_LEN],
        }
    }

    /// Returns a slice of the bytes contained in `self`.
    ///
    /// The bytes are not verified (i.e., they may not represent a valid BLS point).
    pub fn as_serialized(&self) -> &[u8] {
        &self.bytes
    }

    /// Clones the bytes in `self`.
    pub fn serialize(&self) -> [u8; PUBLIC_KEY_BYTES_LEN] {
        self.bytes
    }

    /// Returns the canonical `0x`-prefixed, lowercase hex representation.
    pub fn as_hex_string(&self) -> String {
        self.to_string()
    }

    /// Instantiates `Self` from bytes.
    ///
    /// Only the byte-length is checked.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() == PUBLIC_KEY_BYTES_LEN {
            let mut pk_bytes = [0; PUBLIC_KEY_BYTES_LEN];
            pk_bytes[..].copy_from_slice(bytes);
            Ok(Self { bytes: pk_bytes })
        } else {
            Err(Error::InvalidByteLength {
                got: bytes.len(),
                expected: PUBLIC_KEY_BYTES_LEN,
            })
        }
    }
}

impl PartialEq for PublicKeyBytes {
    fn eq(&self, other: &Self) -> bool {
        self.bytes[..] == other.bytes[..]
    }
}

impl Eq for PublicKeyBytes {}

impl Hash for PublicKeyBytes {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes[..].hash(state);
    }
}

impl From<&PublicKey> for PublicKeyBytes {
    fn from(pk: &PublicKey) -> Self {
        Self {
            bytes: pk.serialize(),
        }
    }
}

impl From<PublicKey> for PublicKeyBytes {
    fn from(pk: PublicKey) -> Self {
        Self::from(&pk)
    }
}

impl TryFrom<&PublicKeyBytes> for PublicKey {
    type Error = Error;

    fn try_from(bytes: &PublicKeyBytes) -> Result<Self, Self::Error> {
        bytes.decompress()
    }
}

impl TreeHash for PublicKeyBytes {
    impl_tree_hash!(PUBLIC_KEY_BYTES_LEN);
}

impl fmt::Display for PublicKeyBytes {
    impl_display!();
}

impl FromStr for PublicKeyBytes {
    impl_from_str!();
}

impl Serialize for PublicKeyBytes {
    impl_serde_serialize!();
}

impl<'de> Deserialize<'de> for PublicKeyBytes {
    impl_serde_deserialize!();
}

impl fmt::Debug for PublicKeyBytes {
    impl_debug!();
}
