use crate::{Error, PublicKeyBytes};
use blst::min_pk as blst_core;
use serde::de::Deserialize;
use serde::ser::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use tree_hash::TreeHash;

/// The byte-length of a BLS public key when serialized in compressed form.
pub const PUBLIC_KEY_BYTES_LEN: usize = 48;

/// A BLS public key that is known to be a valid, non-infinity point.
#[derive(Clone, Copy)]
pub struct PublicKey {
    point: blst_core::PublicKey,
}

impl PublicKey {
    pub(crate) fn from_point(point: blst_core::PublicKey) -> Self {
        Self { point }
    }

    pub(crate) fn point(&self) -> &blst_core::PublicKey {
        &self.point
    }

    /// Returns `self.serialize()` as a `0x`-prefixed hex string.
    pub fn as_hex_string(&self) -> String {
        format!("{:?}", self)
    }

    /// Returns `self` in the compressed `PublicKeyBytes` representation.
    pub fn compress(&self) -> PublicKeyBytes {
        PublicKeyBytes::from(self)
    }

    /// Serialize `self` as compressed bytes.
    pub fn serialize(&self) -> [u8; PUBLIC_KEY_BYTES_LEN] {
        self.point.compress()
    }

    /// Deserialize `self` from compressed bytes.
    ///
    /// The point must be in the subgroup and must not be the point at infinity.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != PUBLIC_KEY_BYTES_LEN {
            return Err(Error::InvalidByteLength {
                got: bytes.len(),
                expected: PUBLIC_KEY_BYTES_LEN,
            });
        }
        let point = blst_core::PublicKey::key_validate(bytes)?;
        Ok(Self::from_point(point))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.serialize()[..] == other.serialize()[..]
    }
}

impl Eq for PublicKey {}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.serialize()[..].hash(state);
    }
}

impl TreeHash for PublicKey {
    impl_tree_hash!(PUBLIC_KEY_BYTES_LEN);
}

impl fmt::Display for PublicKey {
    impl_display!();
}

impl FromStr for PublicKey {
    impl_from_str!();
}

impl Serialize for PublicKey {
    impl_serde_serialize!();
}

impl<'de> Deserialize<'de> for PublicKey {
    impl_serde_deserialize!();
}

impl fmt::Debug for PublicKey {
    impl_debug!();
}
