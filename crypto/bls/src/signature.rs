use crate::{Error, Hash256, PublicKey, DST};
use blst::{min_pk as blst_core, BLST_ERROR};
use serde::de::Deserialize;
use serde::ser::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use tree_hash::TreeHash;

/// The byte-length of a BLS signature when serialized in compressed form.
pub const SIGNATURE_BYTES_LEN: usize = 96;

/// A single BLS signature.
#[derive(Clone, Copy)]
pub struct Signature {
    point: blst_core::Signature,
}

impl Signature {
    pub(crate) fn from_point(point: blst_core::Signature) -> Self {
        Self { point }
    }

    pub(crate) fn point(&self) -> &blst_core::Signature {
        &self.point
    }

    /// Serialize `self` as compressed bytes.
    pub fn serialize(&self) -> [u8; SIGNATURE_BYTES_LEN] {
        self.point.compress()
    }

    /// Deserialize `self` from compressed bytes.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != SIGNATURE_BYTES_LEN {
            return Err(Error::InvalidByteLength {
                got: bytes.len(),
                expected: SIGNATURE_BYTES_LEN,
            });
        }
        let point = blst_core::Signature::from_bytes(bytes)?;
        Ok(Self::from_point(point))
    }

    /// Verify that `self` is a valid signature of `msg` by `pubkey`.
    pub fn verify(&self, pubkey: &PublicKey, msg: Hash256) -> bool {
        self.point
            .verify(true, msg.as_bytes(), DST, &[], pubkey.point(), false)
            == BLST_ERROR::BLST_SUCCESS
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.serialize()[..] == other.serialize()[..]
    }
}

impl Eq for Signature {}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.serialize()[..].hash(state);
    }
}

impl TreeHash for Signature {
    impl_tree_hash!(SIGNATURE_BYTES_LEN);
}

impl fmt::Display for Signature {
    impl_display!();
}

impl FromStr for Signature {
    impl_from_str!();
}

impl Serialize for Signature {
    impl_serde_serialize!();
}

impl<'de> Deserialize<'de> for Signature {
    impl_serde_deserialize!();
}

impl fmt::Debug for Signature {
    impl_debug!();
}
