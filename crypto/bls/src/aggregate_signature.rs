use crate::{Error, Signature, SIGNATURE_BYTES_LEN};
use blst::min_pk as blst_core;
use serde::de::Deserialize;
use serde::ser::Serialize;
use std::fmt;
use std::str::FromStr;
use tree_hash::TreeHash;

/// The compressed bytes used to represent `AggregateSignature::infinity()`.
pub const INFINITY_SIGNATURE: [u8; SIGNATURE_BYTES_LEN] = [
    0xc0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0,
];

/// An aggregation of zero or more BLS signatures.
///
/// An aggregate of zero signatures is the point at infinity.
#[derive(Clone)]
pub struct AggregateSignature {
    point: Option<blst_core::AggregateSignature>,
}

impl AggregateSignature {
    /// Initialize `Self` to the point at infinity.
    pub fn infinity() -> Self {
        Self { point: None }
    }

    /// Returns `true` if `self` is the point at infinity.
    pub fn is_infinity(&self) -> bool {
        self.point.is_none()
    }

    /// Aggregates a signature onto `self`.
    pub fn add_assign(&mut self, other: &Signature) {
        match self.point.as_mut() {
            Some(point) => {
                // Signatures produced by this crate are always in the subgroup.
                let _ = point.add_signature(other.point(), false);
            }
            None => {
                self.point = Some(blst_core::AggregateSignature::from_signature(other.point()));
            }
        }
    }

    /// Serialize `self` as compressed bytes.
    pub fn serialize(&self) -> [u8; SIGNATURE_BYTES_LEN] {
        match &self.point {
            Some(point) => point.to_signature().compress(),
            None => INFINITY_SIGNATURE,
        }
    }

    /// Deserialize `self` from compressed bytes.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes == &INFINITY_SIGNATURE[..] {
            return Ok(Self::infinity());
        }
        let sig = Signature::deserialize(bytes)?;
        Ok(Self {
            point: Some(blst_core::AggregateSignature::from_signature(sig.point())),
        })
    }
}

impl From<&Signature> for AggregateSignature {
    fn from(sig: &Signature) -> Self {
        let mut agg = Self::infinity();
        agg.add_assign(sig);
        agg
    }
}

impl PartialEq for AggregateSignature {
    fn eq(&self, other: &Self) -> bool {
        self.serialize()[..] == other.serialize()[..]
    }
}

impl Eq for AggregateSignature {}

impl TreeHash for AggregateSignature {
    impl_tree_hash!(SIGNATURE_BYTES_LEN);
}

impl fmt::Display for AggregateSignature {
    impl_display!();
}

impl FromStr for AggregateSignature {
    impl_from_str!();
}

impl Serialize for AggregateSignature {
    impl_serde_serialize!();
}

impl<'de> Deserialize<'de> for AggregateSignature {
    impl_serde_deserialize!();
}

impl fmt::Debug for AggregateSignature {
    impl_debug!();
}
