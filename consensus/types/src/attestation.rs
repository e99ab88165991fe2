use crate::{
    AggregateSignature, AttestationData, BitList, MaxValidatorsPerCommittee, Signature, Slot,
};
use serde::{Deserialize, Serialize};
use tree_hash_derive::TreeHash;

#[derive(Debug, PartialEq)]
pub enum Error {
    SszTypesError(ssz_types::Error),
    AlreadySigned(usize),
}

/// Details an attestation that can be slashable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TreeHash)]
pub struct Attestation {
    pub aggregation_bits: BitList<MaxValidatorsPerCommittee>,
    pub data: AttestationData,
    pub signature: AggregateSignature,
}

impl Attestation {
    /// Produce an unsigned attestation for a committee of `committee_len` members.
    pub fn empty_for_signing(committee_len: usize, data: AttestationData) -> Result<Self, Error> {
        Ok(Self {
            aggregation_bits: BitList::with_capacity(committee_len)
                .map_err(Error::SszTypesError)?,
            data,
            signature: AggregateSignature::infinity(),
        })
    }

    /// Adds `signature` to `self` and sets the `committee_position`'th bit of `aggregation_bits` to `true`.
    ///
    /// Returns an `AlreadySigned` error if the `committee_position`'th bit is already `true`.
    pub fn add_signature(
        &mut self,
        signature: &Signature,
        committee_position: usize,
    ) -> Result<(), Error> {
        if self
            .aggregation_bits
            .get(committee_position)
            .map_err(Error::SszTypesError)?
        {
            Err(Error::AlreadySigned(committee_position))
        } else {
            self.aggregation_bits
                .set(committee_position, true)
                .map_err(Error::SszTypesError)?;

            self.signature.add_assign(signature);

            Ok(())
        }
    }

    pub fn slot(&self) -> Slot {
        self.data.slot
    }
}
