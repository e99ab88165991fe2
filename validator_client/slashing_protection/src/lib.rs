mod extra_interchange_tests;
pub mod interchange;
mod registration_tests;
mod signed_attestation;
mod signed_block;
mod slashing_database;
pub mod test_utils;

pub use crate::signed_attestation::{InvalidAttestation, SignedAttestation};
pub use crate::signed_block::{InvalidBlock, SignedBlock};
pub use crate::slashing_database::{
    InterchangeError, InterchangeImportOutcome, SlashingDatabase, ValidatorSummary,
    SUPPORTED_INTERCHANGE_FORMAT_VERSION,
};
use rusqlite::Error as SQLError;
use std::fmt::Display;
use std::io::{Error as IOError, ErrorKind};
use types::{Hash256, PublicKeyBytes};

/// The filename within the `validators` directory that contains the slashing protection DB.
pub const SLASHING_PROTECTION_FILENAME: &str = "slashing_protection.sqlite";

/// The attestation or block is not safe to sign.
///
/// This could be because it's slashable, or because an error occurred.
#[derive(PartialEq, Debug, Clone)]
pub enum NotSafe {
    UnregisteredValidator(PublicKeyBytes),
    DisabledValidator(PublicKeyBytes),
    InvalidBlock(InvalidBlock),
    InvalidAttestation(InvalidAttestation),
    PermissionsError,
    IOError(ErrorKind),
    SQLError(String),
    SQLPoolError(String),
    ConsistencyError,
}

/// The attestation or block is safe to sign, and will not cause the signer to be slashed.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum Safe {
    /// Casting the exact same data (block or attestation) twice is never slashable.
    SameData,
    /// Incoming data is safe from slashing, and is not a duplicate.
    Valid,
}

/// The class of slashable offence that a rejected message would have committed.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum SlashableOffense {
    DoubleProposal,
    DoubleVote,
    SurroundVote,
}

impl NotSafe {
    /// Classify a rejection as a slashable offence.
    ///
    /// Returns `None` for rejections that are not slashing-related, such as unknown validators,
    /// malformed attestations or database errors.
    pub fn offense(&self) -> Option<SlashableOffense> {
        match self {
            NotSafe::InvalidBlock(_) => Some(SlashableOffense::DoubleProposal),
            NotSafe::InvalidAttestation(invalid) => invalid.offense(),
            NotSafe::UnregisteredValidator(_)
            | NotSafe::DisabledValidator(_)
            | NotSafe::PermissionsError
            | NotSafe::IOError(_)
            | NotSafe::SQLError(_)
            | NotSafe::SQLPoolError(_)
            | NotSafe::ConsistencyError => None,
        }
    }
}

/// A signing root that may be the zero hash, in which case it is treated as "unknown".
///
/// Null signing roots appear when importing interchange data without roots, or when the
/// database synthesises a record that stands in for many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SigningRoot(Hash256);

impl From<Hash256> for SigningRoot {
    fn from(hash: Hash256) -> Self {
        SigningRoot(hash)
    }
}

impl SigningRoot {
    pub fn is_null(&self) -> bool {
        self.0.is_zero()
    }

    pub fn to_hash256_raw(self) -> Hash256 {
        self.0
    }

    /// Returns `None` for the null signing root.
    pub fn to_hash256(self) -> Option<Hash256> {
        Some(self.0).filter(|_| !self.is_null())
    }
}

/// Safely parse a `SigningRoot` from the given `column` of an SQLite `row`.
///
/// A missing (`NULL`) column is read as the null signing root.
fn signing_root_from_row(column: usize, row: &rusqlite::Row) -> rusqlite::Result<SigningRoot> {
    use rusqlite::{types::Type, Error};

    let bytes: Option<Vec<u8>> = row.get(column)?;
    match bytes {
        None => Ok(SigningRoot::default()),
        Some(bytes) if bytes.len() == 32 => Ok(SigningRoot::from(Hash256::from_slice(&bytes))),
        Some(bytes) => Err(Error::FromSqlConversionFailure(
            column,
            Type::Blob,
            Box::from(format!("Invalid length for Hash256: {}", bytes.len())),
        )),
    }
}

impl From<IOError> for NotSafe {
    fn from(error: IOError) -> NotSafe {
        NotSafe::IOError(error.kind())
    }
}

impl From<SQLError> for NotSafe {
    fn from(error: SQLError) -> NotSafe {
        NotSafe::SQLError(error.to_string())
    }
}

impl From<r2d2::Error> for NotSafe {
    fn from(error: r2d2::Error) -> Self {
        // Use `Display` impl to print "timed out waiting for connection"
        NotSafe::SQLPoolError(format!("{}", error))
    }
}

impl Display for NotSafe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{Epoch, Slot};

    #[test]
    fn offense_classification() {
        let block = SignedBlock::new(Slot::new(1), SigningRoot::default());
        let att = SignedAttestation::new(Epoch::new(0), Epoch::new(1), SigningRoot::default());

        let cases = vec![
            (
                NotSafe::InvalidBlock(InvalidBlock::DoubleBlockProposal(block.clone())),
                Some(SlashableOffense::DoubleProposal),
            ),
            (
                NotSafe::InvalidBlock(InvalidBlock::SlotViolatesLowerBound {
                    block_slot: Slot::new(0),
                    bound_slot: Slot::new(1),
                }),
                Some(SlashableOffense::DoubleProposal),
            ),
            (
                NotSafe::InvalidAttestation(InvalidAttestation::DoubleVote(att.clone())),
                Some(SlashableOffense::DoubleVote),
            ),
            (
                NotSafe::InvalidAttestation(InvalidAttestation::TargetLessThanOrEqLowerBound {
                    target_epoch: Epoch::new(0),
                    bound_epoch: Epoch::new(1),
                }),
                Some(SlashableOffense::DoubleVote),
            ),
            (
                NotSafe::InvalidAttestation(InvalidAttestation::PrevSurroundsNew {
                    prev: att.clone(),
                }),
                Some(SlashableOffense::SurroundVote),
            ),
            (
                NotSafe::InvalidAttestation(InvalidAttestation::NewSurroundsPrev { prev: att }),
                Some(SlashableOffense::SurroundVote),
            ),
            (
                NotSafe::InvalidAttestation(InvalidAttestation::SourceExceedsTarget),
                None,
            ),
            (
                NotSafe::UnregisteredValidator(PublicKeyBytes::empty()),
                None,
            ),
            (NotSafe::SQLError("oops".into()), None),
        ];

        for (not_safe, expected) in cases {
            assert_eq!(not_safe.offense(), expected, "{:?}", not_safe);
        }
    }

    #[test]
    fn null_signing_root() {
        assert!(SigningRoot::default().is_null());
        assert_eq!(SigningRoot::default().to_hash256(), None);
        let root = Hash256::repeat_byte(1);
        assert_eq!(SigningRoot::from(root).to_hash256(), Some(root));
    }
}
