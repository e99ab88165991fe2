//! BLS12-381 signatures as used by the Ethereum consensus layer, backed by `blst`.
//!
//! Only the "minimal public key" variant is supported (48 byte public keys, 96 byte signatures).

#[macro_use]
mod macros;
mod aggregate_signature;
mod keypair;
mod public_key;
mod public_key_bytes;
mod secret_hash;
mod secret_key;
mod signature;

pub use aggregate_signature::{AggregateSignature, INFINITY_SIGNATURE};
pub use keypair::Keypair;
pub use public_key::{PublicKey, PUBLIC_KEY_BYTES_LEN};
pub use public_key_bytes::PublicKeyBytes;
pub use secret_hash::SecretHash;
pub use secret_key::{SecretKey, SECRET_KEY_BYTES_LEN};
pub use signature::{Signature, SIGNATURE_BYTES_LEN};

use blst::BLST_ERROR;

pub type Hash256 = ethereum_types::H256;

/// Domain separation tag for the proof-of-possession ciphersuite.
pub const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// An error was raised from the `blst` library.
    BlstError(BLST_ERROR),
    /// The provided bytes were an incorrect length.
    InvalidByteLength { got: usize, expected: usize },
    /// The provided secret key bytes were an incorrect length.
    InvalidSecretKeyLength { got: usize, expected: usize },
    /// The provided hex string could not be decoded.
    InvalidHex(String),
}

impl From<BLST_ERROR> for Error {
    fn from(e: BLST_ERROR) -> Error {
        Error::BlstError(e)
    }
}
