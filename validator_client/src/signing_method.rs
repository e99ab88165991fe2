//! Provides methods for obtaining validator signatures, including:
//!
//! - Via a local `Keypair`.
//! - Via a remote signer (Web3Signer)

use crate::http_metrics::metrics;
use reqwest::{header::ACCEPT, Client, StatusCode};
use std::sync::Arc;
use types::*;
use url::Url;
use web3signer::{ForkInfo, SigningRequest, SigningResponse};

pub use web3signer::{MessageType, Web3SignerObject};

mod web3signer;

/// Path of the remote signing endpoint, relative to the signer's base URL.
pub const WEB3SIGNER_SIGN_PATH: [&str; 4] = ["api", "v1", "eth2", "sign"];

#[derive(Debug, PartialEq)]
pub enum Error {
    /// The remote signer could not be reached, or did not respond in time.
    RemoteSignerUnavailable(String),
    /// The remote signer answered with a non-200 status.
    RemoteSignerRejected { status: u16, message: String },
    /// The remote signer answered 200 with a body that is not a signature.
    ProtocolDecodeError(String),
    TokioJoin(String),
}

impl Error {
    /// Returns `true` if the remote signer could not produce any answer for the request.
    ///
    /// A malformed response is counted as unavailability since no signature was obtained.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Error::RemoteSignerUnavailable(_) | Error::ProtocolDecodeError(_)
        )
    }
}

/// Enumerates all messages that can be signed by a validator.
pub enum SignableMessage<'a> {
    RandaoReveal(Epoch),
    BeaconBlock(&'a BeaconBlockHeader),
    AttestationData(&'a AttestationData),
    SignedAggregateAndProof(&'a AggregateAndProof),
    SelectionProof(Slot),
    SyncSelectionProof(&'a SyncAggregatorSelectionData),
    SyncCommitteeSignature {
        beacon_block_root: Hash256,
        slot: Slot,
    },
    SignedContributionAndProof(&'a ContributionAndProof),
    ValidatorRegistration(&'a ValidatorRegistrationData),
    VoluntaryExit(&'a VoluntaryExit),
}

impl<'a> SignableMessage<'a> {
    /// Returns the `SignedRoot` for the contained message.
    ///
    /// The actual `SignedRoot` trait is not used since it also requires a `TreeHash` impl, which is
    /// not required here.
    pub fn signing_root(&self, domain: Hash256) -> Hash256 {
        match self {
            SignableMessage::RandaoReveal(epoch) => epoch.signing_root(domain),
            SignableMessage::BeaconBlock(b) => b.signing_root(domain),
            SignableMessage::AttestationData(a) => a.signing_root(domain),
            SignableMessage::SignedAggregateAndProof(a) => a.signing_root(domain),
            SignableMessage::SelectionProof(slot) => slot.signing_root(domain),
            SignableMessage::SyncSelectionProof(s) => s.signing_root(domain),
            SignableMessage::SyncCommitteeSignature {
                beacon_block_root, ..
            } => beacon_block_root.signing_root(domain),
            SignableMessage::SignedContributionAndProof(c) => c.signing_root(domain),
            SignableMessage::ValidatorRegistration(v) => v.signing_root(domain),
            SignableMessage::VoluntaryExit(exit) => exit.signing_root(domain),
        }
    }

    fn web3signer_object(&self, spec: &ChainSpec) -> Web3SignerObject<'a> {
        match *self {
            SignableMessage::RandaoReveal(epoch) => Web3SignerObject::RandaoReveal { epoch },
            SignableMessage::BeaconBlock(block_header) => Web3SignerObject::BeaconBlock {
                version: spec.fork_name_at_epoch(block_header.slot.epoch(spec.slots_per_epoch)),
                block_header,
            },
            SignableMessage::AttestationData(a) => Web3SignerObject::Attestation(a),
            SignableMessage::SignedAggregateAndProof(a) => Web3SignerObject::AggregateAndProof(a),
            SignableMessage::SelectionProof(slot) => Web3SignerObject::AggregationSlot { slot },
            SignableMessage::SyncSelectionProof(s) => {
                Web3SignerObject::SyncAggregatorSelectionData(s)
            }
            SignableMessage::SyncCommitteeSignature {
                beacon_block_root,
                slot,
            } => Web3SignerObject::SyncCommitteeMessage {
                beacon_block_root,
                slot,
            },
            SignableMessage::SignedContributionAndProof(c) => {
                Web3SignerObject::ContributionAndProof(c)
            }
            SignableMessage::ValidatorRegistration(v) => Web3SignerObject::ValidatorRegistration(v),
            SignableMessage::VoluntaryExit(e) => Web3SignerObject::VoluntaryExit(e),
        }
    }
}

/// A method used by a validator to sign messages.
pub enum SigningMethod {
    /// A validator whose secret key is held in this process.
    LocalKeypair { voting_keypair: Arc<Keypair> },
    /// A validator that defers to a Web3Signer server for signing.
    ///
    /// See: https://docs.web3signer.consensys.net/en/latest/
    Web3Signer {
        signing_url: Url,
        http_client: Client,
        voting_public_key: PublicKeyBytes,
    },
}

/// The additional information used to construct a signature. Mostly used for protection from replay
/// attacks.
pub struct SigningContext {
    pub domain: Domain,
    pub epoch: Epoch,
    pub fork: Fork,
    pub genesis_validators_root: Hash256,
}

impl SigningContext {
    /// Returns the `Hash256` to be mixed-in with the signature.
    pub fn domain_hash(&self, spec: &ChainSpec) -> Hash256 {
        match self.domain {
            Domain::ApplicationMask(_) => spec.get_builder_domain(),
            // EIP-7044: exits are signed across the Capella fork version from Deneb onwards.
            Domain::VoluntaryExit if spec.fork_name_at_epoch(self.epoch).deneb_enabled() => spec
                .compute_domain(
                    Domain::VoluntaryExit,
                    spec.capella_fork_version,
                    self.genesis_validators_root,
                ),
            _ => spec.get_domain(
                self.epoch,
                self.domain,
                &self.fork,
                self.genesis_validators_root,
            ),
        }
    }
}

/// Returns the URL used to request signatures for `voting_public_key` from a Web3Signer
/// instance at `base_url`.
pub fn web3signer_signing_url(
    base_url: &Url,
    voting_public_key: &PublicKeyBytes,
) -> Result<Url, String> {
    let mut signing_url = base_url.clone();
    signing_url
        .path_segments_mut()
        .map_err(|()| format!("URL cannot be a base: {}", base_url))?
        .pop_if_empty()
        .extend(WEB3SIGNER_SIGN_PATH)
        .push(&voting_public_key.as_hex_string());
    Ok(signing_url)
}

impl SigningMethod {
    /// Return the signature of `signable_message`, with respect to the `signing_context`.
    pub async fn get_signature(
        &self,
        signable_message: SignableMessage<'_>,
        signing_context: SigningContext,
        spec: &ChainSpec,
    ) -> Result<Signature, Error> {
        let domain_hash = signing_context.domain_hash(spec);
        let signing_root = signable_message.signing_root(domain_hash);

        match self {
            SigningMethod::LocalKeypair { voting_keypair } => {
                let _timer =
                    metrics::start_timer_vec(&metrics::SIGNING_TIMES, &[metrics::LOCAL_KEYSTORE]);

                let voting_keypair = voting_keypair.clone();
                // Spawn a blocking task to produce the signature. This avoids blocking the core
                // tokio executor.
                let signature =
                    tokio::task::spawn_blocking(move || voting_keypair.sk.sign(signing_root))
                        .await
                        .map_err(|e| Error::TokioJoin(e.to_string()))?;
                Ok(signature)
            }
            SigningMethod::Web3Signer {
                signing_url,
                http_client,
                ..
            } => {
                let _timer =
                    metrics::start_timer_vec(&metrics::SIGNING_TIMES, &[metrics::WEB3SIGNER]);

                let object = signable_message.web3signer_object(spec);
                let message_type = object.message_type();

                // Builder messages are signed across the genesis fork, so they carry no fork info.
                let fork_info = if message_type == MessageType::ValidatorRegistration {
                    None
                } else {
                    Some(ForkInfo {
                        fork: signing_context.fork,
                        genesis_validators_root: signing_context.genesis_validators_root,
                    })
                };

                let request = SigningRequest {
                    message_type,
                    fork_info,
                    signing_root,
                    object,
                };

                // Request a signature from the Web3Signer instance via HTTP(S).
                let response = http_client
                    .post(signing_url.clone())
                    .header(ACCEPT, "application/json")
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| Error::RemoteSignerUnavailable(e.to_string()))?;

                let status = response.status();
                let body = response
                    .text()
                    .await
                    .map_err(|e| Error::RemoteSignerUnavailable(e.to_string()))?;

                if status != StatusCode::OK {
                    return Err(Error::RemoteSignerRejected {
                        status: status.as_u16(),
                        message: body,
                    });
                }

                parse_signature_response(&body)
            }
        }
    }
}

/// Parse a signature from a Web3Signer response body.
///
/// Web3Signer answers with `{"signature": "0x.."}` when JSON is accepted, and with the bare hex
/// signature otherwise. Both are understood.
fn parse_signature_response(body: &str) -> Result<Signature, Error> {
    match serde_json::from_str::<SigningResponse>(body) {
        Ok(response) => Ok(response.signature),
        Err(json_error) => body.trim().parse::<Signature>().map_err(|e| {
            Error::ProtocolDecodeError(format!("json: {:?}, hex: {:?}", json_error, e))
        }),
    }
}
