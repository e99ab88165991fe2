//! Request and response types for the Web3Signer remote-signing API.
//!
//! A request always carries the `signingRoot`. The duty pre-image travels alongside so that a
//! full Web3Signer can recompute and verify the root; the reference server in `remote_signer`
//! reads only the root.

use serde::{Deserialize, Serialize, Serializer};
use types::*;

#[derive(Debug, PartialEq, Copy, Clone, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    AggregationSlot,
    AggregateAndProof,
    Attestation,
    BlockV2,
    RandaoReveal,
    VoluntaryExit,
    SyncCommitteeMessage,
    SyncCommitteeSelectionProof,
    SyncCommitteeContributionAndProof,
    ValidatorRegistration,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct ForkInfo {
    pub fork: Fork,
    pub genesis_validators_root: Hash256,
}

fn serialize_fork_name<S: Serializer>(fork_name: &ForkName, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&fork_name.to_string().to_uppercase())
}

#[derive(Debug, PartialEq, Serialize)]
pub enum Web3SignerObject<'a> {
    #[serde(rename = "aggregation_slot")]
    AggregationSlot { slot: Slot },
    #[serde(rename = "aggregate_and_proof")]
    AggregateAndProof(&'a AggregateAndProof),
    #[serde(rename = "attestation")]
    Attestation(&'a AttestationData),
    #[serde(rename = "beacon_block")]
    BeaconBlock {
        #[serde(serialize_with = "serialize_fork_name")]
        version: ForkName,
        block_header: &'a BeaconBlockHeader,
    },
    #[serde(rename = "randao_reveal")]
    RandaoReveal { epoch: Epoch },
    #[serde(rename = "voluntary_exit")]
    VoluntaryExit(&'a VoluntaryExit),
    #[serde(rename = "sync_committee_message")]
    SyncCommitteeMessage {
        beacon_block_root: Hash256,
        slot: Slot,
    },
    #[serde(rename = "sync_aggregator_selection_data")]
    SyncAggregatorSelectionData(&'a SyncAggregatorSelectionData),
    #[serde(rename = "contribution_and_proof")]
    ContributionAndProof(&'a ContributionAndProof),
    #[serde(rename = "validator_registration")]
    ValidatorRegistration(&'a ValidatorRegistrationData),
}

impl<'a> Web3SignerObject<'a> {
    pub fn message_type(&self) -> MessageType {
        match self {
            Web3SignerObject::AggregationSlot { .. } => MessageType::AggregationSlot,
            Web3SignerObject::AggregateAndProof(_) => MessageType::AggregateAndProof,
            Web3SignerObject::Attestation(_) => MessageType::Attestation,
            Web3SignerObject::BeaconBlock { .. } => MessageType::BlockV2,
            Web3SignerObject::RandaoReveal { .. } => MessageType::RandaoReveal,
            Web3SignerObject::VoluntaryExit(_) => MessageType::VoluntaryExit,
            Web3SignerObject::SyncCommitteeMessage { .. } => MessageType::SyncCommitteeMessage,
            Web3SignerObject::SyncAggregatorSelectionData(_) => {
                MessageType::SyncCommitteeSelectionProof
            }
            Web3SignerObject::ContributionAndProof(_) => {
                MessageType::SyncCommitteeContributionAndProof
            }
            Web3SignerObject::ValidatorRegistration(_) => MessageType::ValidatorRegistration,
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct SigningRequest<'a> {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fork_info: Option<ForkInfo>,
    #[serde(rename = "signingRoot")]
    pub signing_root: Hash256,
    #[serde(flatten)]
    pub object: Web3SignerObject<'a>,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct SigningResponse {
    pub signature: Signature,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn block_request_shape() {
        let header = BeaconBlockHeader {
            slot: Slot::new(7),
            proposer_index: 3,
            parent_root: Hash256::repeat_byte(1),
            state_root: Hash256::repeat_byte(2),
            body_root: Hash256::repeat_byte(3),
        };
        let request = SigningRequest {
            message_type: MessageType::BlockV2,
            fork_info: Some(ForkInfo {
                fork: Fork::default(),
                genesis_validators_root: Hash256::zero(),
            }),
            signing_root: Hash256::repeat_byte(0xaa),
            object: Web3SignerObject::BeaconBlock {
                version: ForkName::Capella,
                block_header: &header,
            },
        };

        let json: Value = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "BLOCK_V2");
        assert_eq!(json["signingRoot"], format!("{:?}", Hash256::repeat_byte(0xaa)));
        assert_eq!(json["beacon_block"]["version"], "CAPELLA");
        assert_eq!(json["beacon_block"]["block_header"]["slot"], "7");
        assert!(json.get("fork_info").is_some());
    }

    #[test]
    fn registration_omits_fork_info() {
        let data = ValidatorRegistrationData {
            fee_recipient: Address::repeat_byte(0x42),
            gas_limit: 30_000_000,
            timestamp: 1,
            pubkey: PublicKeyBytes::empty(),
        };
        let object = Web3SignerObject::ValidatorRegistration(&data);
        let request = SigningRequest {
            message_type: object.message_type(),
            fork_info: None,
            signing_root: Hash256::zero(),
            object,
        };

        let json: Value = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "VALIDATOR_REGISTRATION");
        assert!(json.get("fork_info").is_none());
        assert!(json.get("validator_registration").is_some());
    }
}
