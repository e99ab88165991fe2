//! Provides management of "initialized" validators.
//!
//! A validator is "initialized" if it is ready for signing blocks, attestations, etc in this
//! validator client.
//!
//! The `InitializedValidators` struct in this file serves as the source-of-truth of which
//! validators are managed by this validator client. Definitions are held in memory only; keys are
//! supplied at runtime through the key manager.

use crate::signing_method::{web3signer_signing_url, SigningMethod};
use reqwest::Client;
use slog::{info, Logger};
use std::collections::HashMap;
use std::sync::Arc;
use types::{Keypair, PublicKeyBytes};
use url::Url;

#[derive(Debug, PartialEq)]
pub enum Error {
    /// The base URL of a remote signer could not be extended into a signing URL.
    InvalidWeb3SignerUrl(String),
}

/// Describes how a validator produces its signatures.
#[derive(Debug, Clone, PartialEq)]
pub enum SigningDefinition {
    /// The secret key is held in this process.
    LocalKeypair,
    /// Signing is delegated to a Web3Signer-compatible server at `url`.
    Web3Signer { url: Url },
}

impl SigningDefinition {
    pub fn is_local_keypair(&self) -> bool {
        matches!(self, SigningDefinition::LocalKeypair)
    }
}

/// A validator known to this client, in the order it was added.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorDefinition {
    pub voting_public_key: PublicKeyBytes,
    pub signing_definition: SigningDefinition,
}

/// A validator that is ready to sign messages.
pub struct InitializedValidator {
    signing_method: Arc<SigningMethod>,
    /// The validator's index in the beacon state, once known.
    index: Option<u64>,
}

/// A set of validators, each ready to produce signatures.
pub struct InitializedValidators {
    /// Definitions in insertion order, used for listing.
    definitions: Vec<ValidatorDefinition>,
    /// The canonical set of validators.
    validators: HashMap<PublicKeyBytes, InitializedValidator>,
    log: Logger,
}

impl InitializedValidators {
    pub fn new(log: Logger) -> Self {
        Self {
            definitions: vec![],
            validators: HashMap::new(),
            log,
        }
    }

    /// The count of validators that may sign.
    pub fn num_enabled(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Iterate through all voting public keys in `self`.
    pub fn iter_voting_pubkeys(&self) -> impl Iterator<Item = &PublicKeyBytes> {
        self.definitions.iter().map(|def| &def.voting_public_key)
    }

    /// Returns the definitions of all managed validators, in insertion order.
    pub fn definitions(&self) -> &[ValidatorDefinition] {
        &self.definitions
    }

    /// Returns `true` if `voting_public_key` is managed by this client.
    pub fn contains(&self, voting_public_key: &PublicKeyBytes) -> bool {
        self.validators.contains_key(voting_public_key)
    }

    /// Returns the `SigningMethod` for `voting_public_key`, if that validator is known.
    pub fn signing_method(&self, voting_public_key: &PublicKeyBytes) -> Option<Arc<SigningMethod>> {
        self.validators
            .get(voting_public_key)
            .map(|v| v.signing_method.clone())
    }

    pub fn get_index(&self, voting_public_key: &PublicKeyBytes) -> Option<u64> {
        self.validators.get(voting_public_key).and_then(|v| v.index)
    }

    /// Record the beacon-state index of a managed validator. Unknown keys are ignored.
    pub fn set_index(&mut self, voting_public_key: &PublicKeyBytes, index: u64) {
        if let Some(validator) = self.validators.get_mut(voting_public_key) {
            validator.index = Some(index);
        }
    }

    /// Start managing a validator whose secret key is held locally.
    ///
    /// Returns `false` without modifying `self` if the key is already managed.
    pub fn add_local(&mut self, voting_keypair: Keypair) -> bool {
        let voting_public_key = voting_keypair.pk.compress();
        if self.contains(&voting_public_key) {
            return false;
        }

        let signing_method = SigningMethod::LocalKeypair {
            voting_keypair: Arc::new(voting_keypair),
        };
        self.insert(
            voting_public_key,
            SigningDefinition::LocalKeypair,
            signing_method,
        );

        info!(
            self.log,
            "Enabled validator";
            "signing_method" => "local_keypair",
            "voting_pubkey" => format!("{:?}", voting_public_key),
        );
        true
    }

    /// Start managing a validator whose signatures come from a Web3Signer instance at `url`.
    ///
    /// Returns `Ok(false)` without modifying `self` if the key is already managed.
    pub fn add_web3signer(
        &mut self,
        voting_public_key: PublicKeyBytes,
        url: Url,
        http_client: Client,
    ) -> Result<bool, Error> {
        if self.contains(&voting_public_key) {
            return Ok(false);
        }

        let signing_url = web3signer_signing_url(&url, &voting_public_key)
            .map_err(Error::InvalidWeb3SignerUrl)?;
        let signing_method = SigningMethod::Web3Signer {
            signing_url,
            http_client,
            voting_public_key,
        };
        self.insert(
            voting_public_key,
            SigningDefinition::Web3Signer { url: url.clone() },
            signing_method,
        );

        info!(
            self.log,
            "Enabled validator";
            "signing_method" => "remote_signer",
            "url" => %url,
            "voting_pubkey" => format!("{:?}", voting_public_key),
        );
        Ok(true)
    }

    fn insert(
        &mut self,
        voting_public_key: PublicKeyBytes,
        signing_definition: SigningDefinition,
        signing_method: SigningMethod,
    ) {
        self.definitions.push(ValidatorDefinition {
            voting_public_key,
            signing_definition,
        });
        self.validators.insert(
            voting_public_key,
            InitializedValidator {
                signing_method: Arc::new(signing_method),
                index: None,
            },
        );
    }

    /// Stop managing `voting_public_key`, returning its definition if it was known.
    ///
    /// In-flight signing operations hold their own reference to the `SigningMethod` and are
    /// allowed to complete.
    pub fn remove(&mut self, voting_public_key: &PublicKeyBytes) -> Option<ValidatorDefinition> {
        self.validators.remove(voting_public_key)?;
        let position = self
            .definitions
            .iter()
            .position(|def| def.voting_public_key == *voting_public_key)?;
        let definition = self.definitions.remove(position);

        info!(
            self.log,
            "Removed validator";
            "voting_pubkey" => format!("{:?}", voting_public_key),
        );
        Some(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logging::test_logger;
    use types::test_utils::generate_deterministic_keypair;

    #[test]
    fn add_and_remove() {
        let mut validators = InitializedValidators::new(test_logger());
        let local = generate_deterministic_keypair(0);
        let remote = generate_deterministic_keypair(1).pk.compress();
        let url = Url::parse("http://localhost:9000").unwrap();

        assert!(validators.add_local(local.clone()));
        assert!(!validators.add_local(local.clone()));
        assert_eq!(
            validators.add_web3signer(remote, url.clone(), Client::new()),
            Ok(true)
        );
        assert_eq!(
            validators.add_web3signer(remote, url.clone(), Client::new()),
            Ok(false)
        );

        let pubkeys: Vec<_> = validators.iter_voting_pubkeys().copied().collect();
        assert_eq!(pubkeys, vec![local.pk.compress(), remote]);
        assert_eq!(validators.num_enabled(), 2);

        let removed = validators.remove(&remote).unwrap();
        assert_eq!(removed.signing_definition, SigningDefinition::Web3Signer { url });
        assert!(validators.remove(&remote).is_none());
        assert!(validators.signing_method(&remote).is_none());
        assert_eq!(validators.num_enabled(), 1);
    }

    #[test]
    fn index_is_set_only_for_known_keys() {
        let mut validators = InitializedValidators::new(test_logger());
        let keypair = generate_deterministic_keypair(2);
        let pubkey = keypair.pk.compress();

        validators.set_index(&pubkey, 4);
        assert_eq!(validators.get_index(&pubkey), None);

        validators.add_local(keypair);
        validators.set_index(&pubkey, 4);
        assert_eq!(validators.get_index(&pubkey), Some(4));
    }
}
