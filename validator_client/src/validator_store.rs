use crate::{
    doppelganger_service::DoppelgangerService,
    http_metrics::metrics,
    initialized_validators::{
        Error as InitializedValidatorsError, InitializedValidators, ValidatorDefinition,
    },
    signing_method::{Error as SigningError, SignableMessage, SigningContext, SigningMethod},
};
use parking_lot::{Mutex, RwLock};
use reqwest::Client;
use slashing_protection::{
    interchange::Interchange, InterchangeError, InterchangeImportOutcome, NotSafe, Safe,
    SlashingDatabase,
};
use slog::{crit, error, info, warn, Logger};
use slot_clock::SlotClock;
use std::collections::HashMap;
use std::sync::Arc;
use types::{
    attestation::Error as AttestationError, AggregateAndProof, ApplicationDomain, Attestation,
    BeaconBlockHeader, ChainSpec, ContributionAndProof, Domain, Epoch, Fork, Hash256, Keypair,
    PublicKeyBytes, Signature, SignedAggregateAndProof, SignedBeaconBlockHeader,
    SignedContributionAndProof, SignedValidatorRegistrationData, SignedVoluntaryExit, Slot,
    SyncAggregatorSelectionData, SyncCommitteeContribution, SyncCommitteeMessage,
    ValidatorRegistrationData, VoluntaryExit,
};
use url::Url;

#[derive(Debug, PartialEq)]
pub enum Error {
    DoppelgangerProtected(PublicKeyBytes),
    UnknownToDoppelgangerService(PublicKeyBytes),
    UnknownPubkey(PublicKeyBytes),
    Slashable(NotSafe),
    GreaterThanCurrentSlot { slot: Slot, current_slot: Slot },
    GreaterThanCurrentEpoch { epoch: Epoch, current_epoch: Epoch },
    UnableToSignAttestation(AttestationError),
    UnableToSign(SigningError),
    SlashingProtection(NotSafe),
    InvalidRemoteUrl(String),
}

impl From<SigningError> for Error {
    fn from(e: SigningError) -> Self {
        Error::UnableToSign(e)
    }
}

/// The result of adding a key through the key manager.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyImportOutcome {
    Imported,
    /// The key was already managed; nothing was changed.
    Duplicate,
}

/// Number of epochs of slashing protection history to keep.
///
/// This acts as a maximum safe-guard against clock drift.
const SLASHING_PROTECTION_HISTORY_EPOCHS: u64 = 512;

pub struct ValidatorStore<T> {
    validators: Arc<RwLock<InitializedValidators>>,
    slashing_protection: SlashingDatabase,
    slashing_protection_last_prune: Arc<Mutex<Epoch>>,
    /// One lock per key, held from the slashing check until the signature is produced.
    signing_locks: Mutex<HashMap<PublicKeyBytes, Arc<tokio::sync::Mutex<()>>>>,
    genesis_validators_root: Hash256,
    spec: Arc<ChainSpec>,
    log: Logger,
    doppelganger_service: Option<Arc<DoppelgangerService>>,
    slot_clock: T,
    /// Client shared by every remote signer, carrying the configured request timeout.
    http_client: Client,
}

impl<T: SlotClock + 'static> ValidatorStore<T> {
    pub fn new(
        slashing_protection: SlashingDatabase,
        genesis_validators_root: Hash256,
        spec: Arc<ChainSpec>,
        doppelganger_service: Option<Arc<DoppelgangerService>>,
        slot_clock: T,
        http_client: Client,
        log: Logger,
    ) -> Self {
        Self {
            validators: Arc::new(RwLock::new(InitializedValidators::new(log.clone()))),
            slashing_protection,
            slashing_protection_last_prune: Arc::new(Mutex::new(Epoch::new(0))),
            signing_locks: <_>::default(),
            genesis_validators_root,
            spec,
            log,
            doppelganger_service,
            slot_clock,
            http_client,
        }
    }

    pub fn initialized_validators(&self) -> Arc<RwLock<InitializedValidators>> {
        self.validators.clone()
    }

    pub fn slot_clock(&self) -> &T {
        &self.slot_clock
    }

    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    pub fn genesis_validators_root(&self) -> Hash256 {
        self.genesis_validators_root
    }

    pub fn slashing_protection(&self) -> &SlashingDatabase {
        &self.slashing_protection
    }

    pub fn num_voting_validators(&self) -> usize {
        self.validators.read().num_enabled()
    }

    /// Returns all voting pubkeys for all enabled validators, regardless of doppelganger status.
    pub fn voting_pubkeys(&self) -> Vec<PublicKeyBytes> {
        self.validators.read().iter_voting_pubkeys().copied().collect()
    }

    pub fn validator_index(&self, pubkey: &PublicKeyBytes) -> Option<u64> {
        self.validators.read().get_index(pubkey)
    }

    pub fn set_validator_index(&self, pubkey: &PublicKeyBytes, index: u64) {
        self.validators.write().set_index(pubkey, index)
    }

    fn current_epoch(&self) -> Epoch {
        self.slot_clock
            .now_or_genesis()
            .unwrap_or_else(|| self.slot_clock.genesis_slot())
            .epoch(self.spec.slots_per_epoch)
    }

    fn fork(&self, epoch: Epoch) -> Fork {
        self.spec.fork_at_epoch(epoch)
    }

    fn signing_context(&self, domain: Domain, signing_epoch: Epoch) -> SigningContext {
        SigningContext {
            domain,
            epoch: signing_epoch,
            fork: self.fork(signing_epoch),
            genesis_validators_root: self.genesis_validators_root,
        }
    }

    /// Returns the lock that serializes guarded signing for `validator_pubkey`.
    fn signing_lock(&self, validator_pubkey: &PublicKeyBytes) -> Arc<tokio::sync::Mutex<()>> {
        self.signing_locks
            .lock()
            .entry(*validator_pubkey)
            .or_default()
            .clone()
    }

    /// Returns `Ok(())` if the doppelganger service permits `validator_pubkey` to sign.
    fn doppelganger_protection_allows_signing(
        &self,
        validator_pubkey: &PublicKeyBytes,
    ) -> Result<(), Error> {
        if let Some(doppelganger_service) = &self.doppelganger_service {
            match doppelganger_service.validator_should_sign(*validator_pubkey) {
                Some(true) => Ok(()),
                Some(false) => Err(Error::DoppelgangerProtected(*validator_pubkey)),
                None => Err(Error::UnknownToDoppelgangerService(*validator_pubkey)),
            }
        } else {
            Ok(())
        }
    }

    /// Returns the `SigningMethod` for `validator_pubkey`, after consulting doppelganger
    /// protection.
    ///
    /// The method is returned behind an `Arc` so that no lock on `self.validators` is held while
    /// signing.
    fn doppelganger_checked_signing_method(
        &self,
        validator_pubkey: &PublicKeyBytes,
    ) -> Result<Arc<SigningMethod>, Error> {
        self.doppelganger_protection_allows_signing(validator_pubkey)?;
        self.doppelganger_bypassed_signing_method(validator_pubkey)
    }

    /// Returns the `SigningMethod` for `validator_pubkey` without consulting doppelganger
    /// protection.
    ///
    /// Only for messages that cannot be slashed and that are useful before doppelganger detection
    /// completes (builder registrations and exits).
    fn doppelganger_bypassed_signing_method(
        &self,
        validator_pubkey: &PublicKeyBytes,
    ) -> Result<Arc<SigningMethod>, Error> {
        self.validators
            .read()
            .signing_method(validator_pubkey)
            .ok_or(Error::UnknownPubkey(*validator_pubkey))
    }

    pub async fn randao_reveal(
        &self,
        validator_pubkey: PublicKeyBytes,
        signing_epoch: Epoch,
    ) -> Result<Signature, Error> {
        let signing_method = self.doppelganger_checked_signing_method(&validator_pubkey)?;
        let signing_context = self.signing_context(Domain::Randao, signing_epoch);

        let signature = signing_method
            .get_signature(
                SignableMessage::RandaoReveal(signing_epoch),
                signing_context,
                &self.spec,
            )
            .await?;

        metrics::inc_counter_vec(&metrics::SIGNED_RANDAO_REVEALS_TOTAL, &[metrics::SUCCESS]);

        Ok(signature)
    }

    pub async fn sign_block(
        &self,
        validator_pubkey: PublicKeyBytes,
        block: BeaconBlockHeader,
        current_slot: Slot,
    ) -> Result<SignedBeaconBlockHeader, Error> {
        // Make sure the block slot is not higher than the current slot to avoid potential attacks.
        if block.slot > current_slot {
            warn!(
                self.log,
                "Not signing block with slot greater than current slot";
                "block_slot" => block.slot.as_u64(),
                "current_slot" => current_slot.as_u64()
            );
            return Err(Error::GreaterThanCurrentSlot {
                slot: block.slot,
                current_slot,
            });
        }

        let signing_epoch = block.slot.epoch(self.spec.slots_per_epoch);
        let signing_context = self.signing_context(Domain::BeaconProposer, signing_epoch);
        let domain_hash = signing_context.domain_hash(&self.spec);

        let signing_method = self.doppelganger_checked_signing_method(&validator_pubkey)?;

        let signing_lock = self.signing_lock(&validator_pubkey);
        let _guard = signing_lock.lock().await;

        // Check for slashing conditions.
        let slashing_status = self.slashing_protection.check_and_insert_block_proposal(
            &validator_pubkey,
            &block,
            domain_hash,
        );

        match slashing_status {
            // We can safely sign this block without slashing.
            Ok(Safe::Valid) | Ok(Safe::SameData) => {
                let signature = signing_method
                    .get_signature(
                        SignableMessage::BeaconBlock(&block),
                        signing_context,
                        &self.spec,
                    )
                    .await
                    .map_err(|e| self.signing_failed(&metrics::SIGNED_BLOCKS_TOTAL, e))?;
                metrics::inc_counter_vec(&metrics::SIGNED_BLOCKS_TOTAL, &[metrics::SUCCESS]);

                Ok(SignedBeaconBlockHeader {
                    message: block,
                    signature,
                })
            }
            Err(NotSafe::UnregisteredValidator(pk)) => {
                warn!(
                    self.log,
                    "Not signing block for unregistered validator";
                    "msg" => "the key must be imported before it can sign",
                    "public_key" => format!("{:?}", pk)
                );
                metrics::inc_counter_vec(&metrics::SIGNED_BLOCKS_TOTAL, &[metrics::UNREGISTERED]);
                Err(Error::Slashable(NotSafe::UnregisteredValidator(pk)))
            }
            Err(NotSafe::DisabledValidator(pk)) => {
                warn!(
                    self.log,
                    "Not signing block for disabled validator";
                    "public_key" => format!("{:?}", pk)
                );
                metrics::inc_counter_vec(&metrics::SIGNED_BLOCKS_TOTAL, &[metrics::DISABLED]);
                Err(Error::Slashable(NotSafe::DisabledValidator(pk)))
            }
            Err(e) => {
                crit!(
                    self.log,
                    "Not signing slashable block";
                    "public_key" => format!("{:?}", validator_pubkey),
                    "slot" => block.slot,
                    "offense" => ?e.offense(),
                    "error" => format!("{:?}", e)
                );
                metrics::inc_counter_vec(&metrics::SIGNED_BLOCKS_TOTAL, &[metrics::SLASHABLE]);
                Err(Error::Slashable(e))
            }
        }
    }

    pub async fn sign_attestation(
        &self,
        validator_pubkey: PublicKeyBytes,
        validator_committee_position: usize,
        attestation: &mut Attestation,
        current_epoch: Epoch,
    ) -> Result<(), Error> {
        // Make sure the target epoch is not higher than the current epoch.
        if attestation.data.target.epoch > current_epoch {
            return Err(Error::GreaterThanCurrentEpoch {
                epoch: attestation.data.target.epoch,
                current_epoch,
            });
        }

        let signing_epoch = attestation.data.target.epoch;
        let signing_context = self.signing_context(Domain::BeaconAttester, signing_epoch);
        let domain_hash = signing_context.domain_hash(&self.spec);

        let signing_method = self.doppelganger_checked_signing_method(&validator_pubkey)?;

        let signing_lock = self.signing_lock(&validator_pubkey);
        let _guard = signing_lock.lock().await;

        // Checking for slashing conditions.
        let slashing_status = self.slashing_protection.check_and_insert_attestation(
            &validator_pubkey,
            &attestation.data,
            domain_hash,
        );

        match slashing_status {
            // We can safely sign this attestation. Re-signing identical data is never slashable.
            Ok(safe @ Safe::Valid) | Ok(safe @ Safe::SameData) => {
                let signature = signing_method
                    .get_signature(
                        SignableMessage::AttestationData(&attestation.data),
                        signing_context,
                        &self.spec,
                    )
                    .await
                    .map_err(|e| self.signing_failed(&metrics::SIGNED_ATTESTATIONS_TOTAL, e))?;
                attestation
                    .add_signature(&signature, validator_committee_position)
                    .map_err(Error::UnableToSignAttestation)?;

                let label = if safe == Safe::SameData {
                    metrics::SAME_DATA
                } else {
                    metrics::SUCCESS
                };
                metrics::inc_counter_vec(&metrics::SIGNED_ATTESTATIONS_TOTAL, &[label]);

                Ok(())
            }
            Err(NotSafe::UnregisteredValidator(pk)) => {
                warn!(
                    self.log,
                    "Not signing attestation for unregistered validator";
                    "msg" => "the key must be imported before it can sign",
                    "public_key" => format!("{:?}", pk)
                );
                metrics::inc_counter_vec(
                    &metrics::SIGNED_ATTESTATIONS_TOTAL,
                    &[metrics::UNREGISTERED],
                );
                Err(Error::Slashable(NotSafe::UnregisteredValidator(pk)))
            }
            Err(NotSafe::DisabledValidator(pk)) => {
                warn!(
                    self.log,
                    "Not signing attestation for disabled validator";
                    "public_key" => format!("{:?}", pk)
                );
                metrics::inc_counter_vec(&metrics::SIGNED_ATTESTATIONS_TOTAL, &[metrics::DISABLED]);
                Err(Error::Slashable(NotSafe::DisabledValidator(pk)))
            }
            Err(e) => {
                crit!(
                    self.log,
                    "Not signing slashable attestation";
                    "public_key" => format!("{:?}", validator_pubkey),
                    "source_epoch" => attestation.data.source.epoch,
                    "target_epoch" => attestation.data.target.epoch,
                    "offense" => ?e.offense(),
                    "attestation" => format!("{:?}", attestation.data),
                    "error" => format!("{:?}", e)
                );
                metrics::inc_counter_vec(
                    &metrics::SIGNED_ATTESTATIONS_TOTAL,
                    &[metrics::SLASHABLE],
                );
                Err(Error::Slashable(e))
            }
        }
    }

    fn signing_failed(
        &self,
        counter: &metrics::Result<metrics::IntCounterVec>,
        e: SigningError,
    ) -> Error {
        error!(
            self.log,
            "Unable to obtain signature";
            "unavailable" => e.is_unavailable(),
            "error" => ?e,
        );
        metrics::inc_counter_vec(counter, &[metrics::REMOTE_SIGNER_ERROR]);
        Error::UnableToSign(e)
    }

    pub async fn sign_voluntary_exit(
        &self,
        validator_pubkey: PublicKeyBytes,
        voluntary_exit: VoluntaryExit,
    ) -> Result<SignedVoluntaryExit, Error> {
        let signing_epoch = voluntary_exit.epoch;
        let signing_context = self.signing_context(Domain::VoluntaryExit, signing_epoch);
        let signing_method = self.doppelganger_bypassed_signing_method(&validator_pubkey)?;

        let signature = signing_method
            .get_signature(
                SignableMessage::VoluntaryExit(&voluntary_exit),
                signing_context,
                &self.spec,
            )
            .await?;

        metrics::inc_counter_vec(&metrics::SIGNED_VOLUNTARY_EXITS_TOTAL, &[metrics::SUCCESS]);

        Ok(SignedVoluntaryExit {
            message: voluntary_exit,
            signature,
        })
    }

    pub async fn sign_validator_registration_data(
        &self,
        validator_registration_data: ValidatorRegistrationData,
    ) -> Result<SignedValidatorRegistrationData, Error> {
        let domain = Domain::ApplicationMask(ApplicationDomain::Builder);
        // The builder domain ignores the fork, so any epoch will do.
        let signing_context = self.signing_context(domain, Epoch::new(0));

        let signature = self
            .doppelganger_bypassed_signing_method(&validator_registration_data.pubkey)?
            .get_signature(
                SignableMessage::ValidatorRegistration(&validator_registration_data),
                signing_context,
                &self.spec,
            )
            .await?;

        metrics::inc_counter_vec(
            &metrics::SIGNED_VALIDATOR_REGISTRATIONS_TOTAL,
            &[metrics::SUCCESS],
        );

        Ok(SignedValidatorRegistrationData {
            message: validator_registration_data,
            signature,
        })
    }

    /// Signs an `AggregateAndProof` for a given validator.
    ///
    /// The resulting `SignedAggregateAndProof` is sent on the aggregation channel and cannot be
    /// modified by actors other than the signing validator.
    pub async fn produce_signed_aggregate_and_proof(
        &self,
        validator_pubkey: PublicKeyBytes,
        aggregator_index: u64,
        aggregate: Attestation,
        selection_proof: Signature,
    ) -> Result<SignedAggregateAndProof, Error> {
        let signing_epoch = aggregate.data.target.epoch;
        let signing_context = self.signing_context(Domain::AggregateAndProof, signing_epoch);

        let message = AggregateAndProof {
            aggregator_index,
            aggregate,
            selection_proof,
        };

        let signing_method = self.doppelganger_checked_signing_method(&validator_pubkey)?;
        let signature = signing_method
            .get_signature(
                SignableMessage::SignedAggregateAndProof(&message),
                signing_context,
                &self.spec,
            )
            .await?;

        metrics::inc_counter_vec(&metrics::SIGNED_AGGREGATES_TOTAL, &[metrics::SUCCESS]);

        Ok(SignedAggregateAndProof { message, signature })
    }

    /// Produces a selection proof for the `slot`, signed by with corresponding secret key to
    /// `validator_pubkey`.
    pub async fn produce_selection_proof(
        &self,
        validator_pubkey: PublicKeyBytes,
        slot: Slot,
    ) -> Result<Signature, Error> {
        let signing_epoch = slot.epoch(self.spec.slots_per_epoch);
        let signing_context = self.signing_context(Domain::SelectionProof, signing_epoch);

        // Bypass the `with_validator_signing_method` function.
        //
        // This is because we don't care about doppelganger protection when it comes to selection
        // proofs. They are not slashable and we need them to subscribe to subnets on the BN.
        //
        // As long as we disallow `SignedAggregateAndProof` then these selection proofs will never
        // be published on the network.
        let signing_method = self.doppelganger_bypassed_signing_method(&validator_pubkey)?;

        let signature = signing_method
            .get_signature(
                SignableMessage::SelectionProof(slot),
                signing_context,
                &self.spec,
            )
            .await?;

        metrics::inc_counter_vec(&metrics::SIGNED_SELECTION_PROOFS_TOTAL, &[metrics::SUCCESS]);

        Ok(signature)
    }

    /// Produce a `SyncSelectionProof` for `slot` signed by the secret key of `validator_pubkey`.
    pub async fn produce_sync_selection_proof(
        &self,
        validator_pubkey: &PublicKeyBytes,
        slot: Slot,
        subcommittee_index: u64,
    ) -> Result<Signature, Error> {
        let signing_epoch = slot.epoch(self.spec.slots_per_epoch);
        let signing_context =
            self.signing_context(Domain::SyncCommitteeSelectionProof, signing_epoch);

        // Bypass `with_validator_signing_method`: sync committee messages are not slashable.
        let signing_method = self.doppelganger_bypassed_signing_method(validator_pubkey)?;

        let message = SyncAggregatorSelectionData {
            slot,
            subcommittee_index,
        };

        let signature = signing_method
            .get_signature(
                SignableMessage::SyncSelectionProof(&message),
                signing_context,
                &self.spec,
            )
            .await?;

        metrics::inc_counter_vec(
            &metrics::SIGNED_SYNC_SELECTION_PROOFS_TOTAL,
            &[metrics::SUCCESS],
        );

        Ok(signature)
    }

    pub async fn produce_sync_committee_signature(
        &self,
        slot: Slot,
        beacon_block_root: Hash256,
        validator_index: u64,
        validator_pubkey: &PublicKeyBytes,
    ) -> Result<SyncCommitteeMessage, Error> {
        let signing_epoch = slot.epoch(self.spec.slots_per_epoch);
        let signing_context = self.signing_context(Domain::SyncCommittee, signing_epoch);

        // Bypass `with_validator_signing_method`: sync committee messages are not slashable.
        let signing_method = self.doppelganger_bypassed_signing_method(validator_pubkey)?;

        let signature = signing_method
            .get_signature(
                SignableMessage::SyncCommitteeSignature {
                    beacon_block_root,
                    slot,
                },
                signing_context,
                &self.spec,
            )
            .await?;

        metrics::inc_counter_vec(
            &metrics::SIGNED_SYNC_COMMITTEE_MESSAGES_TOTAL,
            &[metrics::SUCCESS],
        );

        Ok(SyncCommitteeMessage {
            slot,
            beacon_block_root,
            validator_index,
            signature,
        })
    }

    pub async fn produce_signed_contribution_and_proof(
        &self,
        aggregator_index: u64,
        aggregator_pubkey: PublicKeyBytes,
        contribution: SyncCommitteeContribution,
        selection_proof: Signature,
    ) -> Result<SignedContributionAndProof, Error> {
        let signing_epoch = contribution.slot.epoch(self.spec.slots_per_epoch);
        let signing_context = self.signing_context(Domain::ContributionAndProof, signing_epoch);

        // Bypass `with_validator_signing_method`: sync committee messages are not slashable.
        let signing_method = self.doppelganger_bypassed_signing_method(&aggregator_pubkey)?;

        let message = ContributionAndProof {
            aggregator_index,
            contribution,
            selection_proof,
        };

        let signature = signing_method
            .get_signature(
                SignableMessage::SignedContributionAndProof(&message),
                signing_context,
                &self.spec,
            )
            .await?;

        metrics::inc_counter_vec(
            &metrics::SIGNED_SYNC_COMMITTEE_CONTRIBUTIONS_TOTAL,
            &[metrics::SUCCESS],
        );

        Ok(SignedContributionAndProof { message, signature })
    }

    /// Start managing a validator whose secret key is held in this process.
    ///
    /// The key is registered with the slashing protection database first, which re-enables it if
    /// it was previously removed. Existing signing history is never modified.
    pub fn import_local_key(&self, voting_keypair: Keypair) -> Result<KeyImportOutcome, Error> {
        let voting_public_key = voting_keypair.pk.compress();
        let added = {
            let mut validators = self.validators.write();
            if validators.contains(&voting_public_key) {
                return Ok(KeyImportOutcome::Duplicate);
            }
            self.register_with_slashing_protection(&voting_public_key)?;
            validators.add_local(voting_keypair)
        };
        self.finish_import(voting_public_key, added)
    }

    /// Start managing a validator whose signatures are produced by the remote signer at `url`.
    pub fn import_remote_key(
        &self,
        voting_public_key: PublicKeyBytes,
        url: Url,
    ) -> Result<KeyImportOutcome, Error> {
        let added = {
            let mut validators = self.validators.write();
            if validators.contains(&voting_public_key) {
                return Ok(KeyImportOutcome::Duplicate);
            }
            self.register_with_slashing_protection(&voting_public_key)?;
            validators
                .add_web3signer(voting_public_key, url, self.http_client.clone())
                .map_err(|e| match e {
                    InitializedValidatorsError::InvalidWeb3SignerUrl(e) => {
                        Error::InvalidRemoteUrl(e)
                    }
                })?
        };
        self.finish_import(voting_public_key, added)
    }

    fn register_with_slashing_protection(&self, pubkey: &PublicKeyBytes) -> Result<(), Error> {
        self.slashing_protection
            .register_validator(*pubkey)
            .map_err(Error::SlashingProtection)
    }

    fn finish_import(
        &self,
        voting_public_key: PublicKeyBytes,
        added: bool,
    ) -> Result<KeyImportOutcome, Error> {
        if !added {
            // The key was already present in the table.
            return Ok(KeyImportOutcome::Duplicate);
        }

        if let Some(doppelganger_service) = &self.doppelganger_service {
            doppelganger_service.register_new_validator(voting_public_key, self.current_epoch());
        }

        metrics::set_gauge(
            &metrics::ENABLED_VALIDATORS_COUNT,
            self.num_voting_validators() as i64,
        );

        Ok(KeyImportOutcome::Imported)
    }

    /// Stop managing `pubkey`.
    ///
    /// Waits for any in-flight guarded signing for the key to finish, then disables it in the
    /// slashing protection database and removes the key. Its history is retained. Returns `false`
    /// if the key was not managed.
    pub async fn remove_key(&self, pubkey: &PublicKeyBytes) -> Result<bool, Error> {
        let signing_lock = self.signing_lock(pubkey);
        let guard = signing_lock.lock().await;

        // Disable and remove under one write lock so a concurrent import observes either the
        // managed key or the disabled record, never a half-removed key.
        let removed = {
            let mut validators = self.validators.write();
            if validators.contains(pubkey) {
                self.slashing_protection
                    .disable_validator(*pubkey)
                    .map_err(Error::SlashingProtection)?;
                validators.remove(pubkey);
                true
            } else {
                false
            }
        };

        drop(guard);
        self.release_signing_lock(pubkey, signing_lock);

        if removed {
            metrics::set_gauge(
                &metrics::ENABLED_VALIDATORS_COUNT,
                self.num_voting_validators() as i64,
            );
        }

        Ok(removed)
    }

    /// Drops the lock entry for `pubkey` unless another task still holds or awaits it.
    fn release_signing_lock(
        &self,
        pubkey: &PublicKeyBytes,
        signing_lock: Arc<tokio::sync::Mutex<()>>,
    ) {
        let mut signing_locks = self.signing_locks.lock();
        let unused = signing_locks.get(pubkey).map_or(false, |lock| {
            Arc::ptr_eq(lock, &signing_lock) && Arc::strong_count(lock) == 2
        });
        if unused {
            signing_locks.remove(pubkey);
        }
    }

    /// Returns the definition of every managed key, in import order.
    pub fn list_keys(&self) -> Vec<ValidatorDefinition> {
        self.validators.read().definitions().to_vec()
    }

    /// Export slashing protection data for `pubkeys`, or for every registered key if `None`.
    ///
    /// Removed (disabled) keys are included.
    pub fn export_slashing_protection(
        &self,
        pubkeys: Option<&[PublicKeyBytes]>,
    ) -> Result<Interchange, InterchangeError> {
        self.slashing_protection
            .export_interchange_info(self.genesis_validators_root, pubkeys)
    }

    /// Import EIP-3076 slashing protection data. Existing records are never relaxed.
    pub fn import_slashing_protection(
        &self,
        interchange: Interchange,
    ) -> Result<Vec<InterchangeImportOutcome>, InterchangeError> {
        self.slashing_protection
            .import_interchange_info(interchange, self.genesis_validators_root)
    }

    /// Prune the slashing protection database so that it remains performant.
    ///
    /// This function will only do actual pruning periodically, so it should usually be
    /// cheap to call. The `first_run` flag can be used to print a more verbose message when pruning
    /// runs.
    pub fn prune_slashing_protection_db(&self, current_epoch: Epoch, first_run: bool) {
        // Attempt to prune every SLASHING_PROTECTION_HISTORY_EPOCHs, with a tolerance for
        // missing the epoch that aligns exactly.
        let mut last_prune = self.slashing_protection_last_prune.lock();
        if current_epoch / SLASHING_PROTECTION_HISTORY_EPOCHS
            <= *last_prune / SLASHING_PROTECTION_HISTORY_EPOCHS
        {
            return;
        }

        if first_run {
            info!(
                self.log,
                "Pruning slashing protection DB";
                "epoch" => current_epoch,
                "msg" => "pruning may take several minutes the first time it runs"
            );
        } else {
            info!(self.log, "Pruning slashing protection DB"; "epoch" => current_epoch);
        }

        let _timer = metrics::start_timer(&metrics::SLASHING_PROTECTION_PRUNE_TIMES);

        let new_min_target_epoch = current_epoch.saturating_sub(SLASHING_PROTECTION_HISTORY_EPOCHS);
        let new_min_slot = new_min_target_epoch.start_slot(self.spec.slots_per_epoch);

        let all_pubkeys = self.voting_pubkeys();
        if let Err(e) = self
            .slashing_protection
            .prune_all_signed_attestations(all_pubkeys.iter(), new_min_target_epoch)
        {
            error!(
                self.log,
                "Error during pruning of signed attestations";
                "error" => ?e,
            );
            return;
        }

        if let Err(e) = self
            .slashing_protection
            .prune_all_signed_blocks(all_pubkeys.iter(), new_min_slot)
        {
            error!(
                self.log,
                "Error during pruning of signed blocks";
                "error" => ?e,
            );
            return;
        }

        *last_prune = current_epoch;

        info!(self.log, "Completed pruning of slashing protection DB");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doppelganger_service::LivenessResponseData;
    use logging::test_logger;
    use slashing_protection::{InvalidAttestation, InvalidBlock, SlashableOffense};
    use slot_clock::TestingSlotClock;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use types::test_utils::generate_deterministic_keypair;
    use types::{Checkpoint, AttestationData, SignedRoot};

    struct Tester {
        store: Arc<ValidatorStore<TestingSlotClock>>,
        _dir: TempDir,
    }

    fn tester_with(doppelganger_service: Option<Arc<DoppelgangerService>>) -> Tester {
        let dir = tempdir().unwrap();
        let db = SlashingDatabase::create(&dir.path().join("slashing.sqlite")).unwrap();
        let spec = Arc::new(ChainSpec::minimal());
        let slot_clock =
            TestingSlotClock::new(Slot::new(0), Duration::from_secs(0), Duration::from_secs(1));
        let store = ValidatorStore::new(
            db,
            Hash256::repeat_byte(0x42),
            spec,
            doppelganger_service,
            slot_clock,
            Client::new(),
            test_logger(),
        );
        Tester {
            store: Arc::new(store),
            _dir: dir,
        }
    }

    fn tester() -> Tester {
        tester_with(None)
    }

    fn attestation(source: u64, target: u64) -> Attestation {
        let data = AttestationData {
            slot: Slot::new(target * 8),
            index: 0,
            beacon_block_root: Hash256::repeat_byte(1),
            source: Checkpoint {
                epoch: Epoch::new(source),
                root: Hash256::zero(),
            },
            target: Checkpoint {
                epoch: Epoch::new(target),
                root: Hash256::zero(),
            },
        };
        Attestation::empty_for_signing(4, data).unwrap()
    }

    fn header(slot: u64) -> BeaconBlockHeader {
        BeaconBlockHeader {
            slot: Slot::new(slot),
            proposer_index: 0,
            parent_root: Hash256::zero(),
            state_root: Hash256::zero(),
            body_root: Hash256::repeat_byte(slot as u8),
        }
    }

    #[tokio::test]
    async fn unknown_pubkey() {
        let tester = tester();
        let pubkey = generate_deterministic_keypair(0).pk.compress();
        assert_eq!(
            tester.store.randao_reveal(pubkey, Epoch::new(0)).await,
            Err(Error::UnknownPubkey(pubkey))
        );
    }

    #[tokio::test]
    async fn block_signature_verifies() {
        let tester = tester();
        let keypair = generate_deterministic_keypair(0);
        let pubkey = keypair.pk.compress();
        assert_eq!(
            tester.store.import_local_key(keypair.clone()),
            Ok(KeyImportOutcome::Imported)
        );

        let signed = tester
            .store
            .sign_block(pubkey, header(3), Slot::new(3))
            .await
            .unwrap();

        let spec = tester.store.spec();
        let domain = spec.get_domain(
            Epoch::new(0),
            Domain::BeaconProposer,
            &spec.fork_at_epoch(Epoch::new(0)),
            tester.store.genesis_validators_root(),
        );
        assert!(signed
            .signature
            .verify(&keypair.pk, header(3).signing_root(domain)));
    }

    #[tokio::test]
    async fn block_guard() {
        let tester = tester();
        let keypair = generate_deterministic_keypair(0);
        let pubkey = keypair.pk.compress();
        tester.store.import_local_key(keypair).unwrap();

        tester
            .store
            .sign_block(pubkey, header(5), Slot::new(10))
            .await
            .unwrap();

        // Equal slot is refused even for identical data.
        let err = tester
            .store
            .sign_block(pubkey, header(5), Slot::new(10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Slashable(NotSafe::InvalidBlock(InvalidBlock::DoubleBlockProposal(_)))
        ));

        let err = tester
            .store
            .sign_block(pubkey, header(4), Slot::new(10))
            .await
            .unwrap_err();
        match err {
            Error::Slashable(not_safe) => {
                assert_eq!(not_safe.offense(), Some(SlashableOffense::DoubleProposal))
            }
            e => panic!("unexpected error: {:?}", e),
        }

        assert_eq!(
            tester
                .store
                .sign_block(pubkey, header(11), Slot::new(10))
                .await,
            Err(Error::GreaterThanCurrentSlot {
                slot: Slot::new(11),
                current_slot: Slot::new(10),
            })
        );
    }

    #[tokio::test]
    async fn attestation_guard() {
        let tester = tester();
        let keypair = generate_deterministic_keypair(0);
        let pubkey = keypair.pk.compress();
        tester.store.import_local_key(keypair).unwrap();

        let current_epoch = Epoch::new(20);

        let mut first = attestation(2, 10);
        tester
            .store
            .sign_attestation(pubkey, 0, &mut first, current_epoch)
            .await
            .unwrap();

        // Identical data is signed again.
        let mut again = attestation(2, 10);
        tester
            .store
            .sign_attestation(pubkey, 1, &mut again, current_epoch)
            .await
            .unwrap();
        assert_eq!(first.signature, again.signature);

        let mut surrounded = attestation(3, 9);
        let err = tester
            .store
            .sign_attestation(pubkey, 0, &mut surrounded, current_epoch)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::Slashable(NotSafe::InvalidAttestation(
                InvalidAttestation::PrevSurroundsNew {
                    prev: slashing_protection::SignedAttestation::new(
                        Epoch::new(2),
                        Epoch::new(10),
                        first.data.signing_root(tester_domain(&tester, 10)).into(),
                    )
                }
            ))
        );

        let mut future = attestation(2, 21);
        assert_eq!(
            tester
                .store
                .sign_attestation(pubkey, 0, &mut future, current_epoch)
                .await,
            Err(Error::GreaterThanCurrentEpoch {
                epoch: Epoch::new(21),
                current_epoch,
            })
        );
    }

    fn tester_domain(tester: &Tester, epoch: u64) -> Hash256 {
        let spec = tester.store.spec();
        spec.get_domain(
            Epoch::new(epoch),
            Domain::BeaconAttester,
            &spec.fork_at_epoch(Epoch::new(epoch)),
            tester.store.genesis_validators_root(),
        )
    }

    #[tokio::test]
    async fn remove_and_reimport_preserves_history() {
        let tester = tester();
        let keypair = generate_deterministic_keypair(0);
        let pubkey = keypair.pk.compress();
        tester.store.import_local_key(keypair.clone()).unwrap();

        let mut att = attestation(0, 1);
        tester
            .store
            .sign_attestation(pubkey, 0, &mut att, Epoch::new(1))
            .await
            .unwrap();

        assert_eq!(tester.store.remove_key(&pubkey).await, Ok(true));
        assert_eq!(tester.store.remove_key(&pubkey).await, Ok(false));
        assert!(tester.store.list_keys().is_empty());

        let mut att = attestation(0, 1);
        assert_eq!(
            tester
                .store
                .sign_attestation(pubkey, 0, &mut att, Epoch::new(1))
                .await,
            Err(Error::UnknownPubkey(pubkey))
        );

        // History survives removal and is exportable.
        let interchange = tester.store.export_slashing_protection(Some(&[pubkey])).unwrap();
        assert_eq!(interchange.data.len(), 1);
        assert_eq!(interchange.data[0].signed_attestations.len(), 1);

        assert_eq!(
            tester.store.import_local_key(keypair),
            Ok(KeyImportOutcome::Imported)
        );
        let mut conflicting = attestation(0, 0);
        let err = tester
            .store
            .sign_attestation(pubkey, 0, &mut conflicting, Epoch::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Slashable(NotSafe::InvalidAttestation(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn import_racing_remove_leaves_key_usable() {
        let tester = tester();
        let keypair = generate_deterministic_keypair(0);
        let pubkey = keypair.pk.compress();

        for round in 1..=50u64 {
            // Either outcome is fine, the key just needs to be managed before the race.
            tester.store.import_local_key(keypair.clone()).unwrap();

            let remover = {
                let store = tester.store.clone();
                tokio::spawn(async move { store.remove_key(&pubkey).await })
            };
            let importer = {
                let store = tester.store.clone();
                let keypair = keypair.clone();
                tokio::task::spawn_blocking(move || store.import_local_key(keypair))
            };
            remover.await.unwrap().unwrap();
            importer.await.unwrap().unwrap();

            let managed = tester
                .store
                .list_keys()
                .iter()
                .any(|definition| definition.voting_public_key == pubkey);
            if managed {
                // A managed key is never left with a disabled record.
                tester
                    .store
                    .sign_block(pubkey, header(round), Slot::new(round))
                    .await
                    .unwrap();
            }
        }
    }

    #[tokio::test]
    async fn remove_releases_signing_lock() {
        let tester = tester();
        let keypair = generate_deterministic_keypair(0);
        let pubkey = keypair.pk.compress();
        tester.store.import_local_key(keypair).unwrap();

        tester
            .store
            .sign_block(pubkey, header(1), Slot::new(1))
            .await
            .unwrap();
        assert_eq!(tester.store.signing_locks.lock().len(), 1);

        assert_eq!(tester.store.remove_key(&pubkey).await, Ok(true));
        assert!(tester.store.signing_locks.lock().is_empty());

        let unknown = generate_deterministic_keypair(1).pk.compress();
        assert_eq!(tester.store.remove_key(&unknown).await, Ok(false));
        assert!(tester.store.signing_locks.lock().is_empty());
    }

    #[tokio::test]
    async fn duplicate_import() {
        let tester = tester();
        let keypair = generate_deterministic_keypair(0);
        let pubkey = keypair.pk.compress();
        let url = Url::parse("http://localhost:1").unwrap();

        assert_eq!(
            tester.store.import_local_key(keypair.clone()),
            Ok(KeyImportOutcome::Imported)
        );
        assert_eq!(
            tester.store.import_local_key(keypair),
            Ok(KeyImportOutcome::Duplicate)
        );
        assert_eq!(
            tester.store.import_remote_key(pubkey, url),
            Ok(KeyImportOutcome::Duplicate)
        );
        assert_eq!(tester.store.num_voting_validators(), 1);
    }

    #[tokio::test]
    async fn doppelganger_gate() {
        let service = Arc::new(DoppelgangerService::new(test_logger()));
        let tester = tester_with(Some(service.clone()));
        let keypair = generate_deterministic_keypair(0);
        let pubkey = keypair.pk.compress();
        tester.store.import_local_key(keypair).unwrap();

        assert_eq!(
            tester.store.randao_reveal(pubkey, Epoch::new(0)).await,
            Err(Error::DoppelgangerProtected(pubkey))
        );
        // Selection proofs are not gated.
        tester
            .store
            .produce_selection_proof(pubkey, Slot::new(0))
            .await
            .unwrap();

        service.process_liveness(&[LivenessResponseData {
            pubkey,
            epoch: Epoch::new(1),
            is_live: false,
        }]);
        tester
            .store
            .randao_reveal(pubkey, Epoch::new(0))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn concurrent_conflicting_attestations() {
        let tester = tester();
        let keypair = generate_deterministic_keypair(0);
        let pubkey = keypair.pk.compress();
        tester.store.import_local_key(keypair).unwrap();

        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let store = tester.store.clone();
                tokio::spawn(async move {
                    // Same target, different block roots: at most one may be signed.
                    let mut att = attestation(0, 1);
                    att.data.beacon_block_root = Hash256::from_low_u64_be(i + 1);
                    store.sign_attestation(pubkey, 0, &mut att, Epoch::new(1)).await
                })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn pruning_keeps_latest() {
        let tester = tester();
        let keypair = generate_deterministic_keypair(0);
        let pubkey = keypair.pk.compress();
        tester.store.import_local_key(keypair).unwrap();

        for target in [1, 2, 3] {
            let mut att = attestation(target - 1, target);
            tester
                .store
                .sign_attestation(pubkey, 0, &mut att, Epoch::new(target))
                .await
                .unwrap();
        }

        tester
            .store
            .prune_slashing_protection_db(Epoch::new(SLASHING_PROTECTION_HISTORY_EPOCHS + 10), true);

        let interchange = tester.store.export_slashing_protection(None).unwrap();
        let attestations = &interchange.data[0].signed_attestations;
        assert_eq!(attestations.len(), 1);
        assert_eq!(attestations[0].target_epoch, Epoch::new(3));
    }
}
