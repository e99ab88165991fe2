//! The "Doppelganger" service is an **imperfect** mechanism to try and prevent the validator client
//! from starting whilst any of its validators are actively producing messages on the network.
//!
//! Each newly registered validator is held back from signing for a number of epochs. During that
//! time its liveness is reported to this service (by whatever polls the beacon node); if any
//! liveness report shows the validator was active, signing stays disabled permanently and the
//! operator must intervene.
//!
//! This service only gates signing. Fetching liveness data is left to the caller.

use parking_lot::RwLock;
use slog::{crit, info, Logger};
use std::collections::HashMap;
use types::{Epoch, PublicKeyBytes};

/// The number of epochs that must be checked before we assume that there are no other duplicate
/// validators on the network.
pub const DEFAULT_REMAINING_DETECTION_EPOCHS: u64 = 1;

/// A single liveness observation for a validator.
#[derive(Debug, Clone, PartialEq)]
pub struct LivenessResponseData {
    pub pubkey: PublicKeyBytes,
    pub epoch: Epoch,
    pub is_live: bool,
}

/// Whether or not a validator is permitted to sign.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DoppelgangerStatus {
    /// Doppelganger protection has approved this validator for signing.
    SigningEnabled,
    /// Doppelganger protection is still running for this validator, or has detected it live.
    SigningDisabled,
    /// The validator was never registered with this service.
    UnknownToDoppelganger,
}

struct DoppelgangerState {
    /// The first epoch for which liveness data is still expected.
    next_check_epoch: Epoch,
    /// The number of clean epochs still required before signing is enabled.
    remaining_epochs: u64,
    /// Set once the validator is seen live elsewhere. Never cleared.
    detected: bool,
}

impl DoppelgangerState {
    fn requires_further_checks(&self) -> bool {
        self.detected || self.remaining_epochs > 0
    }
}

pub struct DoppelgangerService {
    doppelganger_states: RwLock<HashMap<PublicKeyBytes, DoppelgangerState>>,
    detection_epochs: u64,
    log: Logger,
}

impl DoppelgangerService {
    pub fn new(log: Logger) -> Self {
        Self::with_detection_epochs(DEFAULT_REMAINING_DETECTION_EPOCHS, log)
    }

    pub fn with_detection_epochs(detection_epochs: u64, log: Logger) -> Self {
        Self {
            doppelganger_states: <_>::default(),
            detection_epochs,
            log,
        }
    }

    /// Begin monitoring `validator` from the epoch after `current_epoch`.
    ///
    /// Re-registering a known validator is a no-op, so a detected doppelganger stays blocked.
    pub fn register_new_validator(&self, validator: PublicKeyBytes, current_epoch: Epoch) {
        let mut states = self.doppelganger_states.write();
        if states.contains_key(&validator) {
            return;
        }

        states.insert(
            validator,
            DoppelgangerState {
                next_check_epoch: current_epoch + 1,
                remaining_epochs: self.detection_epochs,
                detected: false,
            },
        );

        info!(
            self.log,
            "Monitoring validator for doppelgangers";
            "validator" => ?validator,
            "remaining_epochs" => self.detection_epochs,
        );
    }

    pub fn validator_status(&self, validator: PublicKeyBytes) -> DoppelgangerStatus {
        self.doppelganger_states
            .read()
            .get(&validator)
            .map(|state| {
                if state.requires_further_checks() {
                    DoppelgangerStatus::SigningDisabled
                } else {
                    DoppelgangerStatus::SigningEnabled
                }
            })
            .unwrap_or(DoppelgangerStatus::UnknownToDoppelganger)
    }

    /// Returns `Some(true)` if `validator` may sign, `Some(false)` if it may not and `None` if it
    /// is unknown to the service.
    pub fn validator_should_sign(&self, validator: PublicKeyBytes) -> Option<bool> {
        match self.validator_status(validator) {
            DoppelgangerStatus::SigningEnabled => Some(true),
            DoppelgangerStatus::SigningDisabled => Some(false),
            DoppelgangerStatus::UnknownToDoppelganger => None,
        }
    }

    /// Apply liveness observations.
    ///
    /// Any observation of a monitored validator being live disables it permanently. Each clean
    /// observation for the expected epoch moves the validator one epoch closer to signing.
    pub fn process_liveness(&self, responses: &[LivenessResponseData]) {
        let mut states = self.doppelganger_states.write();

        for response in responses {
            let state = match states.get_mut(&response.pubkey) {
                Some(state) => state,
                None => continue,
            };

            if response.is_live && state.remaining_epochs > 0 {
                state.detected = true;
                crit!(
                    self.log,
                    "Doppelganger(s) detected";
                    "msg" => "A doppelganger occurs when two different validator clients run the \
                        same public key. This validator client detected another instance of a local \
                        validator on the network and is refusing to sign for it.",
                    "validator" => ?response.pubkey,
                    "epoch" => response.epoch,
                );
            } else if !response.is_live && response.epoch >= state.next_check_epoch {
                state.next_check_epoch = response.epoch + 1;
                state.remaining_epochs = state.remaining_epochs.saturating_sub(1);

                if !state.requires_further_checks() {
                    info!(
                        self.log,
                        "Found no doppelganger";
                        "msg" => "Signing is now enabled for this validator.",
                        "validator" => ?response.pubkey,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logging::test_logger;
    use types::test_utils::generate_deterministic_keypair;

    fn liveness(pubkey: PublicKeyBytes, epoch: u64, is_live: bool) -> LivenessResponseData {
        LivenessResponseData {
            pubkey,
            epoch: Epoch::new(epoch),
            is_live,
        }
    }

    #[test]
    fn unknown_validator() {
        let service = DoppelgangerService::new(test_logger());
        let pubkey = generate_deterministic_keypair(0).pk.compress();
        assert_eq!(
            service.validator_status(pubkey),
            DoppelgangerStatus::UnknownToDoppelganger
        );
        assert_eq!(service.validator_should_sign(pubkey), None);
    }

    #[test]
    fn clean_epochs_enable_signing() {
        let service = DoppelgangerService::with_detection_epochs(2, test_logger());
        let pubkey = generate_deterministic_keypair(0).pk.compress();
        service.register_new_validator(pubkey, Epoch::new(10));
        assert_eq!(service.validator_should_sign(pubkey), Some(false));

        // Observations for the registration epoch do not count.
        service.process_liveness(&[liveness(pubkey, 10, false)]);
        assert_eq!(service.validator_should_sign(pubkey), Some(false));

        service.process_liveness(&[liveness(pubkey, 11, false)]);
        assert_eq!(service.validator_should_sign(pubkey), Some(false));

        // Repeated observations of the same epoch do not count twice.
        service.process_liveness(&[liveness(pubkey, 11, false)]);
        assert_eq!(service.validator_should_sign(pubkey), Some(false));

        service.process_liveness(&[liveness(pubkey, 12, false)]);
        assert_eq!(service.validator_should_sign(pubkey), Some(true));
    }

    #[test]
    fn detection_is_permanent() {
        let service = DoppelgangerService::new(test_logger());
        let pubkey = generate_deterministic_keypair(0).pk.compress();
        let other = generate_deterministic_keypair(1).pk.compress();
        service.register_new_validator(pubkey, Epoch::new(0));
        service.register_new_validator(other, Epoch::new(0));

        service.process_liveness(&[liveness(pubkey, 1, true), liveness(other, 1, false)]);
        assert_eq!(service.validator_should_sign(pubkey), Some(false));
        assert_eq!(service.validator_should_sign(other), Some(true));

        service.process_liveness(&[liveness(pubkey, 2, false)]);
        service.register_new_validator(pubkey, Epoch::new(5));
        assert_eq!(service.validator_should_sign(pubkey), Some(false));
    }
}
