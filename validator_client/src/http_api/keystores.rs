//! Implementation of the standard keystore management API for locally held keys.
use crate::{initialized_validators::SigningDefinition, ValidatorStore};
use eth2::lighthouse_vc::std_types::{
    DeleteKeystoreStatus, DeleteKeystoresRequest, DeleteKeystoresResponse, ListKeystoresResponse,
    SingleKeystoreResponse, Status,
};
use slog::{info, warn, Logger};
use slot_clock::SlotClock;
use std::sync::Arc;
use types::PublicKeyBytes;
use warp::Rejection;
use warp_utils::reject::custom_server_error;

pub fn list<T: SlotClock + 'static>(
    validator_store: Arc<ValidatorStore<T>>,
) -> ListKeystoresResponse {
    let keystores = validator_store
        .list_keys()
        .into_iter()
        .filter(|def| def.signing_definition.is_local_keypair())
        .map(|def| SingleKeystoreResponse {
            validating_pubkey: def.voting_public_key,
            derivation_path: None,
            readonly: None,
        })
        .collect();

    ListKeystoresResponse { data: keystores }
}

pub async fn delete<T: SlotClock + 'static>(
    request: DeleteKeystoresRequest,
    validator_store: Arc<ValidatorStore<T>>,
    log: Logger,
) -> Result<DeleteKeystoresResponse, Rejection> {
    let mut statuses = Vec::with_capacity(request.pubkeys.len());
    let mut export_pubkeys = vec![];

    for pubkey in &request.pubkeys {
        let status = match delete_single_keystore(pubkey, &validator_store).await {
            Ok(status) => Status::ok(status),
            Err(error) => {
                warn!(
                    log,
                    "Error deleting keystore";
                    "pubkey" => ?pubkey,
                    "error" => ?error,
                );
                Status::error(DeleteKeystoreStatus::Error, error)
            }
        };

        if matches!(
            status.status,
            DeleteKeystoreStatus::Deleted | DeleteKeystoreStatus::NotActive
        ) {
            export_pubkeys.push(*pubkey);
        }
        statuses.push(status);
    }

    // Export history for every key that has some, including keys this client never managed.
    let slashing_protection = validator_store
        .export_slashing_protection(Some(&export_pubkeys))
        .map_err(|e| {
            custom_server_error(format!("error exporting slashing protection: {:?}", e))
        })?;

    info!(
        log,
        "Deleted keystores via standard HTTP API";
        "count" => statuses
            .iter()
            .filter(|status| status.status == DeleteKeystoreStatus::Deleted)
            .count(),
    );

    Ok(DeleteKeystoresResponse {
        data: statuses,
        slashing_protection,
    })
}

async fn delete_single_keystore<T: SlotClock + 'static>(
    pubkey: &PublicKeyBytes,
    validator_store: &ValidatorStore<T>,
) -> Result<DeleteKeystoreStatus, String> {
    let is_local = validator_store
        .list_keys()
        .iter()
        .find(|def| def.voting_public_key == *pubkey)
        .map(|def| def.signing_definition == SigningDefinition::LocalKeypair);

    match is_local {
        Some(true) => {
            if validator_store
                .remove_key(pubkey)
                .await
                .map_err(|e| format!("{:?}", e))?
            {
                Ok(DeleteKeystoreStatus::Deleted)
            } else {
                // Removed concurrently by another request.
                slashing_history_status(pubkey, validator_store)
            }
        }
        // Remote keys are managed through the remotekeys endpoints.
        Some(false) => Ok(DeleteKeystoreStatus::NotFound),
        None => slashing_history_status(pubkey, validator_store),
    }
}

/// Status for a key that is not managed: `NotActive` if slashing protection data exists for it.
fn slashing_history_status<T: SlotClock + 'static>(
    pubkey: &PublicKeyBytes,
    validator_store: &ValidatorStore<T>,
) -> Result<DeleteKeystoreStatus, String> {
    match validator_store.slashing_protection().is_registered(pubkey) {
        Ok(true) => Ok(DeleteKeystoreStatus::NotActive),
        Ok(false) => Ok(DeleteKeystoreStatus::NotFound),
        Err(e) => Err(format!("error reading slashing protection: {:?}", e)),
    }
}
