//! Implementation of the standard remotekey management API.
use crate::{
    initialized_validators::SigningDefinition, validator_store::KeyImportOutcome, ValidatorStore,
};
use eth2::lighthouse_vc::std_types::{
    DeleteRemotekeyStatus, DeleteRemotekeysRequest, DeleteRemotekeysResponse,
    ImportRemotekeyStatus, ImportRemotekeysRequest, ImportRemotekeysResponse,
    ListRemotekeysResponse, SingleListRemotekeysResponse, Status,
};
use slog::{info, warn, Logger};
use slot_clock::SlotClock;
use std::sync::Arc;
use types::PublicKeyBytes;
use url::Url;

pub fn list<T: SlotClock + 'static>(
    validator_store: Arc<ValidatorStore<T>>,
) -> ListRemotekeysResponse {
    let keystores = validator_store
        .list_keys()
        .into_iter()
        .filter_map(|def| match def.signing_definition {
            SigningDefinition::Web3Signer { url } => Some(SingleListRemotekeysResponse {
                pubkey: def.voting_public_key,
                url: url.to_string(),
                readonly: false,
            }),
            SigningDefinition::LocalKeypair => None,
        })
        .collect();

    ListRemotekeysResponse { data: keystores }
}

pub fn import<T: SlotClock + 'static>(
    request: ImportRemotekeysRequest,
    validator_store: Arc<ValidatorStore<T>>,
    log: Logger,
) -> ImportRemotekeysResponse {
    info!(
        log,
        "Importing remotekeys via standard HTTP API";
        "count" => request.remote_keys.len(),
    );

    // Import each remotekey. Some remotekeys may fail to be imported, so we record a status for each.
    let statuses = request
        .remote_keys
        .into_iter()
        .map(|remotekey| {
            match import_single_remotekey(remotekey.pubkey, &remotekey.url, &validator_store) {
                Ok(status) => Status::ok(status),
                Err(e) => {
                    warn!(
                        log,
                        "Error importing keystore, skipped";
                        "pubkey" => remotekey.pubkey.to_string(),
                        "error" => ?e,
                    );
                    Status::error(ImportRemotekeyStatus::Error, e)
                }
            }
        })
        .collect();

    ImportRemotekeysResponse { data: statuses }
}

fn import_single_remotekey<T: SlotClock + 'static>(
    pubkey: PublicKeyBytes,
    url: &str,
    validator_store: &ValidatorStore<T>,
) -> Result<ImportRemotekeyStatus, String> {
    // Validate the key before registering it anywhere.
    pubkey
        .decompress()
        .map_err(|e| format!("invalid pubkey, {:?}", e))?;
    let url = Url::parse(url).map_err(|e| format!("invalid URL, {:?}", e))?;

    match validator_store.import_remote_key(pubkey, url) {
        Ok(KeyImportOutcome::Imported) => Ok(ImportRemotekeyStatus::Imported),
        Ok(KeyImportOutcome::Duplicate) => Ok(ImportRemotekeyStatus::Duplicate),
        Err(e) => Err(format!("failed to import remotekey: {:?}", e)),
    }
}

pub async fn delete<T: SlotClock + 'static>(
    request: DeleteRemotekeysRequest,
    validator_store: Arc<ValidatorStore<T>>,
    log: Logger,
) -> DeleteRemotekeysResponse {
    info!(
        log,
        "Deleting remotekeys via standard HTTP API";
        "count" => request.pubkeys.len(),
    );

    let mut statuses = Vec::with_capacity(request.pubkeys.len());
    for pubkey in &request.pubkeys {
        let status = match delete_single_remotekey(pubkey, &validator_store).await {
            Ok(status) => Status::ok(status),
            Err(error) => {
                warn!(
                    log,
                    "Error deleting keystore";
                    "pubkey" => ?pubkey,
                    "error" => ?error,
                );
                Status::error(DeleteRemotekeyStatus::Error, error)
            }
        };
        statuses.push(status);
    }

    DeleteRemotekeysResponse { data: statuses }
}

async fn delete_single_remotekey<T: SlotClock + 'static>(
    pubkey: &PublicKeyBytes,
    validator_store: &ValidatorStore<T>,
) -> Result<DeleteRemotekeyStatus, String> {
    let is_remote = validator_store
        .list_keys()
        .iter()
        .any(|def| def.voting_public_key == *pubkey && !def.signing_definition.is_local_keypair());

    if !is_remote {
        return Ok(DeleteRemotekeyStatus::NotFound);
    }

    match validator_store.remove_key(pubkey).await {
        Ok(true) => Ok(DeleteRemotekeyStatus::Deleted),
        Ok(false) => Ok(DeleteRemotekeyStatus::NotFound),
        Err(e) => Err(format!("unable to remove remotekey: {:?}", e)),
    }
}
