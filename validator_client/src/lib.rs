pub mod config;
pub mod doppelganger_service;
pub mod http_api;
pub mod http_metrics;
pub mod initialized_validators;
pub mod signing_method;
pub mod validator_store;

pub use config::Config;
pub use validator_store::{Error as ValidatorStoreError, KeyImportOutcome, ValidatorStore};

use doppelganger_service::DoppelgangerService;
use futures::FutureExt;
use http_api::ApiSecret;
use slashing_protection::SlashingDatabase;
use slog::{error, info, warn, Logger};
use slot_clock::SlotClock;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use types::{ChainSpec, Hash256};

/// Delay used by the pruning task when the slot clock cannot be read.
const CLOCK_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Holds the signing subsystem of a running validator client: the validator store, its
/// slashing protection database and the optional key-manager HTTP API.
pub struct ValidatorClient<T: SlotClock + 'static> {
    validator_store: Arc<ValidatorStore<T>>,
    config: Config,
    log: Logger,
}

impl<T: SlotClock + 'static> ValidatorClient<T> {
    /// Opens the slashing protection database and builds the validator store, _without_
    /// starting any background task or server.
    pub fn new(
        config: Config,
        spec: Arc<ChainSpec>,
        genesis_validators_root: Hash256,
        slot_clock: T,
        log: Logger,
    ) -> Result<Self, String> {
        info!(
            log,
            "Starting validator client";
            "validator_dir" => ?config.validator_dir,
            "doppelganger_protection" => config.enable_doppelganger_protection,
        );

        let slashing_db_path = config.slashing_protection_path();
        let slashing_protection = if config.init_slashing_protection {
            std::fs::create_dir_all(&config.validator_dir).map_err(|e| {
                format!(
                    "Unable to create validator dir {:?}: {:?}",
                    config.validator_dir, e
                )
            })?;
            SlashingDatabase::open_or_create(&slashing_db_path).map_err(|e| {
                format!(
                    "Failed to open or create slashing protection database: {:?}",
                    e
                )
            })?
        } else {
            // Refuse to start without an existing database so that a wrong directory can never
            // silently begin signing with an empty history.
            SlashingDatabase::open(&slashing_db_path).map_err(|e| {
                format!(
                    "Failed to open slashing protection database: {:?}. \
                     Set init_slashing_protection to create a new one",
                    e
                )
            })?
        };

        let http_client = reqwest::Client::builder()
            .timeout(config.remote_signer_timeout)
            .build()
            .map_err(|e| format!("Unable to build remote signer client: {:?}", e))?;

        let doppelganger_service = if config.enable_doppelganger_protection {
            Some(Arc::new(DoppelgangerService::new(log.clone())))
        } else {
            None
        };

        let validator_store = Arc::new(ValidatorStore::new(
            slashing_protection,
            genesis_validators_root,
            spec,
            doppelganger_service,
            slot_clock,
            http_client,
            log.clone(),
        ));

        Ok(Self {
            validator_store,
            config,
            log,
        })
    }

    pub fn validator_store(&self) -> &Arc<ValidatorStore<T>> {
        &self.validator_store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Encodes all registered Prometheus metrics in the text exposition format.
    pub fn gather_metrics(&self) -> Result<String, String> {
        http_metrics::metrics::gather_prometheus_metrics(&self.validator_store)
    }

    /// Spawns the slashing protection pruning task and, if enabled, the key-manager HTTP API.
    ///
    /// Both stop when `shutdown` resolves. Returns the address the HTTP API listens on.
    pub fn start_service(
        &self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<Option<SocketAddr>, String> {
        let shutdown = shutdown.shared();

        tokio::spawn(prune_slashing_protection(
            self.validator_store.clone(),
            shutdown.clone(),
            self.log.clone(),
        ));

        if !self.config.http_api.enabled {
            info!(self.log, "HTTP API is disabled");
            return Ok(None);
        }

        let api_secret = if self.config.http_api.require_authorization {
            ApiSecret::create_or_open(&self.config.validator_dir)?
        } else {
            warn!(
                self.log,
                "HTTP API authorization is disabled";
                "msg" => "any local process can manage validator keys"
            );
            ApiSecret::disabled()
        };

        let ctx = Arc::new(http_api::Context {
            api_secret,
            validator_store: Some(self.validator_store.clone()),
            config: self.config.http_api.clone(),
            log: self.log.clone(),
        });

        let (listen_addr, server) = http_api::serve(ctx, shutdown)
            .map_err(|e| format!("Unable to start HTTP API: {:?}", e))?;
        tokio::spawn(server);

        Ok(Some(listen_addr))
    }
}

/// Prunes the slashing protection database once per epoch until `shutdown` resolves.
async fn prune_slashing_protection<T: SlotClock + 'static>(
    validator_store: Arc<ValidatorStore<T>>,
    shutdown: impl Future<Output = ()>,
    log: Logger,
) {
    let run = async {
        let mut first_run = true;
        loop {
            let slots_per_epoch = validator_store.spec().slots_per_epoch;
            let slot_clock = validator_store.slot_clock();

            let Some(current_slot) = slot_clock.now() else {
                tokio::time::sleep(
                    slot_clock
                        .duration_to_next_slot()
                        .unwrap_or(CLOCK_RETRY_DELAY),
                )
                .await;
                continue;
            };

            let current_epoch = current_slot.epoch(slots_per_epoch);
            let store = validator_store.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || {
                store.prune_slashing_protection_db(current_epoch, first_run)
            })
            .await
            {
                error!(log, "Slashing protection pruning task failed"; "error" => ?e);
            }
            first_run = false;

            let next_epoch_start = (current_epoch + 1).start_slot(slots_per_epoch);
            let delay = slot_clock
                .start_of(next_epoch_start)
                .zip(slot_clock.now_duration())
                .and_then(|(start, now)| start.checked_sub(now))
                .unwrap_or(CLOCK_RETRY_DELAY);
            tokio::time::sleep(delay).await;
        }
    };

    tokio::select! {
        _ = run => {}
        _ = shutdown => {
            info!(log, "Slashing protection pruning stopped");
        }
    }
}
