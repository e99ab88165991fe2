mod api_secret;
mod keystores;
mod remotekeys;
#[cfg(test)]
mod tests;

use crate::ValidatorStore;
pub use api_secret::{ApiSecret, PK_FILENAME};
use serde::{Deserialize, Serialize};
use slog::{crit, info, Logger};
use slot_clock::SlotClock;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use warp::Filter;

#[derive(Debug)]
pub enum Error {
    Warp(warp::Error),
    Other(String),
}

impl From<warp::Error> for Error {
    fn from(e: warp::Error) -> Self {
        Error::Warp(e)
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

/// A wrapper around all the items required to spawn the HTTP server.
///
/// The server will gracefully handle the case where any fields are `None`.
pub struct Context<T: SlotClock> {
    pub api_secret: ApiSecret,
    pub validator_store: Option<Arc<ValidatorStore<T>>>,
    pub config: Config,
    pub log: Logger,
}

/// Configuration for the HTTP server.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
    pub listen_addr: IpAddr,
    pub listen_port: u16,
    /// Require a bearer token on every request. The token is read from (or created in) the
    /// validator directory.
    pub require_authorization: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            listen_port: 5062,
            require_authorization: true,
        }
    }
}

/// Creates a server that will serve requests using information from `ctx`.
///
/// The server will shut down gracefully when the `shutdown` future resolves.
///
/// ## Returns
///
/// This function will bind the server to the provided address and then return a tuple of:
///
/// - `SocketAddr`: the address that the HTTP server will listen on.
/// - `Future`: the actual server future that will need to be awaited.
///
/// ## Errors
///
/// Returns an error if the server is unable to bind or there is another error during
/// configuration.
pub fn serve<T: 'static + SlotClock>(
    ctx: Arc<Context<T>>,
    shutdown: impl Future<Output = ()> + Send + Sync + 'static,
) -> Result<(SocketAddr, impl Future<Output = ()>), Error> {
    let config = &ctx.config;
    let log = ctx.log.clone();

    // Sanity check.
    if !config.enabled {
        crit!(log, "Cannot start disabled HTTP server");
        return Err(Error::Other(
            "A disabled server should not be started".to_string(),
        ));
    }

    let authorization_header_filter = ctx.api_secret.authorization_header_filter();

    let inner_validator_store = ctx.validator_store.clone();
    let validator_store_filter = warp::any()
        .map(move || inner_validator_store.clone())
        .and_then(|validator_store: Option<_>| async move {
            validator_store.ok_or_else(|| {
                warp_utils::reject::custom_not_found(
                    "validator store is not initialized.".to_string(),
                )
            })
        });

    let inner_ctx = ctx.clone();
    let log_filter = warp::any().map(move || inner_ctx.log.clone());

    // Standard key-manager endpoints.
    let eth_v1 = warp::path("eth").and(warp::path("v1"));
    let std_keystores = eth_v1.and(warp::path("keystores")).and(warp::path::end());
    let std_remotekeys = eth_v1.and(warp::path("remotekeys")).and(warp::path::end());

    // GET /eth/v1/keystores
    let get_std_keystores = std_keystores
        .and(validator_store_filter.clone())
        .and_then(|validator_store: Arc<ValidatorStore<T>>| {
            warp_utils::task::blocking_json_task(move || Ok(keystores::list(validator_store)))
        });

    // DELETE /eth/v1/keystores
    let delete_std_keystores = std_keystores
        .and(warp::body::json())
        .and(validator_store_filter.clone())
        .and(log_filter.clone())
        .and_then(|request, validator_store, log| async move {
            keystores::delete(request, validator_store, log)
                .await
                .map(|response| warp::reply::json(&response))
        });

    // GET /eth/v1/remotekeys
    let get_std_remotekeys = std_remotekeys
        .and(validator_store_filter.clone())
        .and_then(|validator_store: Arc<ValidatorStore<T>>| {
            warp_utils::task::blocking_json_task(move || Ok(remotekeys::list(validator_store)))
        });

    // POST /eth/v1/remotekeys
    let post_std_remotekeys = std_remotekeys
        .and(warp::body::json())
        .and(validator_store_filter.clone())
        .and(log_filter.clone())
        .and_then(|request, validator_store, log| {
            warp_utils::task::blocking_json_task(move || {
                Ok(remotekeys::import(request, validator_store, log))
            })
        });

    // DELETE /eth/v1/remotekeys
    let delete_std_remotekeys = std_remotekeys
        .and(warp::body::json())
        .and(validator_store_filter)
        .and(log_filter)
        .and_then(|request, validator_store, log| async move {
            let response = remotekeys::delete(request, validator_store, log).await;
            Ok::<_, warp::Rejection>(warp::reply::json(&response))
        });

    let routes = warp::any()
        .and(authorization_header_filter)
        // Note: it is critical that the `authorization_header_filter` is applied to all routes.
        // Keeping all the routes inside the following `and` is a reliable way to achieve this.
        .and(
            warp::get()
                .and(get_std_keystores.or(get_std_remotekeys))
                .or(warp::post().and(post_std_remotekeys))
                .or(warp::delete().and(delete_std_keystores.or(delete_std_remotekeys))),
        )
        // Maps errors into HTTP responses.
        .recover(warp_utils::reject::handle_rejection);

    let (listening_socket, server) = warp::serve(routes).try_bind_with_graceful_shutdown(
        SocketAddr::new(config.listen_addr, config.listen_port),
        async {
            shutdown.await;
        },
    )?;

    info!(
        log,
        "HTTP API started";
        "listen_address" => listening_socket.to_string(),
        "api_token_file" => ?ctx.api_secret.api_token_path(),
    );

    Ok((listening_socket, server))
}
