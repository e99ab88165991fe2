//! A minimal remote signer speaking the Web3Signer `eth2` signing protocol.
//!
//! The server holds secret keys in memory and signs whatever `signingRoot` it is given. It
//! performs no slashing protection of its own; callers are expected to run their own guard
//! before asking for a signature.

mod config;
mod key_store;

pub use config::Config;
pub use key_store::KeyStore;

use bls::Signature;
use serde::{Deserialize, Serialize};
use slog::{debug, info, warn, Logger};
use std::future::Future;
use std::net::SocketAddr;
use types::Hash256;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Reply};

pub const UPCHECK_PATH: &str = "upcheck";

#[derive(Debug)]
pub enum Error {
    Warp(warp::Error),
}

impl From<warp::Error> for Error {
    fn from(e: warp::Error) -> Self {
        Error::Warp(e)
    }
}

/// The only field of a signing request the server acts upon. Every other Web3Signer field
/// (`type`, `fork_info`, the duty pre-image) is accepted and ignored.
#[derive(Debug, Deserialize)]
struct SigningRequest {
    #[serde(rename = "signingRoot")]
    signing_root: Hash256,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SigningResponse {
    pub signature: Signature,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct UpcheckResponse {
    pub status: String,
}

fn error_reply(status: StatusCode, error: String) -> Response {
    warp::reply::with_status(warp::reply::json(&ErrorResponse { error }), status).into_response()
}

/// Sign `body` with the key named by `identifier`.
///
/// Unknown keys are reported before the body is inspected.
fn sign(identifier: &str, body: &[u8], key_store: &KeyStore, log: &Logger) -> Response {
    let Some(keypair) = key_store.get(identifier) else {
        warn!(log, "Signing request for unknown key"; "identifier" => identifier);
        return error_reply(
            StatusCode::NOT_FOUND,
            format!("Key not found: {}", identifier),
        );
    };

    let request: SigningRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            return error_reply(
                StatusCode::BAD_REQUEST,
                format!("Invalid signing request: {}", e),
            )
        }
    };

    debug!(
        log,
        "Signing";
        "pubkey" => identifier,
        "signing_root" => ?request.signing_root,
    );

    let signature = keypair.sk.sign(request.signing_root);
    warp::reply::json(&SigningResponse { signature }).into_response()
}

/// Creates a server that signs with the keys in `key_store`.
///
/// The server will shut down gracefully when the `shutdown` future resolves.
///
/// ## Returns
///
/// This function will bind the server to the configured address and then return a tuple of:
///
/// - `SocketAddr`: the address that the HTTP server will listen on.
/// - `Future`: the actual server future that will need to be awaited.
pub fn serve(
    config: &Config,
    key_store: KeyStore,
    log: Logger,
    shutdown: impl Future<Output = ()> + Send + Sync + 'static,
) -> Result<(SocketAddr, impl Future<Output = ()>), Error> {
    let key_store_filter = warp::any().map(move || key_store.clone());
    let inner_log = log.clone();
    let log_filter = warp::any().map(move || inner_log.clone());

    // GET /upcheck
    let upcheck = warp::path(UPCHECK_PATH)
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            warp::reply::json(&UpcheckResponse {
                status: "OK".to_string(),
            })
        });

    let eth2_v1 = warp::path("api")
        .and(warp::path("v1"))
        .and(warp::path("eth2"));

    // GET /api/v1/eth2/publicKeys
    let public_keys = eth2_v1
        .and(warp::path("publicKeys"))
        .and(warp::path::end())
        .and(warp::get())
        .and(key_store_filter.clone())
        .map(|key_store: KeyStore| {
            let pubkeys: Vec<String> = key_store
                .public_keys()
                .iter()
                .map(|pubkey| pubkey.as_hex_string())
                .collect();
            warp::reply::json(&pubkeys)
        });

    // POST /api/v1/eth2/sign/{identifier}
    let sign_route = eth2_v1
        .and(warp::path("sign"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::bytes())
        .and(key_store_filter)
        .and(log_filter)
        .and_then(
            |identifier: String, body: warp::hyper::body::Bytes, key_store: KeyStore, log: Logger| {
                warp_utils::task::blocking_task(move || {
                    Ok::<_, warp::Rejection>(sign(&identifier, &body, &key_store, &log))
                })
            },
        );

    let routes = upcheck
        .or(public_keys)
        .or(sign_route)
        .recover(warp_utils::reject::handle_rejection);

    let (listening_socket, server) = warp::serve(routes).try_bind_with_graceful_shutdown(
        SocketAddr::new(config.listen_address, config.listen_port),
        async {
            shutdown.await;
        },
    )?;

    info!(
        log,
        "Remote signer started";
        "listen_address" => listening_socket.to_string(),
    );

    Ok((listening_socket, server))
}
