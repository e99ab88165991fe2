use super::*;
use crate::validator_store::KeyImportOutcome;
use eth2::lighthouse_vc::{http_client::ValidatorClientHttpClient as HttpClient, std_types::*};
use eth2::reqwest::{StatusCode, Url};
use logging::test_logger;
use reqwest::Client;
use slashing_protection::SlashingDatabase;
use slot_clock::{SlotClock, TestingSlotClock};
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::oneshot;
use types::test_utils::generate_deterministic_keypair;
use types::{ChainSpec, Epoch, Hash256, Keypair, PublicKeyBytes, Slot};

const API_TOKEN: &str = "api-token-0x1234";

fn web3_signer_url() -> String {
    "http://localhost:1/this-url-hopefully-doesnt-exist".into()
}

fn remotekey_validator(index: usize) -> (Keypair, SingleImportRemotekeysRequest) {
    let keypair = generate_deterministic_keypair(index);
    let request = SingleImportRemotekeysRequest {
        pubkey: keypair.pk.compress(),
        url: web3_signer_url(),
    };
    (keypair, request)
}

struct ApiTester {
    client: HttpClient,
    validator_store: Arc<ValidatorStore<TestingSlotClock>>,
    url: Url,
}

impl ApiTester {
    /// Starts a server that runs until `server_shutdown` resolves, storing its slashing
    /// protection database in `validator_dir`.
    async fn new(
        validator_dir: &Path,
        server_shutdown: impl Future<Output = ()> + Send + Sync + 'static,
    ) -> Self {
        let log = test_logger();
        let slashing_db = SlashingDatabase::create(&validator_dir.join("slashing.sqlite")).unwrap();
        let slot_clock =
            TestingSlotClock::new(Slot::new(0), Duration::from_secs(0), Duration::from_secs(1));

        let validator_store = Arc::new(ValidatorStore::new(
            slashing_db,
            Hash256::repeat_byte(0x42),
            Arc::new(ChainSpec::minimal()),
            None,
            slot_clock,
            Client::new(),
            log.clone(),
        ));

        let context = Arc::new(Context {
            api_secret: ApiSecret::from_token(API_TOKEN.to_string()),
            validator_store: Some(validator_store.clone()),
            config: Config {
                enabled: true,
                listen_addr: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
                listen_port: 0,
                require_authorization: true,
            },
            log,
        });

        let (listening_socket, server) = serve(context, server_shutdown).unwrap();
        tokio::spawn(server);

        let url = Url::parse(&format!(
            "http://{}:{}",
            listening_socket.ip(),
            listening_socket.port()
        ))
        .unwrap();
        let client = HttpClient::new(url.clone(), Some(API_TOKEN.to_string()));

        Self {
            client,
            validator_store,
            url,
        }
    }

    fn import_local(&self, index: usize) -> PublicKeyBytes {
        let keypair = generate_deterministic_keypair(index);
        let pubkey = keypair.pk.compress();
        assert!(matches!(
            self.validator_store.import_local_key(keypair),
            Ok(KeyImportOutcome::Imported)
        ));
        pubkey
    }

    async fn attest(&self, pubkey: PublicKeyBytes, source: u64, target: u64) {
        let data = types::AttestationData {
            slot: Slot::new(target * 8),
            index: 0,
            beacon_block_root: Hash256::zero(),
            source: types::Checkpoint {
                epoch: Epoch::new(source),
                root: Hash256::zero(),
            },
            target: types::Checkpoint {
                epoch: Epoch::new(target),
                root: Hash256::zero(),
            },
        };
        let mut attestation = types::Attestation::empty_for_signing(1, data).unwrap();
        self.validator_store
            .sign_attestation(pubkey, 0, &mut attestation, Epoch::new(target))
            .await
            .unwrap();
    }
}

/// Runs `f` against a fresh server.
///
/// The server and its database directory are owned here rather than by the `ApiTester`, so they
/// outlive the test body even when it only uses some of the tester's fields.
async fn run_test<F, V>(f: F)
where
    F: FnOnce(ApiTester) -> V,
    V: Future<Output = ()>,
{
    let validator_dir = tempdir().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let tester = ApiTester::new(validator_dir.path(), async {
        // It's not really interesting why this triggered, just that it happened.
        let _ = shutdown_rx.await;
    })
    .await;

    f(tester).await;

    drop(shutdown_tx);
    drop(validator_dir);
}

fn check_statuses<T: PartialEq + std::fmt::Debug>(
    statuses: &[Status<T>],
    expected: impl IntoIterator<Item = T>,
) {
    let expected: Vec<T> = expected.into_iter().collect();
    assert_eq!(statuses.len(), expected.len());
    for (status, expected_status) in statuses.iter().zip(expected) {
        assert_eq!(status.status, expected_status, "{:?}", status.message);
    }
}

fn all_with_status<T: Clone>(count: usize, status: T) -> impl Iterator<Item = T> {
    std::iter::repeat(status).take(count)
}

#[tokio::test]
async fn get_keystores_lists_local_keys_only() {
    run_test(|tester| async move {
        let local = tester.import_local(0);
        let (_, remote) = remotekey_validator(1);
        tester
            .validator_store
            .import_remote_key(remote.pubkey, Url::parse(&remote.url).unwrap())
            .unwrap();

        let keystores = tester.client.get_keystores().await.unwrap();
        assert_eq!(keystores.data.len(), 1);
        assert_eq!(keystores.data[0].validating_pubkey, local);

        let remotekeys = tester.client.get_remotekeys().await.unwrap();
        assert_eq!(
            remotekeys.data,
            vec![SingleListRemotekeysResponse {
                pubkey: remote.pubkey,
                url: Url::parse(&remote.url).unwrap().to_string(),
                readonly: false,
            }]
        );
    })
    .await
}

#[tokio::test]
async fn server_outlives_client_only_test_body() {
    run_test(|tester| async move {
        for _ in 0..3 {
            assert!(tester.client.get_keystores().await.unwrap().data.is_empty());
        }
        assert!(tester.client.get_remotekeys().await.unwrap().data.is_empty());
    })
    .await
}

#[tokio::test]
async fn import_remotekeys_then_duplicate() {
    run_test(|tester| async move {
        let remote_keys: Vec<_> = (0..3).map(|i| remotekey_validator(i).1).collect();
        let request = ImportRemotekeysRequest {
            remote_keys: remote_keys.clone(),
        };

        let response = tester.client.post_remotekeys(&request).await.unwrap();
        check_statuses(
            &response.data,
            all_with_status(3, ImportRemotekeyStatus::Imported),
        );

        let response = tester.client.post_remotekeys(&request).await.unwrap();
        check_statuses(
            &response.data,
            all_with_status(3, ImportRemotekeyStatus::Duplicate),
        );

        let listed = tester.client.get_remotekeys().await.unwrap();
        let pubkeys: Vec<_> = listed.data.iter().map(|key| key.pubkey).collect();
        let expected: Vec<_> = remote_keys.iter().map(|key| key.pubkey).collect();
        assert_eq!(pubkeys, expected);
    })
    .await
}

#[tokio::test]
async fn import_remotekey_with_bad_url() {
    run_test(|tester| async move {
        let (_, mut remote) = remotekey_validator(0);
        remote.url = "not a url".into();
        let response = tester
            .client
            .post_remotekeys(&ImportRemotekeysRequest {
                remote_keys: vec![remote],
            })
            .await
            .unwrap();
        check_statuses(&response.data, [ImportRemotekeyStatus::Error]);
        assert!(tester.client.get_remotekeys().await.unwrap().data.is_empty());
    })
    .await
}

#[tokio::test]
async fn delete_remotekeys() {
    run_test(|tester| async move {
        let (_, remote) = remotekey_validator(0);
        let local = tester.import_local(1);
        let unknown = generate_deterministic_keypair(2).pk.compress();

        tester
            .client
            .post_remotekeys(&ImportRemotekeysRequest {
                remote_keys: vec![remote.clone()],
            })
            .await
            .unwrap();

        let response = tester
            .client
            .delete_remotekeys(&DeleteRemotekeysRequest {
                pubkeys: vec![remote.pubkey, local, unknown],
            })
            .await
            .unwrap();
        check_statuses(
            &response.data,
            [
                DeleteRemotekeyStatus::Deleted,
                DeleteRemotekeyStatus::NotFound,
                DeleteRemotekeyStatus::NotFound,
            ],
        );

        assert!(tester.client.get_remotekeys().await.unwrap().data.is_empty());
        // The local key is untouched.
        assert_eq!(tester.client.get_keystores().await.unwrap().data.len(), 1);
    })
    .await
}

#[tokio::test]
async fn delete_keystores_exports_slashing_protection() {
    run_test(|tester| async move {
        let active = tester.import_local(0);
        let inactive = tester.import_local(1);
        let unknown = generate_deterministic_keypair(2).pk.compress();

        tester.attest(active, 0, 1).await;
        tester.attest(inactive, 0, 2).await;
        assert!(matches!(
            tester.validator_store.remove_key(&inactive).await,
            Ok(true)
        ));

        let response = tester
            .client
            .delete_keystores(&DeleteKeystoresRequest {
                pubkeys: vec![active, inactive, unknown],
            })
            .await
            .unwrap();

        check_statuses(
            &response.data,
            [
                DeleteKeystoreStatus::Deleted,
                DeleteKeystoreStatus::NotActive,
                DeleteKeystoreStatus::NotFound,
            ],
        );

        let exported = &response.slashing_protection;
        assert_eq!(
            exported.metadata.genesis_validators_root,
            Hash256::repeat_byte(0x42)
        );
        assert_eq!(exported.data.len(), 2);
        assert_eq!(exported.data[0].pubkey, active);
        assert_eq!(exported.data[0].signed_attestations.len(), 1);
        assert_eq!(exported.data[1].pubkey, inactive);

        assert!(tester.client.get_keystores().await.unwrap().data.is_empty());

        // Deleting again finds the history but no active key.
        let response = tester
            .client
            .delete_keystores(&DeleteKeystoresRequest {
                pubkeys: vec![active],
            })
            .await
            .unwrap();
        check_statuses(&response.data, [DeleteKeystoreStatus::NotActive]);
    })
    .await
}

#[tokio::test]
async fn routes_with_invalid_auth() {
    run_test(|tester| async move {
        let mut no_header = tester.client.clone();
        no_header.send_authorization_header(false);
        let err = no_header.get_keystores().await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));

        let wrong_token = HttpClient::new(tester.url.clone(), Some("api-token-0xbad".into()));
        let err = wrong_token.get_remotekeys().await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));

        let err = wrong_token
            .delete_remotekeys(&DeleteRemotekeysRequest { pubkeys: vec![] })
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
    })
    .await
}
