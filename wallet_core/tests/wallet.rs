use std::sync::Arc;
use std::time::Duration;

use custody_cache::BlobCache;
use custody_crypto::{derive_identity, KdfParams};
use custody_nullables::{MemoryBlobStore, NullActorFactory, NullAgentConnector};
use custody_types::{
    AccountIdentifier, CanisterId, Destination, Network, NftRecord, Principal, TokenAmount,
    TokenInfo, ValidationError,
};
use custody_wallet_core::{
    ActorKind, CallResult, RemoteError, SessionState, Wallet, WalletConfig, WalletContext,
    WalletError,
};

const PHRASE: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
const PASSWORD: &str = "Str0ng!Pass";
const CKBTC: &str = "mxzaz-hqaaa-aaaar-qaada-cai";

struct Harness {
    ctx: Arc<WalletContext>,
    connector: Arc<NullAgentConnector>,
    actors: Arc<NullActorFactory>,
}

fn config() -> WalletConfig {
    WalletConfig {
        kdf: KdfParams::Pbkdf2Sha256 { iterations: 1_000 },
        ..WalletConfig::default()
    }
}

fn harness(connector: NullAgentConnector) -> Harness {
    let connector = Arc::new(connector);
    let actors = Arc::new(NullActorFactory::new());
    let blobs = BlobCache::new(Arc::new(MemoryBlobStore::new()));
    let ctx = Arc::new(WalletContext::new(
        config(),
        connector.clone(),
        actors.clone(),
        blobs,
    ));
    Harness {
        ctx,
        connector,
        actors,
    }
}

async fn wallet(h: &Harness) -> Wallet {
    let keys = derive_identity(PHRASE, 0).unwrap();
    Wallet::new(h.ctx.clone(), "Main", 0, &keys, PASSWORD)
        .await
        .unwrap()
}

fn ledger() -> CanisterId {
    Network::Mainnet.ledger_canister_id()
}

fn ckbtc() -> CanisterId {
    Principal::parse_canister(CKBTC).unwrap()
}

fn ckbtc_info() -> TokenInfo {
    TokenInfo {
        symbol: Some("ckBTC".into()),
        fee: Some(10),
        ..TokenInfo::default()
    }
}

// ----------------------------------------------------------------------------
// Unlock state machine
// ----------------------------------------------------------------------------

#[tokio::test]
async fn new_wallet_is_locked_with_native_token() {
    let h = harness(NullAgentConnector::new());
    let wallet = wallet(&h).await;

    assert_eq!(wallet.state(), SessionState::Locked);
    assert!(!wallet.is_unlocked());
    assert_eq!(
        wallet.principal().to_text(),
        "bsqte-6swya-dtg3s-ffknw-4x4mu-ooltq-5eoeo-3cqpf-bhs47-pgned-rae"
    );
    let native = wallet.token(&ledger()).expect("native token");
    assert_eq!(native.symbol(), "ICP");
    assert_eq!(native.kind(), ActorKind::NativeLedger);
    assert!(!native.is_bound());
}

#[tokio::test]
async fn unlock_reaches_ready_and_binds_actors() {
    let h = harness(NullAgentConnector::new());
    let mut wallet = wallet(&h).await;
    let mut states = wallet.subscribe();

    let state = wallet.unlock(PASSWORD).await.unwrap();
    assert_eq!(state, SessionState::Ready);
    assert!(wallet.is_unlocked());
    assert!(wallet.token(&ledger()).unwrap().is_bound());
    assert_eq!(h.actors.kind_of(&ledger()), Some(ActorKind::NativeLedger));
    assert_eq!(*states.borrow_and_update(), SessionState::Ready);
}

#[tokio::test]
async fn wrong_password_leaves_wallet_locked() {
    let h = harness(NullAgentConnector::new());
    let mut wallet = wallet(&h).await;

    let err = wallet.unlock("Wr0ng!Pass").await.unwrap_err();
    assert_eq!(err.kind(), custody_types::ErrorKind::Crypto);
    assert_eq!(wallet.state(), SessionState::Locked);
    assert!(!wallet.is_unlocked());
    assert_eq!(h.connector.connects(), 0);
}

#[tokio::test]
async fn unreachable_agent_degrades() {
    let h = harness(NullAgentConnector::unreachable());
    let mut wallet = wallet(&h).await;

    let state = wallet.unlock(PASSWORD).await.unwrap();
    assert!(matches!(state, SessionState::Degraded { .. }));
    assert!(state.is_unlocked());

    let balance = wallet.balance(&ledger()).await;
    assert!(balance.error().is_some());
}

#[tokio::test(start_paused = true)]
async fn hanging_agent_times_out_into_degraded() {
    let h = harness(NullAgentConnector::hanging());
    let mut wallet = wallet(&h).await;

    let start = tokio::time::Instant::now();
    let state = wallet.unlock(PASSWORD).await.unwrap();
    assert!(matches!(state, SessionState::Degraded { .. }));
    assert!(start.elapsed() >= Duration::from_secs(10));
}

#[tokio::test]
async fn build_recovers_from_degraded() {
    let h = harness(NullAgentConnector::unreachable());
    let mut wallet = wallet(&h).await;
    wallet.unlock(PASSWORD).await.unwrap();

    h.connector.set_mode(custody_nullables::ConnectMode::Succeed);
    let state = wallet.build().await.unwrap();
    assert_eq!(state, SessionState::Ready);
    assert!(wallet.token(&ledger()).unwrap().is_bound());
}

#[tokio::test]
async fn build_requires_unlock() {
    let h = harness(NullAgentConnector::new());
    let mut wallet = wallet(&h).await;
    assert!(matches!(wallet.build().await, Err(WalletError::Locked)));
}

#[tokio::test]
async fn one_failing_ledger_does_not_block_others() {
    let h = harness(NullAgentConnector::new());
    h.actors
        .fail_canister(&ckbtc(), RemoteError::Unreachable("down".into()));
    let mut wallet = wallet(&h).await;
    wallet.add_token(ckbtc(), ckbtc_info(), false).await;

    let state = wallet.unlock(PASSWORD).await.unwrap();
    assert_eq!(state, SessionState::Ready);
    assert!(wallet.token(&ledger()).unwrap().is_bound());
    assert!(!wallet.token(&ckbtc()).unwrap().is_bound());

    h.actors.actor(&ledger()).set_balance(TokenAmount::new(42));
    assert_eq!(wallet.balance(&ledger()).await, CallResult::Ok(TokenAmount::new(42)));
    assert!(wallet.balance(&ckbtc()).await.error().is_some());
}

#[tokio::test]
async fn every_ledger_unreachable_degrades() {
    let h = harness(NullAgentConnector::new());
    h.actors
        .fail_canister(&ledger(), RemoteError::Unreachable("down".into()));
    let mut wallet = wallet(&h).await;

    let state = wallet.unlock(PASSWORD).await.unwrap();
    assert!(matches!(state, SessionState::Degraded { .. }));
}

#[tokio::test]
async fn lock_drops_session_and_bindings() {
    let h = harness(NullAgentConnector::new());
    let mut wallet = wallet(&h).await;
    wallet.unlock(PASSWORD).await.unwrap();

    wallet.lock();
    assert_eq!(wallet.state(), SessionState::Locked);
    assert!(!wallet.token(&ledger()).unwrap().is_bound());
    assert!(matches!(
        wallet.balance(&ledger()).await,
        CallResult::Error(_)
    ));

    assert_eq!(wallet.unlock(PASSWORD).await.unwrap(), SessionState::Ready);
    assert_eq!(h.connector.connects(), 2);
}

// ----------------------------------------------------------------------------
// Transfers
// ----------------------------------------------------------------------------

#[tokio::test]
async fn memos_strictly_increase() {
    let h = harness(NullAgentConnector::new());
    let mut wallet = wallet(&h).await;
    wallet.unlock(PASSWORD).await.unwrap();
    let to = Destination::Principal(Principal::anonymous());

    for _ in 0..3 {
        let result = wallet
            .transfer(&ledger(), to.clone(), TokenAmount::new(100))
            .await;
        assert!(result.is_ok(), "{result:?}");
    }

    let memos: Vec<u64> = h
        .actors
        .actor(&ledger())
        .transfers()
        .iter()
        .map(|t| t.memo)
        .collect();
    assert_eq!(memos, vec![1, 2, 3]);
    assert_eq!(wallet.token(&ledger()).unwrap().last_memo().await, 3);
}

#[tokio::test(start_paused = true)]
async fn concurrent_transfers_get_distinct_memos() {
    let h = harness(NullAgentConnector::new());
    let mut wallet = wallet(&h).await;
    wallet.unlock(PASSWORD).await.unwrap();
    h.actors
        .actor(&ledger())
        .set_transfer_delay(Duration::from_millis(50));
    let to = Destination::Principal(Principal::anonymous());
    let ledger = ledger();

    let results = futures::future::join_all(
        (0..5).map(|_| wallet.transfer(&ledger, to.clone(), TokenAmount::new(1))),
    )
    .await;
    assert!(results.iter().all(CallResult::is_ok));

    let mut memos: Vec<u64> = h
        .actors
        .actor(&ledger)
        .transfers()
        .iter()
        .map(|t| t.memo)
        .collect();
    memos.sort_unstable();
    assert_eq!(memos, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn native_transfer_to_principal_uses_account_id() {
    let h = harness(NullAgentConnector::new());
    let mut wallet = wallet(&h).await;
    wallet.unlock(PASSWORD).await.unwrap();

    wallet
        .transfer(
            &ledger(),
            Destination::Principal(Principal::anonymous()),
            TokenAmount::new(5),
        )
        .await
        .ok()
        .expect("transfer");

    let sent = &h.actors.actor(&ledger()).transfers()[0];
    assert_eq!(
        sent.to,
        Destination::Account(AccountIdentifier::from_principal(&Principal::anonymous()))
    );
    assert_eq!(sent.fee, TokenAmount::new(10_000));
}

#[tokio::test]
async fn fungible_transfer_rejects_account_destination() {
    let h = harness(NullAgentConnector::new());
    let mut wallet = wallet(&h).await;
    wallet.add_token(ckbtc(), ckbtc_info(), false).await;
    wallet.unlock(PASSWORD).await.unwrap();

    let account = AccountIdentifier::from_principal(&Principal::anonymous());
    let result = wallet
        .transfer(&ckbtc(), Destination::Account(account), TokenAmount::new(5))
        .await;
    assert!(result.error().is_some());
    assert!(h.actors.actor(&ckbtc()).transfers().is_empty());

    let token = wallet.token(&ckbtc()).unwrap();
    let err = token
        .transfer(Destination::Account(account), TokenAmount::new(5))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WalletError::Validation(ValidationError::InvalidDestination(_))
    ));
}

#[tokio::test]
async fn zero_amount_is_rejected_before_dispatch() {
    let h = harness(NullAgentConnector::new());
    let mut wallet = wallet(&h).await;
    wallet.unlock(PASSWORD).await.unwrap();

    let result = wallet
        .transfer(
            &ledger(),
            Destination::Principal(Principal::anonymous()),
            TokenAmount::ZERO,
        )
        .await;
    assert!(result.error().is_some());
    assert!(h.actors.actor(&ledger()).transfers().is_empty());
    assert_eq!(wallet.token(&ledger()).unwrap().last_memo().await, 0);
}

#[tokio::test]
async fn remote_failure_surfaces_as_error_result() {
    let h = harness(NullAgentConnector::new());
    let mut wallet = wallet(&h).await;
    wallet.unlock(PASSWORD).await.unwrap();
    h.actors
        .actor(&ledger())
        .fail_next(RemoteError::Rejected("insufficient funds".into()));

    let result = wallet
        .transfer(
            &ledger(),
            Destination::Principal(Principal::anonymous()),
            TokenAmount::new(5),
        )
        .await;
    assert!(result.error().unwrap().contains("insufficient funds"));
}

#[tokio::test]
async fn locked_wallet_cannot_transfer() {
    let h = harness(NullAgentConnector::new());
    let wallet = wallet(&h).await;

    let result = wallet
        .transfer(
            &ledger(),
            Destination::Principal(Principal::anonymous()),
            TokenAmount::new(5),
        )
        .await;
    assert_eq!(result, CallResult::Error(WalletError::Locked.to_string()));
}

// ----------------------------------------------------------------------------
// Token registry
// ----------------------------------------------------------------------------

#[tokio::test]
async fn add_token_is_idempotent() {
    let h = harness(NullAgentConnector::new());
    let mut wallet = wallet(&h).await;
    wallet.unlock(PASSWORD).await.unwrap();

    assert!(wallet.add_token(ckbtc(), ckbtc_info(), false).await);
    assert!(wallet.token(&ckbtc()).unwrap().is_bound());
    let creates = h.actors.creates();

    let rename = TokenInfo {
        name: Some("ckBTC".into()),
        ..TokenInfo::default()
    };
    assert!(!wallet.add_token(ckbtc(), rename, false).await);
    assert_eq!(h.actors.creates(), creates);
    assert_eq!(wallet.tokens().count(), 2);

    let token = wallet.token(&ckbtc()).unwrap();
    assert_eq!(token.metadata().name, "ckBTC");
    assert_eq!(token.symbol(), "ckBTC");
    assert_eq!(token.metadata().fee, 10);

    assert!(!wallet.add_token(ckbtc(), TokenInfo::default(), true).await);
    assert_eq!(h.actors.creates(), creates + 1);
}

#[tokio::test]
async fn missing_metadata_uses_defaults() {
    let h = harness(NullAgentConnector::new());
    let mut wallet = wallet(&h).await;
    wallet.add_token(ckbtc(), TokenInfo::default(), false).await;

    let token = wallet.token(&ckbtc()).unwrap();
    assert_eq!(token.symbol(), "UNKNOWN");
    assert_eq!(token.metadata().name, CKBTC);
    assert_eq!(token.metadata().decimals, 8);
    assert_eq!(token.metadata().fee, 10_000);
}

#[tokio::test]
async fn native_token_cannot_be_removed() {
    let h = harness(NullAgentConnector::new());
    let mut wallet = wallet(&h).await;
    wallet.add_token(ckbtc(), ckbtc_info(), false).await;

    assert!(matches!(
        wallet.remove_token(&ledger()),
        Err(WalletError::NativeTokenRequired)
    ));
    assert!(wallet.remove_token(&ckbtc()).is_ok());
    assert!(matches!(
        wallet.remove_token(&ckbtc()),
        Err(WalletError::UnknownToken(_))
    ));
    assert!(wallet.token(&ledger()).is_some());
}

#[tokio::test]
async fn metadata_refresh_is_cached() {
    let h = harness(NullAgentConnector::new());
    let mut wallet = wallet(&h).await;
    wallet.add_token(ckbtc(), TokenInfo::default(), false).await;
    wallet.unlock(PASSWORD).await.unwrap();
    h.actors.actor(&ckbtc()).set_metadata(ckbtc_info());

    let metadata = wallet.refresh_metadata(&ckbtc()).await.unwrap();
    assert_eq!(metadata.symbol, "ckBTC");
    wallet.refresh_metadata(&ckbtc()).await.unwrap();
    assert_eq!(h.actors.actor(&ckbtc()).metadata_calls(), 1);
}

// ----------------------------------------------------------------------------
// Persistence
// ----------------------------------------------------------------------------

#[tokio::test]
async fn deserialized_wallet_is_locked_with_same_tokens() {
    let h = harness(NullAgentConnector::new());
    let mut wallet = wallet(&h).await;
    wallet.add_token(ckbtc(), ckbtc_info(), false).await;
    wallet.unlock(PASSWORD).await.unwrap();

    let json = wallet.serialize().unwrap();
    assert!(!json.contains(PASSWORD));

    let mut restored = Wallet::deserialize(h.ctx.clone(), &json).unwrap();
    assert_eq!(restored.state(), SessionState::Locked);
    assert_eq!(restored.principal(), wallet.principal());
    assert_eq!(restored.tokens().count(), 2);
    assert!(restored.tokens().all(|t| !t.is_bound()));
    assert_eq!(restored.token(&ckbtc()).unwrap().symbol(), "ckBTC");
    assert_eq!(
        restored.token(&ledger()).unwrap().kind(),
        ActorKind::NativeLedger
    );

    wallet.lock();
    assert_eq!(restored.unlock(PASSWORD).await.unwrap(), SessionState::Ready);
}

#[test]
fn corrupt_record_is_rejected() {
    let h = harness(NullAgentConnector::new());
    let err = Wallet::deserialize(h.ctx.clone(), "{\"name\": 3}").unwrap_err();
    assert!(matches!(err, WalletError::Record(_)));
}

// ----------------------------------------------------------------------------
// NFTs
// ----------------------------------------------------------------------------

fn punk(id: &str) -> NftRecord {
    NftRecord {
        id: id.to_string(),
        canister_id: ckbtc(),
        standard: "EXT".into(),
        collection: "Punks".into(),
        thumbnail: None,
    }
}

#[tokio::test]
async fn nft_sync_replaces_collection_and_is_cached() {
    let h = harness(NullAgentConnector::new());
    let mut wallet = wallet(&h).await;
    wallet.unlock(PASSWORD).await.unwrap();

    wallet.add_nft(punk("stale"));
    let collection = h.actors.collection(&ckbtc());
    collection.give(wallet.principal(), punk("1"));
    collection.give(wallet.principal(), punk("2"));

    let listed = wallet.sync_nfts(&ckbtc()).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(wallet.nfts().count(), 2);
    assert!(wallet.nft(&punk("stale").key()).is_none());
    assert!(wallet.nft(&punk("1").key()).is_some());

    wallet.sync_nfts(&ckbtc()).await.unwrap();
    assert_eq!(collection.calls(), 1);

    assert!(wallet.remove_nft(&punk("1").key()).is_some());
    assert_eq!(wallet.nfts().count(), 1);
}

#[tokio::test]
async fn empty_nft_listing_is_not_cached() {
    let h = harness(NullAgentConnector::new());
    let mut wallet = wallet(&h).await;
    wallet.unlock(PASSWORD).await.unwrap();
    let collection = h.actors.collection(&ckbtc());

    assert!(wallet.sync_nfts(&ckbtc()).await.unwrap().is_empty());
    collection.give(wallet.principal(), punk("1"));

    let listed = wallet.sync_nfts(&ckbtc()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(collection.calls(), 2);
    assert!(wallet.nft(&punk("1").key()).is_some());
}

#[tokio::test]
async fn nft_sync_requires_unlock() {
    let h = harness(NullAgentConnector::new());
    let mut wallet = wallet(&h).await;
    assert!(matches!(
        wallet.sync_nfts(&ckbtc()).await,
        Err(WalletError::Locked)
    ));
}

#[tokio::test]
async fn nft_thumbnails_round_trip_through_blob_cache() {
    let h = harness(NullAgentConnector::new());
    let wallet = wallet(&h).await;

    assert_eq!(wallet.load_nft_thumbnail(&ckbtc(), "1").await.unwrap(), None);
    wallet
        .cache_nft_thumbnail(&ckbtc(), "1", vec![0x89, 0x50, 0x4e, 0x47])
        .await
        .unwrap();
    assert_eq!(
        wallet.load_nft_thumbnail(&ckbtc(), "1").await.unwrap(),
        Some(vec![0x89, 0x50, 0x4e, 0x47])
    );
}
