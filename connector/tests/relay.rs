use std::sync::Arc;
use std::time::Duration;

use custody_connector::{
    ConnectRequest, ConnectionInfo, ConnectorConfig, Envelope, ErrorCode, Payload, RejectReason,
    Relay, Request, RequestState, Response,
};
use custody_nullables::NullVault;
use custody_types::Principal;
use tokio::time::Instant;

const ORIGIN: &str = "https://dapp.example";
const LEDGER: &str = "ryjl3-tyaaa-aaaaa-aaaba-cai";

fn trusted() -> String {
    ConnectorConfig::default().trusted_extension_id
}

fn info() -> ConnectionInfo {
    ConnectionInfo::for_principal(Principal::anonymous())
}

fn relay(vault: &Arc<NullVault>) -> Relay {
    Relay::new(ConnectorConfig::default(), vault.clone())
}

fn from(sender: &str, id: u64, request: Request) -> Envelope {
    let mut envelope = Envelope::request(id, ORIGIN, request);
    envelope.sender = sender.to_string();
    envelope
}

fn connect(whitelist: &[&str], timeout_ms: Option<u64>) -> Request {
    Request::Connect(ConnectRequest {
        whitelist: whitelist.iter().map(|s| s.to_string()).collect(),
        host: None,
        timeout_ms,
    })
}

fn response(envelope: Envelope) -> Response {
    match envelope.payload {
        Payload::Response(response) => response,
        other => panic!("expected a response, got {other:?}"),
    }
}

fn error_code(response: &Response) -> Option<ErrorCode> {
    match response {
        Response::Error(body) => body.code,
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// Connect lifecycle
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn silent_vault_times_out_at_requested_deadline() {
    let vault = Arc::new(NullVault::silent());
    let relay = relay(&vault);

    let start = Instant::now();
    let reply = relay
        .handle(from(&trusted(), 1, connect(&["aaaaa-aa"], Some(500))))
        .await
        .expect("reply");
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(500), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(600), "{elapsed:?}");
    assert_eq!(error_code(&response(reply)), Some(ErrorCode::TimedOut));
    assert_eq!(relay.state(&trusted(), 1), Some(RequestState::TimedOut));
    assert_eq!(vault.prompts().len(), 1);
}

#[tokio::test]
async fn approval_resolves_and_remembers_origin() {
    let vault = Arc::new(NullVault::approving(info()));
    let relay = relay(&vault);

    let reply = relay
        .handle(from(&trusted(), 1, connect(&[LEDGER], None)))
        .await
        .expect("reply");
    assert_eq!(response(reply), Response::Connected(info()));
    assert_eq!(relay.state(&trusted(), 1), Some(RequestState::Resolved));
    assert!(relay.is_approved(ORIGIN));
    assert_eq!(relay.connection(ORIGIN), Some(info()));

    let prompt = &vault.prompts()[0];
    assert_eq!(prompt.origin, ORIGIN);
    assert_eq!(prompt.whitelist, vec![Principal::parse_canister(LEDGER).unwrap()]);
}

#[tokio::test]
async fn denial_is_rejected() {
    let vault = Arc::new(NullVault::denying("not today"));
    let relay = relay(&vault);

    let reply = relay
        .handle(from(&trusted(), 1, connect(&[LEDGER], None)))
        .await
        .expect("reply");
    assert_eq!(error_code(&response(reply)), Some(ErrorCode::Rejected));
    assert_eq!(
        relay.state(&trusted(), 1),
        Some(RequestState::Rejected(RejectReason::UserRejected("not today".into())))
    );
    assert!(!relay.is_approved(ORIGIN));
}

#[tokio::test]
async fn invalid_whitelist_never_wakes_vault() {
    let vault = Arc::new(NullVault::approving(info()));
    let relay = relay(&vault);

    let reply = relay
        .handle(from(&trusted(), 1, connect(&["not-a-canister"], None)))
        .await
        .expect("reply");
    assert_eq!(error_code(&response(reply)), Some(ErrorCode::Malformed));
    assert!(matches!(
        relay.state(&trusted(), 1),
        Some(RequestState::Rejected(RejectReason::Malformed(_)))
    ));
    assert_eq!(vault.wakes(), 0);
}

#[tokio::test]
async fn covered_whitelist_skips_prompt() {
    let vault = Arc::new(NullVault::approving(info()));
    let relay = relay(&vault);

    relay
        .handle(from(&trusted(), 1, connect(&[LEDGER, "aaaaa-aa"], None)))
        .await
        .expect("reply");
    let reply = relay
        .handle(from(&trusted(), 2, connect(&["aaaaa-aa"], None)))
        .await
        .expect("reply");
    assert_eq!(response(reply), Response::Connected(info()));
    assert_eq!(vault.prompts().len(), 1);

    relay
        .handle(from(&trusted(), 3, connect(&["mxzaz-hqaaa-aaaar-qaada-cai"], None)))
        .await
        .expect("reply");
    assert_eq!(vault.prompts().len(), 2);
}

// ----------------------------------------------------------------------------
// Sender authentication and deduplication
// ----------------------------------------------------------------------------

#[tokio::test]
async fn untrusted_sender_is_rejected_without_waking_vault() {
    let vault = Arc::new(NullVault::approving(info()));
    let relay = relay(&vault);

    let reply = relay
        .handle(from("evil-page", 1, connect(&[LEDGER], None)))
        .await;
    assert!(reply.is_none());
    assert_eq!(relay.state("evil-page", 1), None);
    assert_eq!(vault.wakes(), 0);
    assert!(vault.prompts().is_empty());
    assert!(!relay.is_approved(ORIGIN));
}

#[tokio::test]
async fn untrusted_ids_do_not_shadow_trusted_ones() {
    let vault = Arc::new(NullVault::approving(info()));
    let relay = relay(&vault);

    relay.handle(from("evil-page", 1, Request::IsConnected)).await;
    let reply = relay.handle(from(&trusted(), 1, Request::IsConnected)).await;
    assert_eq!(reply.map(response), Some(Response::status(false)));
}

#[tokio::test]
async fn settled_correlation_id_is_ignored() {
    let vault = Arc::new(NullVault::approving(info()));
    let relay = relay(&vault);
    let request = from(&trusted(), 7, connect(&[LEDGER], None));

    assert!(relay.handle(request.clone()).await.is_some());
    assert!(relay.handle(request).await.is_none());
    assert_eq!(vault.prompts().len(), 1);
    assert_eq!(relay.state(&trusted(), 7), Some(RequestState::Resolved));
}

#[tokio::test]
async fn untrusted_flood_is_not_tracked() {
    let vault = Arc::new(NullVault::approving(info()));
    let relay = relay(&vault);

    for id in 0..10_000 {
        assert!(relay.handle(from("evil-page", id, Request::IsConnected)).await.is_none());
    }
    assert_eq!(relay.tracked_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn settled_ids_are_forgotten_after_retention() {
    let vault = Arc::new(NullVault::approving(info()));
    let relay = relay(&vault);
    let request = from(&trusted(), 3, Request::IsConnected);

    assert!(relay.handle(request.clone()).await.is_some());
    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(relay.handle(request.clone()).await.is_none());

    tokio::time::advance(ConnectorConfig::default().settled_retention()).await;
    assert!(relay.handle(request).await.is_some());
    assert_eq!(relay.tracked_requests(), 1);
}

#[tokio::test]
async fn settled_ids_are_capped() {
    let vault = Arc::new(NullVault::approving(info()));
    let config = ConnectorConfig {
        max_settled: 16,
        ..ConnectorConfig::default()
    };
    let relay = Relay::new(config, vault.clone());

    for id in 0..100 {
        assert!(relay.handle(from(&trusted(), id, Request::IsConnected)).await.is_some());
    }
    assert_eq!(relay.tracked_requests(), 16);
    assert_eq!(relay.state(&trusted(), 99), Some(RequestState::Resolved));
    assert_eq!(relay.state(&trusted(), 0), None);
}

#[tokio::test]
async fn responses_sent_to_relay_are_ignored() {
    let vault = Arc::new(NullVault::silent());
    let relay = relay(&vault);
    let mut envelope = from(&trusted(), 1, Request::IsConnected).reply(Response::status(true));
    envelope.sender = trusted();

    assert!(relay.handle(envelope).await.is_none());
    assert_eq!(relay.state(&trusted(), 1), None);
}

// ----------------------------------------------------------------------------
// Vault wake-up
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn wake_is_retried_until_ready() {
    let vault = Arc::new(NullVault::approving(info()).not_ready_for(2));
    let relay = relay(&vault);

    let reply = relay
        .handle(from(&trusted(), 1, connect(&[LEDGER], None)))
        .await
        .expect("reply");
    assert_eq!(response(reply), Response::Connected(info()));
    assert_eq!(vault.wakes(), 3);
}

#[tokio::test(start_paused = true)]
async fn wake_gives_up_after_configured_attempts() {
    let vault = Arc::new(NullVault::approving(info()).not_ready_for(100));
    let relay = relay(&vault);

    let reply = relay
        .handle(from(&trusted(), 1, connect(&[LEDGER], None)))
        .await
        .expect("reply");
    assert_eq!(error_code(&response(reply)), Some(ErrorCode::VaultUnavailable));
    assert_eq!(vault.wakes(), ConnectorConfig::default().wake_attempts as usize);
    assert!(vault.prompts().is_empty());
    assert_eq!(
        relay.state(&trusted(), 1),
        Some(RequestState::Rejected(RejectReason::VaultUnavailable))
    );
}

// ----------------------------------------------------------------------------
// Status and disconnect
// ----------------------------------------------------------------------------

#[tokio::test]
async fn status_and_disconnect_do_not_wake_vault() {
    let vault = Arc::new(NullVault::approving(info()));
    let relay = relay(&vault);

    let reply = relay.handle(from(&trusted(), 1, Request::IsConnected)).await;
    assert_eq!(reply.map(response), Some(Response::status(false)));
    assert_eq!(vault.wakes(), 0);

    relay
        .handle(from(&trusted(), 2, connect(&[LEDGER], None)))
        .await
        .expect("reply");
    let reply = relay.handle(from(&trusted(), 3, Request::IsConnected)).await;
    assert_eq!(reply.map(response), Some(Response::status(true)));

    let reply = relay.handle(from(&trusted(), 4, Request::Disconnect)).await;
    assert_eq!(reply.map(response), Some(Response::status(false)));
    assert!(!relay.is_approved(ORIGIN));

    let reply = relay.handle(from(&trusted(), 5, Request::Disconnect)).await;
    assert_eq!(reply.map(response), Some(Response::status(false)));
    assert_eq!(vault.wakes(), 1);
}

#[tokio::test]
async fn revoke_all_forgets_origins() {
    let vault = Arc::new(NullVault::approving(info()));
    let relay = relay(&vault);
    relay
        .handle(from(&trusted(), 1, connect(&[LEDGER], None)))
        .await
        .expect("reply");

    relay.revoke_all();
    assert!(!relay.is_approved(ORIGIN));
}
