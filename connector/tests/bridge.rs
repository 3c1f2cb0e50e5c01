use std::sync::Arc;
use std::time::Duration;

use custody_connector::{
    ConnectRequest, ConnectionInfo, ConnectorBridge, ConnectorConfig, ConnectorError, Envelope,
    ErrorCode, LocalTransport, Payload, Relay, Request, Response, Transport,
};
use custody_nullables::{NullTransport, NullVault};
use custody_types::{AccountIdentifier, Principal};
use tokio::sync::mpsc;
use tokio::time::Instant;

const ORIGIN: &str = "https://dapp.example";

fn trusted() -> String {
    ConnectorConfig::default().trusted_extension_id
}

fn info() -> ConnectionInfo {
    ConnectionInfo::for_principal(Principal::anonymous())
}

fn request(whitelist: &[&str], timeout_ms: Option<u64>) -> ConnectRequest {
    ConnectRequest {
        whitelist: whitelist.iter().map(|s| s.to_string()).collect(),
        host: None,
        timeout_ms,
    }
}

fn bridge_with(transport: &Arc<NullTransport>) -> Arc<ConnectorBridge> {
    Arc::new(ConnectorBridge::new(
        ConnectorConfig::default(),
        ORIGIN,
        transport.clone(),
    ))
}

async fn wait_for_send(transport: &NullTransport, count: usize) -> Envelope {
    while transport.sent().len() < count {
        tokio::task::yield_now().await;
    }
    transport.sent()[count - 1].clone()
}

fn reply_from(sender: &str, to: &Envelope, response: Response) -> Envelope {
    let mut reply = to.reply(response);
    reply.sender = sender.to_string();
    reply
}

// ----------------------------------------------------------------------------
// Bridge in isolation
// ----------------------------------------------------------------------------

#[tokio::test]
async fn invalid_whitelist_fails_before_sending() {
    let transport = Arc::new(NullTransport::new(trusted()));
    let bridge = bridge_with(&transport);

    let err = bridge.connect(request(&["bogus"], None)).await.unwrap_err();
    assert!(matches!(err, ConnectorError::Validation(_)));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn forged_reply_does_not_resolve_pending_request() {
    let transport = Arc::new(NullTransport::new(trusted()));
    let bridge = bridge_with(&transport);

    let task = tokio::spawn({
        let bridge = bridge.clone();
        async move { bridge.connect(request(&["aaaaa-aa"], None)).await }
    });
    let sent = wait_for_send(&transport, 1).await;
    assert!(matches!(sent.payload, Payload::Request(Request::Connect(_))));

    let forged = reply_from("evil-page", &sent, Response::Connected(info()));
    assert!(!bridge.deliver(forged));
    assert_eq!(bridge.pending_requests(), 1);
    assert!(bridge.connection().is_none());

    let genuine = reply_from(&trusted(), &sent, Response::Connected(info()));
    assert!(bridge.deliver(genuine));
    let connected = task.await.unwrap().unwrap();
    assert_eq!(connected, info());
    assert_eq!(bridge.principal(), Some(Principal::anonymous()));
    assert_eq!(
        bridge.account_id(),
        Some(AccountIdentifier::from_principal(&Principal::anonymous()))
    );
}

#[tokio::test]
async fn duplicate_reply_is_dropped() {
    let transport = Arc::new(NullTransport::new(trusted()));
    let bridge = bridge_with(&transport);

    let task = tokio::spawn({
        let bridge = bridge.clone();
        async move { bridge.is_connected().await }
    });
    let sent = wait_for_send(&transport, 1).await;

    assert!(bridge.deliver(reply_from(&trusted(), &sent, Response::status(false))));
    assert!(!bridge.deliver(reply_from(&trusted(), &sent, Response::status(true))));
    assert!(!task.await.unwrap().unwrap());
}

#[tokio::test(start_paused = true)]
async fn unanswered_request_times_out_and_late_reply_is_stale() {
    let transport = Arc::new(NullTransport::new(trusted()));
    let bridge = bridge_with(&transport);

    let start = Instant::now();
    let err = bridge
        .connect(request(&["aaaaa-aa"], Some(500)))
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectorError::TimedOut));
    assert!(start.elapsed() >= Duration::from_millis(500));
    assert!(start.elapsed() < Duration::from_millis(600));
    assert_eq!(bridge.pending_requests(), 0);

    let sent = transport.last().unwrap();
    assert!(!bridge.deliver(reply_from(&trusted(), &sent, Response::Connected(info()))));
    assert!(bridge.connection().is_none());
}

#[tokio::test]
async fn error_reply_maps_to_connector_error() {
    let transport = Arc::new(NullTransport::new(trusted()));
    let bridge = bridge_with(&transport);

    let task = tokio::spawn({
        let bridge = bridge.clone();
        async move { bridge.connect(request(&["aaaaa-aa"], None)).await }
    });
    let sent = wait_for_send(&transport, 1).await;
    let denied = Response::error(ErrorCode::Rejected, "denied");
    bridge.deliver(reply_from(&trusted(), &sent, denied));

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, ConnectorError::Rejected(reason) if reason == "denied"));
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let transport = Arc::new(NullTransport::new(trusted()));
    let bridge = bridge_with(&transport);

    bridge.disconnect().await;
    bridge.disconnect().await;

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent
        .iter()
        .all(|e| e.payload == Payload::Request(Request::Disconnect)));
    assert_eq!(bridge.pending_requests(), 0);
    assert!(bridge.connection().is_none());
}

// ----------------------------------------------------------------------------
// Bridge and relay wired over local transports
// ----------------------------------------------------------------------------

struct Wiring {
    bridge: Arc<ConnectorBridge>,
    relay: Arc<Relay>,
    attacker: LocalTransport,
}

fn wire(vault: Arc<NullVault>) -> Wiring {
    let config = ConnectorConfig::default();
    let (to_relay, relay_inbox) = mpsc::channel(16);
    let (relay_out, bridge_inbox) = LocalTransport::channel(trusted(), 16);

    let bridge = Arc::new(ConnectorBridge::new(
        config.clone(),
        ORIGIN,
        Arc::new(LocalTransport::new(trusted(), to_relay.clone())),
    ));
    let relay = Arc::new(Relay::new(config, vault));

    tokio::spawn(relay.clone().serve(relay_inbox, Arc::new(relay_out)));
    tokio::spawn(bridge.clone().listen(bridge_inbox));

    Wiring {
        bridge,
        relay,
        attacker: LocalTransport::new("evil-page", to_relay),
    }
}

#[tokio::test(start_paused = true)]
async fn connect_round_trip_times_out_with_silent_vault() {
    let vault = Arc::new(NullVault::silent());
    let wiring = wire(vault.clone());

    let start = Instant::now();
    let err = wiring
        .bridge
        .connect(request(&["aaaaa-aa"], Some(500)))
        .await
        .unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(err, ConnectorError::TimedOut));
    assert!(elapsed >= Duration::from_millis(500), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(600), "{elapsed:?}");
}

#[tokio::test]
async fn connect_round_trip_with_approval() {
    let vault = Arc::new(NullVault::approving(info()));
    let wiring = wire(vault.clone());

    let connected = wiring
        .bridge
        .connect(request(&["ryjl3-tyaaa-aaaaa-aaaba-cai"], None))
        .await
        .unwrap();
    assert_eq!(connected, info());
    assert!(wiring.bridge.is_connected().await.unwrap());
    assert_eq!(vault.wakes(), 1);

    wiring.bridge.disconnect().await;
    assert!(wiring.bridge.connection().is_none());
    while wiring.relay.is_approved(ORIGIN) {
        tokio::task::yield_now().await;
    }
    assert!(!wiring.bridge.is_connected().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn forged_connect_never_reaches_vault() {
    let vault = Arc::new(NullVault::approving(info()));
    let wiring = wire(vault.clone());

    let forged = Envelope::request(1, ORIGIN, Request::Connect(request(&["aaaaa-aa"], None)));
    wiring.attacker.send(forged).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(vault.wakes(), 0);
    assert!(!wiring.relay.is_approved(ORIGIN));
    assert!(wiring.bridge.connection().is_none());
}
