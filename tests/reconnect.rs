//! Reconnection and state-recovery tests against in-process mocks.

mod harness;

use std::sync::Arc;
use std::time::Duration;

use harness::{GatewayOptions, MockAuthServer, MockGateway};

use chatload::{
    Actor, CredentialPool, HarnessConfig, Metrics, Timeouts, connect,
};

fn reconnect_config(auth: &MockAuthServer, gateway: &MockGateway) -> HarnessConfig {
    HarnessConfig::new(&auth.base_url(), &gateway.ws_url())
        .unwrap()
        .with_timeouts(Timeouts::new(
            Duration::from_secs(5),
            Duration::from_millis(400),
            Duration::from_millis(50),
        ))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reconnect_recovers_room_state() {
    let auth = MockAuthServer::spawn().await;
    let gateway = MockGateway::spawn().await;
    let config = Arc::new(reconnect_config(&auth, &gateway));
    let pool = CredentialPool::fixed(1);
    let metrics = Metrics::new();

    let actor = Actor::new(0, config, &pool, metrics.clone()).unwrap();
    let report = actor
        .run_reconnect_cycle("reconnect_room_0", chatload::RoomType::Channel)
        .await
        .unwrap();

    assert!(report.joined_before);
    assert!(report.joined_after);
    assert!(report.recovered);
    assert!(!report.is_degraded());
    assert!(report.reconnect_duration.is_some());
    assert!(report.outage >= Duration::from_secs(3));
    assert!(report.outage <= Duration::from_secs(5));

    assert_eq!(metrics.reconnect_attempts(), 1);
    assert_eq!(metrics.reconnects_succeeded(), 1);
    assert_eq!(metrics.recovery_failures(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lost_room_state_is_reported_as_recovery_failure() {
    let auth = MockAuthServer::spawn().await;
    let gateway = MockGateway::spawn_with(GatewayOptions {
        fail_rejoin: true,
        ..GatewayOptions::default()
    })
    .await;
    let config = Arc::new(reconnect_config(&auth, &gateway));
    let pool = CredentialPool::fixed(1);
    let metrics = Metrics::new();

    let actor = Actor::new(0, config, &pool, metrics.clone()).unwrap();
    let report = actor
        .run_reconnect_cycle("reconnect_room_0", chatload::RoomType::Channel)
        .await
        .unwrap();

    // Joined before the outage, rejected after: degraded, never silent.
    assert!(report.joined_before);
    assert!(!report.joined_after);
    assert!(!report.recovered);
    assert!(report.is_degraded());
    assert_eq!(metrics.recovery_failures(), 1);
}

#[tokio::test]
async fn test_each_attempt_is_a_distinct_connection() {
    let auth = MockAuthServer::spawn().await;
    let gateway = MockGateway::spawn().await;
    let config = reconnect_config(&auth, &gateway);

    let client = chatload::AuthClient::new(url::Url::parse(&auth.base_url()).unwrap()).unwrap();
    let session = client
        .acquire_session(&chatload::Credentials::numbered(1))
        .await
        .unwrap();

    let first = connect(&config, &session).await.unwrap();
    let first_duration = first.connect_duration();
    first.close().await;

    let second = connect(&config, &session).await.unwrap();
    assert!(second.is_established());
    // A fresh attempt has its own measurement; both are bounded.
    assert!(first_duration <= config.timeouts.connect);
    assert!(second.connect_duration() <= config.timeouts.connect);
    second.close().await;
}
