//! End-to-end tests through the master facade

mod common;

use common::{Call, MockTransport};
use pretty_assertions::assert_eq;
use sensorlink_core::prelude::*;
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn quick_config() -> MasterConfig {
    MasterConfig {
        settle_delay_ms: 0,
        ..MasterConfig::default()
    }
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<MasterEvent>) -> Vec<MasterEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }
    seen
}

#[tokio::test(start_paused = true)]
async fn test_demo_round_trip() {
    let mut master = Master::new(MasterConfig::default()).unwrap();
    let mut rx = master.subscribe();

    let start = Instant::now();
    master
        .connect_with("demo", Box::new(DemoTransport::with_seed(7)))
        .await
        .unwrap();
    assert!(start.elapsed() >= Duration::from_millis(2000));
    assert_eq!(master.connection_state(), ConnectionState::Connected);
    assert_eq!(master.port_name(), Some("demo"));

    let cm = master.read_distance().await.unwrap();
    let presence = master.read_presence().await.unwrap();
    assert_eq!(master.set_relay(RelayState::On).await.unwrap(), RelayState::On);

    let readings = master.readings();
    assert_eq!(readings.distance_cm, Some(cm));
    assert_eq!(readings.presence, Some(presence));
    assert_eq!(master.relay_state(), RelayState::On);

    let stats = master.stats().unwrap();
    assert_eq!(stats.requests, 3);
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.tx_bytes, 4);
    assert_eq!(stats.rx_bytes, 9);

    assert_eq!(
        drain(&mut rx),
        vec![
            MasterEvent::ConnectionChanged(ConnectionState::Connected),
            MasterEvent::ReadingUpdated(Reading::Distance(cm)),
            MasterEvent::ReadingUpdated(Reading::Presence(presence)),
            MasterEvent::RelayChanged(RelayState::On),
        ]
    );
    assert_eq!(master.log().count(LogLevel::Error), 0);

    assert!(master.disconnect().await);
    assert_eq!(master.connection_state(), ConnectionState::Disconnected);
    // Last values stay on display after disconnect
    assert_eq!(master.readings().distance_cm, Some(cm));
}

#[tokio::test(start_paused = true)]
async fn test_operations_rejected_while_disconnected() {
    let mut master = Master::new(quick_config()).unwrap();
    let mut rx = master.subscribe();

    assert!(matches!(
        master.read_distance().await,
        Err(ProtocolError::NotConnected)
    ));
    assert!(matches!(
        master.read_presence().await,
        Err(ProtocolError::NotConnected)
    ));
    assert!(matches!(
        master.set_relay(RelayState::On).await,
        Err(ProtocolError::NotConnected)
    ));
    assert!(matches!(
        master.enable_auto_read(),
        Err(ProtocolError::NotConnected)
    ));

    assert_eq!(master.auto_read_state(), AutoReadState::Idle);
    assert_eq!(master.log().count(LogLevel::Error), 4);
    assert_eq!(master.log().len(), 4);
    assert!(!master.disconnect().await);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_connect_twice_rejected() {
    let mut master = Master::new(quick_config()).unwrap();
    let mock = MockTransport::slaves();
    master.connect_with("mock", mock.boxed()).await.unwrap();

    let second = MockTransport::slaves();
    let result = master.connect_with("other", second.boxed()).await;
    assert!(matches!(result, Err(ProtocolError::AlreadyConnected)));
    assert_eq!(master.port_name(), Some("mock"));
    assert!(second.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_connect_discards_stale_bytes() {
    let mut master = Master::new(quick_config()).unwrap();
    let mock = MockTransport::slaves();
    mock.preload(&[0x00, 0x24]);

    master.connect_with("mock", mock.boxed()).await.unwrap();
    assert_eq!(master.read_distance().await.unwrap(), 42);
    assert_eq!(mock.calls()[0], Call::DiscardAll);
}

#[tokio::test(start_paused = true)]
async fn test_connect_to_missing_port_logged() {
    let mut master = Master::new(quick_config()).unwrap();
    let result = master.connect("/dev/sensorlink-no-such-port").await;

    assert!(matches!(result, Err(ProtocolError::ConnectionFailed(_))));
    assert_eq!(master.connection_state(), ConnectionState::Disconnected);
    let entries = master.log().entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].message.starts_with("Connection failed"));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_auto_read() {
    let mut master = Master::new(quick_config()).unwrap();
    let mock = MockTransport::slaves();
    master.connect_with("mock", mock.boxed()).await.unwrap();

    master.enable_auto_read().unwrap();
    assert_eq!(master.auto_read_state(), AutoReadState::Enabled);
    sleep(Duration::from_millis(100)).await;

    assert!(master.disconnect().await);
    assert_eq!(master.auto_read_state(), AutoReadState::Idle);

    sleep(Duration::from_millis(2000)).await;
    let writes: Vec<Vec<u8>> = mock.writes().into_iter().map(|(_, b)| b).collect();
    assert_eq!(writes, vec![vec![b'U']]);
    assert_eq!(mock.calls().last(), Some(&Call::Close));
}

#[tokio::test(start_paused = true)]
async fn test_auto_read_through_master() {
    let mut master = Master::new(quick_config()).unwrap();
    let mock = MockTransport::slaves();
    master.connect_with("mock", mock.boxed()).await.unwrap();

    master.enable_auto_read().unwrap();
    sleep(Duration::from_millis(1700)).await;
    assert!(master.disable_auto_read().await);

    assert_eq!(master.readings().distance_cm, Some(42));
    assert_eq!(master.readings().presence, Some(Presence::Detected));
    assert_eq!(master.connection_state(), ConnectionState::Connected);
    assert_eq!(master.stats().unwrap().requests, 4);
}

#[tokio::test(start_paused = true)]
async fn test_link_failure_disconnects() {
    let mut master = Master::new(quick_config()).unwrap();
    let mut rx = master.subscribe();
    let mock = MockTransport::slaves();
    master.connect_with("mock", mock.boxed()).await.unwrap();

    mock.fail_reads();
    let err = master.read_distance().await.unwrap_err();
    assert!(err.is_transport_fault());
    assert_eq!(master.connection_state(), ConnectionState::Disconnected);
    assert_eq!(mock.calls().last(), Some(&Call::Close));

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, MasterEvent::TransportFault(_))));
    assert_eq!(
        events.last(),
        Some(&MasterEvent::ConnectionChanged(ConnectionState::Disconnected))
    );
}

#[tokio::test(start_paused = true)]
async fn test_mismatch_keeps_connection() {
    let mut master = Master::new(quick_config()).unwrap();
    let mock = MockTransport::scripted([vec![0x66, 0x03, 0x01]]);
    master.connect_with("mock", mock.boxed()).await.unwrap();

    let result = master.read_distance().await;
    assert!(matches!(result, Err(ProtocolError::ProtocolMismatch { .. })));
    assert_eq!(master.connection_state(), ConnectionState::Connected);
    assert_eq!(master.readings().distance_cm, None);
}

#[tokio::test(start_paused = true)]
async fn test_link_failure_during_auto_read_disconnects() {
    let mut master = Master::new(quick_config()).unwrap();
    let mock = MockTransport::slaves();
    master.connect_with("mock", mock.boxed()).await.unwrap();
    let mut rx = master.subscribe();

    master.enable_auto_read().unwrap();
    sleep(Duration::from_millis(100)).await;
    mock.fail_writes();
    sleep(Duration::from_millis(1500)).await;

    assert_eq!(master.auto_read_state(), AutoReadState::Idle);
    assert_eq!(master.connection_state(), ConnectionState::Disconnected);
    assert!(master.port_name().is_none());
    assert!(master.stats().is_none());
    assert_eq!(mock.calls().last(), Some(&Call::Close));

    // Not restartable on the dead link
    assert!(matches!(
        master.enable_auto_read(),
        Err(ProtocolError::NotConnected)
    ));
    assert_eq!(master.auto_read_state(), AutoReadState::Idle);

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, MasterEvent::TransportFault(_))));
    assert_eq!(
        events
            .iter()
            .filter(|e| **e == MasterEvent::ConnectionChanged(ConnectionState::Disconnected))
            .count(),
        1
    );

    // A fresh link can be opened afterwards
    let replacement = MockTransport::slaves();
    master
        .connect_with("mock", replacement.boxed())
        .await
        .unwrap();
    assert_eq!(master.read_distance().await.unwrap(), 42);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_after_auto_read_link_failure() {
    let mut master = Master::new(quick_config()).unwrap();
    let mock = MockTransport::slaves();
    master.connect_with("mock", mock.boxed()).await.unwrap();

    master.enable_auto_read().unwrap();
    sleep(Duration::from_millis(100)).await;
    mock.fail_writes();
    sleep(Duration::from_millis(600)).await;

    assert!(master.disconnect().await);
    assert!(!master.disconnect().await);
    assert_eq!(master.log().count(LogLevel::Info), 4);
}
