//! Session refresh under concurrent command load

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chassismon_core::session::{
    DEFAULT_REFRESH_INTERVAL, SessionManager, TransportError, spawn_refresh,
};

use super::fixtures::{SlowConnector, text};

fn spawn_batch(
    manager: &Arc<SessionManager<SlowConnector>>,
    range: std::ops::Range<usize>,
) -> Vec<tokio::task::JoinHandle<Result<String, TransportError>>> {
    range
        .map(|i| {
            let manager = Arc::clone(manager);
            tokio::spawn(async move { manager.run_command(&format!("cmd-{i}"), text).await })
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn refresh_waits_for_in_flight_commands() {
    let manager = Arc::new(SessionManager::new(SlowConnector::new(Duration::from_millis(50))));
    manager.connect().await.unwrap();

    let before = spawn_batch(&manager, 0..8);
    tokio::time::sleep(Duration::from_millis(1)).await;

    let refresher = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;

    let after = spawn_batch(&manager, 8..16);

    for (i, result) in futures::future::join_all(before).await.into_iter().enumerate() {
        assert_eq!(result.unwrap().unwrap(), format!("1:cmd-{i}"));
    }
    assert!(refresher.await.unwrap());
    for (i, result) in futures::future::join_all(after).await.into_iter().enumerate() {
        assert_eq!(result.unwrap().unwrap(), format!("2:cmd-{}", i + 8));
    }

    assert_eq!(manager.generation(), 2);
    assert_eq!(manager.target(), "root@slow.test:22");
}

#[tokio::test(start_paused = true)]
async fn no_command_sees_a_half_closed_transport() {
    let connector = SlowConnector::new(Duration::from_millis(20));
    let violations = Arc::clone(&connector.violations);
    let manager = Arc::new(SessionManager::new(connector));
    manager.connect().await.unwrap();

    let mut handles = Vec::new();
    for round in 0..5 {
        handles.extend(spawn_batch(&manager, round * 10..round * 10 + 10));
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager.refresh().await;
            Ok(String::new())
        }));
        tokio::time::sleep(Duration::from_millis(7)).await;
    }

    for result in futures::future::join_all(handles).await {
        assert!(result.unwrap().is_ok());
    }
    assert_eq!(violations.load(Ordering::SeqCst), 0);
    assert_eq!(manager.generation(), 6);
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_surfaces_on_next_command() {
    let manager = Arc::new(SessionManager::new(
        SlowConnector::new(Duration::from_millis(10)).failing_after(1),
    ));
    manager.connect().await.unwrap();

    let running = spawn_batch(&manager, 0..4);
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(!manager.refresh().await);

    // Commands already running finish on the transport they started with
    for result in futures::future::join_all(running).await {
        assert!(result.unwrap().unwrap().starts_with("1:"));
    }
    let err = manager.run_command("after", text).await.unwrap_err();
    assert_eq!(err, TransportError::Closed);
}

#[tokio::test(start_paused = true)]
async fn scheduled_refresh_replaces_transport() {
    let manager = Arc::new(SessionManager::new(SlowConnector::new(Duration::from_millis(1))));
    manager.connect().await.unwrap();
    let first = manager.connected_at().await.unwrap();

    let handle = spawn_refresh(Arc::clone(&manager), DEFAULT_REFRESH_INTERVAL);

    tokio::time::sleep(DEFAULT_REFRESH_INTERVAL - Duration::from_secs(1)).await;
    assert_eq!(manager.generation(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(manager.generation(), 2);
    assert_eq!(manager.run_command("x", text).await.unwrap(), "2:x");
    assert!(manager.connected_at().await.unwrap() >= first);

    handle.stop().await;
    manager.close().await.unwrap();
}
