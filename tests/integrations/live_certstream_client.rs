//! Live integration test for the CertStream client.
//!
//! This test requires a local certstream server running at ws://127.0.0.1:8181
//! and is enabled with the `live-tests` feature flag.
//!
//! To run this test:
//! `cargo test --test live_certstream_client --features live-tests -- --nocapture`

#![cfg(feature = "live-tests")]

use brandwatch::network::CertStreamClient;
use std::time::Duration;
use tokio::sync::watch;

const LIVE_URL: &str = "ws://127.0.0.1:8181";

#[tokio::test]
async fn test_live_client_receives_certificate_updates() {
    let (tx, rx) = async_channel::bounded(1_000);
    let client = CertStreamClient::new(LIVE_URL.to_string(), tx, true);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let client_task = tokio::spawn(async move { client.run(shutdown_rx).await });

    let received = tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            match rx.recv().await {
                Ok(event) if event.carries_domains() => return Some(event),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    })
    .await
    .expect("no certificate update within 30 seconds");

    let event = received.expect("event channel closed before any update arrived");
    println!(
        "Received {} domains (issuer: {:?})",
        event.domains.len(),
        event.issuer_org
    );
    assert!(!event.domains.is_empty());

    shutdown_tx.send(true).unwrap();
    client_task.await.unwrap().unwrap();
}
