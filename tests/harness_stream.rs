//! End-to-end harness tests over a real loopback socket.
//!
//! These drive the full path — TCP delivery, frame reassembly, decoding,
//! validation, statistics — the way a telemetry client would, including
//! chunked deliveries, malformed payloads, and reconnects.

use std::time::Duration;

use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::sleep;

use warroom::{ConnectionState, FramingMode, Harness, HarnessConfig, HarnessHandle};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("warroom=debug").with_test_writer().try_init();
}

fn full_update_json(sequence: i64) -> serde_json::Value {
    json!({
        "type": "full_update",
        "schema_version": "1.0",
        "timestamp": sequence as f64 * 0.33,
        "game_frame": sequence * 30,
        "game_time": sequence as f64,
        "is_paused": false,
        "game_speed": 1.0,
        "teams": [{"id": 0}, {"id": 1}],
        "units": [
            {"id": 1, "position": [12.0, 0.0, 34.0]},
            {"id": 2, "position": [56.0, 0.0, 78.0]}
        ],
        "is_spectator": false,
        "sequence": sequence
    })
}

fn frame_prefixed(payload: &[u8]) -> Vec<u8> {
    let mut wire = Vec::with_capacity(payload.len() + 4);
    wire.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    wire.extend_from_slice(payload);
    wire
}

async fn bind_harness(framing: FramingMode) -> anyhow::Result<(Harness, HarnessHandle)> {
    let config = HarnessConfig { framing, ..HarnessConfig::ephemeral() };
    let harness = Harness::bind(config).await?;
    let handle = harness.handle();
    Ok((harness, handle))
}

/// Poll until `check` passes or a 5 s deadline expires.
async fn wait_for(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn newline_client_end_to_end() -> anyhow::Result<()> {
    init_tracing();
    let (harness, handle) = bind_harness(FramingMode::NewlineDelimited).await?;

    let mut client = TcpStream::connect(harness.local_addr()).await?;
    for seq in 1..=3 {
        client.write_all(full_update_json(seq).to_string().as_bytes()).await?;
        client.write_all(b"\n").await?;
    }
    client.flush().await?;

    wait_for("3 packets", || handle.snapshot().packets_received == 3).await;

    let snap = handle.snapshot();
    assert_eq!(snap.decode_errors, 0);
    assert_eq!(snap.variant_counts.get("full_update"), Some(&3));
    let units = snap.unit_stats.expect("unit stats");
    assert_eq!(units.min, 2);
    assert_eq!(units.max, 2);

    let verdict = handle.last_verdict().expect("verdict");
    assert!(verdict.passed(), "unexpected errors: {:?}", verdict.errors);
    assert!(verdict.warnings.is_empty());

    assert_eq!(handle.last_message().unwrap().sequence(), Some(3));
    assert_eq!(handle.last_schema_version(), Some("1.0".to_string()));
    assert_eq!(handle.connection_status().state, ConnectionState::Connected);
    assert!(handle.connection_status().to_string().starts_with("STABLE"));

    harness.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn length_prefixed_client_end_to_end() -> anyhow::Result<()> {
    init_tracing();
    let (harness, handle) = bind_harness(FramingMode::LengthPrefixed).await?;

    let mut client = TcpStream::connect(harness.local_addr()).await?;
    let mut wire = Vec::new();
    for seq in 1..=2 {
        wire.extend_from_slice(&frame_prefixed(full_update_json(seq).to_string().as_bytes()));
    }
    // Both frames in a single delivery
    client.write_all(&wire).await?;
    client.flush().await?;

    wait_for("2 packets", || handle.snapshot().packets_received == 2).await;
    assert!(handle.last_verdict().unwrap().passed());

    harness.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn auto_mode_sniffs_both_conventions() -> anyhow::Result<()> {
    init_tracing();

    // Newline client against an Auto harness
    let (harness, handle) = bind_harness(FramingMode::Auto).await?;
    let mut client = TcpStream::connect(harness.local_addr()).await?;
    client.write_all(full_update_json(1).to_string().as_bytes()).await?;
    client.write_all(b"\n").await?;
    client.flush().await?;
    wait_for("newline packet", || handle.snapshot().packets_received == 1).await;
    drop(client);
    harness.shutdown();

    // Length-prefixed client against a fresh Auto harness
    let (harness, handle) = bind_harness(FramingMode::Auto).await?;
    let mut client = TcpStream::connect(harness.local_addr()).await?;
    client.write_all(&frame_prefixed(full_update_json(1).to_string().as_bytes())).await?;
    client.flush().await?;
    wait_for("prefixed packet", || handle.snapshot().packets_received == 1).await;

    harness.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn chunked_delivery_reassembles_identically() -> anyhow::Result<()> {
    init_tracing();
    let (harness, handle) = bind_harness(FramingMode::LengthPrefixed).await?;

    let mut client = TcpStream::connect(harness.local_addr()).await?;
    let wire = frame_prefixed(full_update_json(1).to_string().as_bytes());

    // Deliver in awkward slices: inside the prefix, then inside the payload
    client.write_all(&wire[..2]).await?;
    client.flush().await?;
    sleep(Duration::from_millis(30)).await;
    assert_eq!(handle.snapshot().packets_received, 0);

    client.write_all(&wire[2..10]).await?;
    client.flush().await?;
    sleep(Duration::from_millis(30)).await;
    assert_eq!(handle.snapshot().packets_received, 0);

    client.write_all(&wire[10..]).await?;
    client.flush().await?;

    wait_for("reassembled packet", || handle.snapshot().packets_received == 1).await;
    assert!(handle.last_verdict().unwrap().passed());

    harness.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_payload_is_counted_not_fatal() -> anyhow::Result<()> {
    init_tracing();
    let (harness, handle) = bind_harness(FramingMode::NewlineDelimited).await?;

    let mut client = TcpStream::connect(harness.local_addr()).await?;
    client.write_all(b"{\"truncated\":\n").await?;
    client.write_all(full_update_json(1).to_string().as_bytes()).await?;
    client.write_all(b"\n").await?;
    client.flush().await?;

    wait_for("valid packet after garbage", || handle.snapshot().packets_received == 1).await;

    let snap = handle.snapshot();
    assert_eq!(snap.decode_errors, 1);
    assert!(handle.last_verdict().unwrap().passed());

    harness.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_frame_drops_connection_but_not_harness() -> anyhow::Result<()> {
    init_tracing();
    let config = HarnessConfig {
        framing: FramingMode::LengthPrefixed,
        max_frame_len: 256,
        ..HarnessConfig::ephemeral()
    };
    let harness = Harness::bind(config).await?;
    let handle = harness.handle();

    let mut client = TcpStream::connect(harness.local_addr()).await?;
    client.write_all(&1_000_000u32.to_be_bytes()).await?;
    client.flush().await?;

    wait_for("connection dropped", || {
        handle.connection_status().state == ConnectionState::Disconnected
    })
    .await;

    // Harness still accepts a fresh, well-behaved client
    let mut client = TcpStream::connect(harness.local_addr()).await?;
    client.write_all(&frame_prefixed(full_update_json(1).to_string().as_bytes())).await?;
    client.flush().await?;
    wait_for("packet after reconnect", || handle.snapshot().packets_received == 1).await;

    harness.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn reconnect_resets_sequence_state() -> anyhow::Result<()> {
    init_tracing();
    let (harness, handle) = bind_harness(FramingMode::NewlineDelimited).await?;

    let mut client = TcpStream::connect(harness.local_addr()).await?;
    client.write_all(full_update_json(40).to_string().as_bytes()).await?;
    client.write_all(b"\n").await?;
    client.flush().await?;
    wait_for("first connection packet", || handle.snapshot().packets_received == 1).await;
    drop(client);

    wait_for("disconnect observed", || {
        handle.connection_status().state == ConnectionState::Disconnected
    })
    .await;

    // A fresh connection starting back at 1 must not look like a regression
    let mut client = TcpStream::connect(harness.local_addr()).await?;
    client.write_all(full_update_json(1).to_string().as_bytes()).await?;
    client.write_all(b"\n").await?;
    client.flush().await?;
    wait_for("second connection packet", || handle.snapshot().packets_received == 2).await;

    let verdict = handle.last_verdict().expect("verdict");
    assert!(verdict.warnings.is_empty(), "unexpected warnings: {:?}", verdict.warnings);

    harness.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn state_watch_sees_lifecycle_transitions() -> anyhow::Result<()> {
    init_tracing();
    let (harness, handle) = bind_harness(FramingMode::NewlineDelimited).await?;
    let mut states = handle.subscribe_state();
    assert_eq!(*states.borrow(), ConnectionState::Idle);

    let client = TcpStream::connect(harness.local_addr()).await?;
    states.changed().await?;
    assert_eq!(*states.borrow_and_update(), ConnectionState::Connected);

    drop(client);
    states.changed().await?;
    assert_eq!(*states.borrow_and_update(), ConnectionState::Disconnected);

    harness.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn revalidate_last_matches_original_verdict() -> anyhow::Result<()> {
    init_tracing();
    let (harness, handle) = bind_harness(FramingMode::NewlineDelimited).await?;
    assert!(handle.revalidate_last().is_none());

    let mut client = TcpStream::connect(harness.local_addr()).await?;
    // Missing `units`, fractional `game_frame`: two errors, zero warnings
    let bad = json!({
        "schema_version": "1.0",
        "game_frame": 1.5,
        "game_seconds": 2.0,
        "teams": []
    });
    client.write_all(bad.to_string().as_bytes()).await?;
    client.write_all(b"\n").await?;
    client.flush().await?;

    wait_for("bad packet recorded", || handle.snapshot().packets_received == 1).await;

    let original = handle.last_verdict().expect("verdict");
    assert_eq!(original.errors.len(), 2);
    assert!(original.warnings.is_empty());

    let revalidated = handle.revalidate_last().expect("revalidation");
    assert_eq!(revalidated, original);

    // The invalid message is last-received but never last-known-good
    assert!(handle.last_message().is_some());
    assert!(handle.last_known_good().is_none());

    harness.shutdown();
    Ok(())
}
