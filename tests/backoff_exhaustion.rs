use std::time::Duration;

use linkwatch::testing::ScriptedProbe;
use linkwatch::{ConnectionState, LinkConfig, LinkMonitor};

fn retry_config(max_retries: u32) -> LinkConfig {
    LinkConfig {
        max_retries,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
        heartbeat_interval: Duration::from_millis(25),
        probe_timeout: Duration::from_millis(200),
    }
}

async fn wait_for_state(
    monitor: &LinkMonitor<ScriptedProbe>,
    expected: ConnectionState,
    timeout: Duration,
) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if monitor.state().await.unwrap() == expected {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {expected:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn retries_stop_after_the_configured_budget() {
    let transport = ScriptedProbe::failing();
    let monitor = LinkMonitor::spawn("exhaustion", retry_config(3), transport.clone());

    monitor.connect().await.unwrap();

    // Initial probe plus three retries, then the monitor parks in Error.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if transport.probes() >= 4 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "retries never ran");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    wait_for_state(&monitor, ConnectionState::Error, Duration::from_secs(2)).await;

    let stats = monitor.stats().await.unwrap();
    assert_eq!(stats.reconnect_attempts, 3);
    assert_eq!(stats.packet_loss_pct, 100);

    // Terminal: no further probes are ever issued.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(transport.probes(), 4);

    monitor.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn manual_connect_from_error_probes_once_more() {
    let transport = ScriptedProbe::failing();
    let monitor = LinkMonitor::spawn("retry-from-error", retry_config(1), transport.clone());

    monitor.connect().await.unwrap();
    wait_for_state(&monitor, ConnectionState::Error, Duration::from_secs(2)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let settled = transport.probes();
    assert_eq!(settled, 2);

    // The attempt budget is already spent, so the manual retry fails
    // straight back into Error without scheduling more probes.
    monitor.connect().await.unwrap();
    wait_for_state(&monitor, ConnectionState::Error, Duration::from_secs(2)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.probes(), settled + 1);

    monitor.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn disconnect_cancels_a_pending_backoff_timer() {
    let transport = ScriptedProbe::failing();
    let config = LinkConfig {
        base_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(50),
        ..retry_config(5)
    };
    let monitor = LinkMonitor::spawn("cancel-backoff", config, transport.clone());

    // The failed connect probe schedules a 50ms reconnect.
    monitor.connect().await.unwrap();
    wait_for_state(&monitor, ConnectionState::Error, Duration::from_secs(2)).await;
    assert_eq!(transport.probes(), 1);

    monitor.disconnect().await.unwrap();
    wait_for_state(&monitor, ConnectionState::Disconnected, Duration::from_secs(1)).await;

    // The timer still fires, but its message is from a torn-down session
    // and must not reconnect or probe.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(monitor.state().await.unwrap(), ConnectionState::Disconnected);
    assert_eq!(transport.probes(), 1);

    monitor.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn backoff_delays_grow_between_attempts() {
    let transport = ScriptedProbe::failing();
    let monitor = LinkMonitor::spawn("backoff-growth", retry_config(3), transport.clone());

    let started = tokio::time::Instant::now();
    monitor.connect().await.unwrap();
    wait_for_state(&monitor, ConnectionState::Error, Duration::from_secs(5)).await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while transport.probes() < 4 {
        assert!(tokio::time::Instant::now() < deadline, "retries never finished");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // Delays of 10, 20, and 40ms (capped) must have elapsed in sequence.
    assert!(started.elapsed() >= Duration::from_millis(60));

    monitor.shutdown().await.unwrap();
}
