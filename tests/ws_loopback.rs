use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Mutex;

use linkwatch::endpoint::{self, PingResponder};
use linkwatch::{ConnectionState, LatencyProbe, LinkConfig, LinkMonitor, TungsteniteProbe};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

async fn spawn_endpoint() -> (String, Arc<Mutex<PingResponder>>) {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let responder = Arc::new(Mutex::new(PingResponder::new()));
    tokio::spawn(endpoint::serve(listener, Arc::clone(&responder)));
    (format!("ws://{addr}"), responder)
}

#[tokio::test(flavor = "multi_thread")]
async fn probe_round_trips_over_a_real_socket() {
    let (url, responder) = spawn_endpoint().await;

    let probe = LatencyProbe::new(TungsteniteProbe::new(url));
    let rtt = probe
        .sample(1, Duration::from_secs(5))
        .await
        .expect("loopback probe should succeed");

    assert!(rtt > Duration::ZERO);
    assert_eq!(responder.lock().await.response_times().samples, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn monitor_connects_over_a_real_socket() {
    let (url, _responder) = spawn_endpoint().await;

    let config = LinkConfig {
        heartbeat_interval: Duration::from_millis(50),
        probe_timeout: Duration::from_secs(5),
        ..LinkConfig::default()
    };
    let monitor = LinkMonitor::spawn("loopback", config, TungsteniteProbe::new(url));

    monitor.connect().await.unwrap();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if monitor.state().await.unwrap() == ConnectionState::Connected {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "monitor never connected over loopback"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let stats = monitor.stats().await.unwrap();
    assert!(stats.last_connected.is_some());
    assert_eq!(stats.packet_loss_pct, 0);

    monitor.shutdown().await.unwrap();
}
