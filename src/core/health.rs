use std::time::{Duration, Instant, SystemTime};

use super::circular_buffer::CircularBuffer;
use super::types::{ConnectionState, ConnectionStats};

/// Number of latency samples retained for the rolling window.
pub const LATENCY_WINDOW: usize = 30;

/// Rolling link statistics owned by the monitor actor.
///
/// The latency window deliberately survives reconnects: a new session on the
/// same logical link resumes with the previous samples until they age out by
/// eviction. Probe counters are cumulative over the monitor's lifetime, so
/// `packet_loss_pct` reflects lifetime loss, not per-session loss.
#[derive(Debug)]
pub struct LinkHealth {
    latency: CircularBuffer<f64>,
    probes_sent: u64,
    probes_acked: u64,
    reconnect_attempts: u32,
    last_connected: Option<SystemTime>,
    session_started: Option<Instant>,
}

impl LinkHealth {
    pub fn new() -> Self {
        Self {
            latency: CircularBuffer::new(LATENCY_WINDOW),
            probes_sent: 0,
            probes_acked: 0,
            reconnect_attempts: 0,
            last_connected: None,
            session_started: None,
        }
    }

    pub fn record_probe_sent(&mut self) {
        self.probes_sent = self.probes_sent.saturating_add(1);
    }

    pub fn record_probe_acked(&mut self, rtt: Duration) {
        self.probes_acked = self.probes_acked.saturating_add(1);
        self.latency.push(rtt.as_secs_f64() * 1_000.0);
    }

    pub fn increment_reconnect(&mut self) -> u32 {
        self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
        self.reconnect_attempts
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn reset_attempts(&mut self) {
        self.reconnect_attempts = 0;
    }

    /// Stamp a successful connect: attempts reset, session clock restarts.
    pub fn mark_connected(&mut self) {
        self.reconnect_attempts = 0;
        self.last_connected = Some(SystemTime::now());
        self.session_started = Some(Instant::now());
    }

    pub fn clear_session(&mut self) {
        self.session_started = None;
    }

    pub fn snapshot(&self, state: ConnectionState) -> ConnectionStats {
        let uptime = match (state, self.session_started) {
            (ConnectionState::Connected, Some(started)) => started.elapsed(),
            _ => Duration::ZERO,
        };

        ConnectionStats {
            state,
            latency_ms: self.mean_latency_ms(),
            jitter_ms: self.jitter_ms(),
            packet_loss_pct: self.packet_loss_pct(),
            reconnect_attempts: self.reconnect_attempts,
            last_connected: self.last_connected,
            uptime,
        }
    }

    fn mean_latency_ms(&self) -> u64 {
        if self.latency.is_empty() {
            return 0;
        }
        let sum: f64 = self.latency.iter().sum();
        (sum / self.latency.len() as f64).round() as u64
    }

    fn jitter_ms(&self) -> u64 {
        if self.latency.len() < 2 {
            return 0;
        }
        let mut total = 0.0;
        let mut previous: Option<f64> = None;
        for &sample in self.latency.iter() {
            if let Some(prev) = previous {
                total += (sample - prev).abs();
            }
            previous = Some(sample);
        }
        (total / (self.latency.len() - 1) as f64).round() as u64
    }

    fn packet_loss_pct(&self) -> u8 {
        if self.probes_sent == 0 {
            return 0;
        }
        let lost = self.probes_sent - self.probes_acked.min(self.probes_sent);
        ((lost as f64 / self.probes_sent as f64) * 100.0).round() as u8
    }
}

impl Default for LinkHealth {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acked(health: &mut LinkHealth, ms: u64) {
        health.record_probe_sent();
        health.record_probe_acked(Duration::from_millis(ms));
    }

    #[test]
    fn mean_and_jitter_over_sample_window() {
        let mut health = LinkHealth::new();
        for ms in [100, 120, 90] {
            acked(&mut health, ms);
        }

        let stats = health.snapshot(ConnectionState::Connected);
        assert_eq!(stats.latency_ms, 103);
        assert_eq!(stats.jitter_ms, 25);
    }

    #[test]
    fn jitter_is_zero_below_two_samples() {
        let mut health = LinkHealth::new();
        assert_eq!(health.snapshot(ConnectionState::Disconnected).jitter_ms, 0);

        acked(&mut health, 50);
        assert_eq!(health.snapshot(ConnectionState::Disconnected).jitter_ms, 0);
    }

    #[test]
    fn packet_loss_tracks_sent_versus_acked() {
        let mut health = LinkHealth::new();
        assert_eq!(health.snapshot(ConnectionState::Disconnected).packet_loss_pct, 0);

        acked(&mut health, 10);
        acked(&mut health, 10);
        health.record_probe_sent(); // lost
        let stats = health.snapshot(ConnectionState::Connected);
        assert_eq!(stats.packet_loss_pct, 33);
    }

    #[test]
    fn window_evicts_oldest_sample() {
        let mut health = LinkHealth::new();
        acked(&mut health, 1_000);
        for _ in 0..LATENCY_WINDOW {
            acked(&mut health, 10);
        }

        // The 1000ms outlier has been evicted.
        let stats = health.snapshot(ConnectionState::Connected);
        assert_eq!(stats.latency_ms, 10);
    }

    #[test]
    fn uptime_is_zero_unless_connected() {
        let mut health = LinkHealth::new();
        assert_eq!(
            health.snapshot(ConnectionState::Disconnected).uptime,
            Duration::ZERO
        );

        health.mark_connected();
        assert_eq!(
            health.snapshot(ConnectionState::Reconnecting).uptime,
            Duration::ZERO
        );
        assert!(health.snapshot(ConnectionState::Connected).last_connected.is_some());
    }

    #[test]
    fn mark_connected_resets_attempts() {
        let mut health = LinkHealth::new();
        health.increment_reconnect();
        health.increment_reconnect();
        assert_eq!(health.reconnect_attempts(), 2);

        health.mark_connected();
        assert_eq!(health.reconnect_attempts(), 0);
    }
}
