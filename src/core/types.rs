use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience result alias for link operations.
pub type LinkResult<T> = Result<T, LinkError>;

/// Canonical error surface for the resilience layer.
///
/// Probe failures never escape the monitor's public operations; they are
/// captured internally and represented as state transitions. The variants
/// exist so logs can name the cause, not so callers can branch on it.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("probe timed out after {deadline_ms}ms")]
    ProbeTimeout { deadline_ms: u64 },

    #[error("probe rejected: {reason}")]
    ProbeRejected { reason: String },

    #[error("reconnect attempts exhausted after {attempts}")]
    RetriesExhausted { attempts: u32 },

    #[error("transport error ({context}): {error}")]
    Transport {
        context: &'static str,
        error: String,
    },

    #[error("actor error: {0}")]
    Actor(String),
}

/// Lifecycle state of the managed link. Exactly one is active at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

// Manual impl: `#[derive(kameo::Reply)]` expands to a `Self::Error` path
// that is ambiguous with the `Error` variant above.
impl kameo::Reply for ConnectionState {
    type Ok = ConnectionState;
    type Error = kameo::error::Infallible;
    type Value = ConnectionState;

    #[inline]
    fn to_result(self) -> Result<ConnectionState, kameo::error::Infallible> {
        Ok(self)
    }

    #[inline]
    fn into_any_err(self) -> Option<Box<dyn kameo::reply::ReplyError>> {
        None
    }

    #[inline]
    fn into_value(self) -> ConnectionState {
        self
    }
}

/// Read-only snapshot of link health, derived on demand and handed to
/// subscribers. Subscribers receive owned copies and cannot mutate the
/// monitor's state through them.
#[derive(Clone, Debug, Serialize, kameo::Reply)]
pub struct ConnectionStats {
    pub state: ConnectionState,
    /// Mean round-trip latency over the rolling window, rounded to ms.
    pub latency_ms: u64,
    /// Mean absolute difference between consecutive latency samples, rounded
    /// to ms. Zero below two samples.
    pub jitter_ms: u64,
    /// Percentage of probes sent but never acknowledged, cumulative over the
    /// monitor's lifetime.
    pub packet_loss_pct: u8,
    /// Consecutive failed reconnect attempts since the last successful
    /// connect.
    pub reconnect_attempts: u32,
    pub last_connected: Option<SystemTime>,
    /// Elapsed time since the current connected session began; zero while
    /// not connected.
    pub uptime: Duration,
}

/// Wire request sent by the latency probe to the reachability endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRequest {
    pub seq: u64,
    pub client_ts_us: i64,
}

/// Wire response echoed by the reachability endpoint. The client never uses
/// the server timestamp for latency math (elapsed time is measured by a
/// monotonic clock at the call site); it exists for server-side diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResponse {
    pub seq: u64,
    pub client_ts_us: i64,
    pub server_ts_us: i64,
}

/// Opaque handle returned by subscription registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, kameo::Reply)]
pub struct SubscriberId(pub u64);

/// Callback invoked with a fresh snapshot on every state or statistics
/// change.
pub type StatsCallback = Box<dyn Fn(&ConnectionStats) + Send + Sync + 'static>;

/// Best-effort current time as Unix epoch microseconds.
#[inline]
pub fn now_epoch_us() -> i64 {
    use std::time::UNIX_EPOCH;
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_micros().min(i64::MAX as u128) as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_state_serializes_lowercase() {
        let json = sonic_rs::to_string(&ConnectionState::Reconnecting).unwrap();
        assert_eq!(json, "\"reconnecting\"");
    }

    #[test]
    fn probe_request_round_trips_through_json() {
        let request = ProbeRequest {
            seq: 7,
            client_ts_us: 1_700_000_000_000_000,
        };
        let bytes = sonic_rs::to_vec(&request).unwrap();
        let decoded: ProbeRequest = sonic_rs::from_slice(&bytes).unwrap();
        assert_eq!(decoded, request);
    }
}
