//! Stateless round-trip latency measurement.
//!
//! [`ProbeTransport`] is the IO seam: implementations perform one
//! request/response exchange with the reachability endpoint and know nothing
//! about deadlines or statistics. [`LatencyProbe`] adds the deadline and the
//! monotonic elapsed-time measurement. All state (sequence counter, sample
//! window, loss counters) lives one level up in the monitor.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use crate::core::{LinkError, ProbeRequest, ProbeResponse, now_epoch_us};

pub mod tungstenite;

pub use tungstenite::TungsteniteProbe;

/// Boxed future returned by [`ProbeTransport::round_trip`].
pub type ProbeFuture = Pin<Box<dyn Future<Output = Result<ProbeResponse, LinkError>> + Send>>;

/// One round trip to the reachability endpoint.
///
/// Intentionally minimal so transports can be swapped (websocket vs. an
/// in-memory script in tests) while the probe and monitor stay unchanged.
pub trait ProbeTransport: Clone + Send + Sync + 'static {
    fn round_trip(&self, request: ProbeRequest) -> ProbeFuture;
}

/// Measures a single round trip against a deadline.
#[derive(Clone)]
pub struct LatencyProbe<T>
where
    T: ProbeTransport,
{
    transport: T,
}

impl<T> LatencyProbe<T>
where
    T: ProbeTransport,
{
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Send one probe and return the elapsed round-trip time.
    ///
    /// Elapsed time is measured by `Instant` at the call site, never from
    /// server-reported timestamps, so the result captures transport latency
    /// rather than clock skew. Timeout and endpoint rejection are both
    /// failures; callers treat them identically (the variant only feeds
    /// logging).
    pub async fn sample(&self, seq: u64, deadline: Duration) -> Result<Duration, LinkError> {
        let request = ProbeRequest {
            seq,
            client_ts_us: now_epoch_us(),
        };
        let started = Instant::now();

        let response = match tokio::time::timeout(deadline, self.transport.round_trip(request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                tracing::debug!(seq, error = %err, "probe failed");
                return Err(err);
            }
            Err(_) => {
                let deadline_ms = deadline.as_millis().min(u64::MAX as u128) as u64;
                tracing::debug!(seq, deadline_ms, "probe deadline exceeded");
                return Err(LinkError::ProbeTimeout { deadline_ms });
            }
        };

        if response.seq != seq {
            return Err(LinkError::ProbeRejected {
                reason: format!("sequence mismatch: sent {seq}, received {}", response.seq),
            });
        }

        Ok(started.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ProbeScript, ScriptedProbe};

    #[tokio::test]
    async fn sample_measures_elapsed_time() {
        let probe = LatencyProbe::new(ScriptedProbe::always(Duration::from_millis(20)));
        let rtt = probe
            .sample(1, Duration::from_secs(1))
            .await
            .expect("probe should succeed");
        assert!(rtt >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn sample_times_out_against_deadline() {
        let probe = LatencyProbe::new(ScriptedProbe::with_script(
            vec![ProbeScript::Hang],
            ProbeScript::Hang,
        ));
        let err = probe
            .sample(1, Duration::from_millis(20))
            .await
            .expect_err("hung transport must time out");
        assert!(matches!(err, LinkError::ProbeTimeout { deadline_ms: 20 }));
    }

    #[tokio::test]
    async fn sample_surfaces_rejection() {
        let probe = LatencyProbe::new(ScriptedProbe::failing());
        let err = probe
            .sample(1, Duration::from_secs(1))
            .await
            .expect_err("rejection must fail the sample");
        assert!(matches!(err, LinkError::ProbeRejected { .. }));
    }
}
