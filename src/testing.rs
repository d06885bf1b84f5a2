//! Reusable test utilities for exercising the monitor actor without a real
//! socket.
//!
//! [`ScriptedProbe`] plays back a sequence of probe outcomes so tests can
//! drive the state machine deterministically: successful connects, endpoint
//! rejections, and hung probes that only resolve through the deadline.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::{LinkError, ProbeRequest, ProbeResponse, now_epoch_us};
use crate::probe::{ProbeFuture, ProbeTransport};

/// One scripted probe outcome.
#[derive(Clone, Copy, Debug)]
pub enum ProbeScript {
    /// Respond successfully after `rtt`.
    Respond { rtt: Duration },
    /// Fail immediately, as if the endpoint returned a non-success result.
    Reject,
    /// Never resolve; the probe deadline converts this into a timeout.
    Hang,
}

/// Probe transport that pops outcomes from a script, falling back to a fixed
/// outcome once the script is exhausted.
#[derive(Clone)]
pub struct ScriptedProbe {
    script: Arc<std::sync::Mutex<VecDeque<ProbeScript>>>,
    fallback: ProbeScript,
    probes: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    pub fn with_script(script: Vec<ProbeScript>, fallback: ProbeScript) -> Self {
        Self {
            script: Arc::new(std::sync::Mutex::new(script.into())),
            fallback,
            probes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every probe succeeds after `rtt`.
    pub fn always(rtt: Duration) -> Self {
        Self::with_script(Vec::new(), ProbeScript::Respond { rtt })
    }

    /// Every probe is rejected.
    pub fn failing() -> Self {
        Self::with_script(Vec::new(), ProbeScript::Reject)
    }

    /// Number of probes issued so far.
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

impl ProbeTransport for ScriptedProbe {
    fn round_trip(&self, request: ProbeRequest) -> ProbeFuture {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .expect("probe script lock poisoned")
            .pop_front()
            .unwrap_or(self.fallback);

        Box::pin(async move {
            match step {
                ProbeScript::Respond { rtt } => {
                    if !rtt.is_zero() {
                        tokio::time::sleep(rtt).await;
                    }
                    Ok(ProbeResponse {
                        seq: request.seq,
                        client_ts_us: request.client_ts_us,
                        server_ts_us: now_epoch_us(),
                    })
                }
                ProbeScript::Reject => Err(LinkError::ProbeRejected {
                    reason: "scripted rejection".to_string(),
                }),
                ProbeScript::Hang => {
                    futures_util::future::pending::<()>().await;
                    unreachable!("pending future never resolves")
                }
            }
        })
    }
}
