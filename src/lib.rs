//! Connection resilience layer for realtime clients.
//!
//! The crate keeps a client durably and observably connected to a remote
//! service over an imperfect network: a stateless latency probe measures
//! round trips, and a monitor actor owns the lifecycle state machine,
//! heartbeat scheduling, rolling link statistics, and exponential-backoff
//! reconnection. Applications consume it through [`LinkMonitor`] and a
//! subscription feed of [`ConnectionStats`] snapshots.

pub mod core;
pub mod endpoint;
pub mod monitor;
pub mod probe;
pub mod testing;
pub mod tls;

pub use crate::core::{
    ConnectionState, ConnectionStats, LinkConfig, LinkConfigPatch, LinkError, LinkResult,
    ProbeRequest, ProbeResponse, SubscriberId,
};
pub use crate::monitor::{
    GetState, GetStats, LinkEvent, LinkMonitor, LinkMonitorActor, LinkMonitorArgs, Subscribe,
};
pub use crate::probe::{LatencyProbe, ProbeTransport, TungsteniteProbe};
