//! Connection resilience monitor actor.
//!
//! The actor owns all lifecycle state; heartbeat ticks, backoff timers, and
//! probe completions arrive as messages, so the mailbox is the single
//! serialization point and no two probes are ever in flight at once. Timer
//! tasks carry the epoch current at spawn time: after a teardown bumps the
//! epoch, anything a stale timer or late probe sends back is discarded.

use std::time::Duration;

use kameo::error::ActorStopReason;
use kameo::prelude::{Actor, ActorRef, Context, Message as KameoMessage, WeakActorRef};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::core::{
    ConnectionState, ConnectionStats, ExponentialBackoff, LinkConfig, LinkConfigPatch, LinkError,
    LinkHealth, StatsCallback, SubscriberId,
};
use crate::probe::{LatencyProbe, ProbeTransport};

/// Arguments passed when constructing a monitor actor instance.
pub struct LinkMonitorArgs<T>
where
    T: ProbeTransport,
{
    /// Label used in logs to identify the monitored link.
    pub label: String,
    pub config: LinkConfig,
    pub transport: T,
}

/// The connection resilience state machine.
pub struct LinkMonitorActor<T>
where
    T: ProbeTransport,
{
    label: String,
    config: LinkConfig,
    probe: LatencyProbe<T>,
    health: LinkHealth,
    state: ConnectionState,
    /// Session generation; bumped on every teardown to invalidate timers and
    /// in-flight probes spawned for a previous session.
    epoch: u64,
    probe_seq: u64,
    probe_in_flight: bool,
    reconnect_pending: bool,
    heartbeat_task: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    subscribers: Vec<(SubscriberId, StatsCallback)>,
    next_subscriber: u64,
    actor_ref: ActorRef<Self>,
}

impl<T> Actor for LinkMonitorActor<T>
where
    T: ProbeTransport,
{
    type Args = LinkMonitorArgs<T>;
    type Error = LinkError;

    fn name() -> &'static str {
        "LinkMonitorActor"
    }

    async fn on_start(args: Self::Args, ctx: ActorRef<Self>) -> Result<Self, Self::Error> {
        let LinkMonitorArgs {
            label,
            config,
            transport,
        } = args;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            label,
            config: config.sanitized(),
            probe: LatencyProbe::new(transport),
            health: LinkHealth::new(),
            state: ConnectionState::Disconnected,
            epoch: 0,
            probe_seq: 0,
            probe_in_flight: false,
            reconnect_pending: false,
            heartbeat_task: None,
            shutdown_tx,
            shutdown_rx,
            subscribers: Vec::new(),
            next_subscriber: 0,
            actor_ref: ctx,
        })
    }

    async fn on_stop(
        &mut self,
        _ctx: WeakActorRef<Self>,
        _reason: ActorStopReason,
    ) -> Result<(), Self::Error> {
        self.teardown();
        self.subscribers.clear();
        Ok(())
    }
}

/// Events processed by the monitor actor.
#[derive(Debug)]
pub enum LinkEvent {
    Connect,
    Disconnect,
    ForceReconnect,
    Configure(LinkConfigPatch),
    Unsubscribe(SubscriberId),
    /// Emitted by the heartbeat loop while connected.
    HeartbeatTick { epoch: u64 },
    /// Emitted by a backoff timer once its delay elapses.
    BackoffElapsed { epoch: u64 },
    /// Completion of an issued probe.
    ProbeSettled {
        epoch: u64,
        outcome: Result<Duration, LinkError>,
    },
}

impl<T> KameoMessage<LinkEvent> for LinkMonitorActor<T>
where
    T: ProbeTransport,
{
    type Reply = ();

    async fn handle(&mut self, event: LinkEvent, _ctx: &mut Context<Self, Self::Reply>) {
        match event {
            LinkEvent::Connect => self.handle_connect(),
            LinkEvent::Disconnect => {
                self.teardown();
                self.transition(ConnectionState::Disconnected);
            }
            LinkEvent::ForceReconnect => self.handle_force_reconnect(),
            LinkEvent::Configure(patch) => {
                self.config = self.config.patched(patch);
                debug!(connection = %self.label, config = ?self.config, "link config updated");
                // A live interval change takes effect now, not after the
                // next reconnect; the restarted ticker fires one new
                // interval from here.
                if self.state == ConnectionState::Connected {
                    self.start_heartbeat();
                }
            }
            LinkEvent::Unsubscribe(id) => {
                // Idempotent: a second unsubscribe finds nothing to remove.
                self.subscribers.retain(|(sid, _)| *sid != id);
            }
            LinkEvent::HeartbeatTick { epoch } => self.handle_heartbeat_tick(epoch),
            LinkEvent::BackoffElapsed { epoch } => self.handle_backoff_elapsed(epoch),
            LinkEvent::ProbeSettled { epoch, outcome } => {
                self.handle_probe_settled(epoch, outcome)
            }
        }
    }
}

/// Register a stats callback; replies with the subscription id after
/// synchronously replaying the current snapshot.
pub struct Subscribe {
    pub callback: StatsCallback,
}

impl<T> KameoMessage<Subscribe> for LinkMonitorActor<T>
where
    T: ProbeTransport,
{
    type Reply = SubscriberId;

    async fn handle(
        &mut self,
        msg: Subscribe,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let id = SubscriberId(self.next_subscriber);
        self.next_subscriber += 1;

        // Replay-on-subscribe: a late subscriber never sees a gap.
        let snapshot = self.health.snapshot(self.state);
        (msg.callback)(&snapshot);

        self.subscribers.push((id, msg.callback));
        id
    }
}

/// Fetch a fresh statistics snapshot.
pub struct GetStats;

impl<T> KameoMessage<GetStats> for LinkMonitorActor<T>
where
    T: ProbeTransport,
{
    type Reply = ConnectionStats;

    async fn handle(
        &mut self,
        _msg: GetStats,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.health.snapshot(self.state)
    }
}

/// Fetch only the lifecycle state.
pub struct GetState;

impl<T> KameoMessage<GetState> for LinkMonitorActor<T>
where
    T: ProbeTransport,
{
    type Reply = ConnectionState;

    async fn handle(
        &mut self,
        _msg: GetState,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.state
    }
}

impl<T> LinkMonitorActor<T>
where
    T: ProbeTransport,
{
    fn handle_connect(&mut self) {
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Error
                if !self.reconnect_pending && !self.probe_in_flight =>
            {
                self.transition(ConnectionState::Connecting);
                self.issue_probe();
            }
            state => {
                debug!(connection = %self.label, state = ?state, "connect ignored; already active");
            }
        }
    }

    fn handle_force_reconnect(&mut self) {
        info!(connection = %self.label, "forced reconnect");
        self.teardown();
        self.health.reset_attempts();
        self.transition(ConnectionState::Disconnected);
        self.transition(ConnectionState::Connecting);
        self.issue_probe();
    }

    fn handle_heartbeat_tick(&mut self, epoch: u64) {
        if epoch != self.epoch || self.state != ConnectionState::Connected {
            debug!(connection = %self.label, "discarding stale heartbeat tick");
            return;
        }
        if self.probe_in_flight {
            // The state machine allows at most one outstanding probe; a slow
            // probe simply absorbs this tick.
            debug!(connection = %self.label, "previous heartbeat still outstanding");
            return;
        }
        self.issue_probe();
    }

    fn handle_backoff_elapsed(&mut self, epoch: u64) {
        if epoch != self.epoch || !self.reconnect_pending {
            debug!(connection = %self.label, "discarding stale backoff timer");
            return;
        }
        self.reconnect_pending = false;
        self.transition(ConnectionState::Connecting);
        self.issue_probe();
    }

    fn handle_probe_settled(&mut self, epoch: u64, outcome: Result<Duration, LinkError>) {
        if epoch != self.epoch {
            debug!(connection = %self.label, "discarding probe result from torn-down session");
            return;
        }
        self.probe_in_flight = false;

        match (self.state, outcome) {
            (ConnectionState::Connecting, Ok(rtt)) => {
                self.health.record_probe_acked(rtt);
                self.health.mark_connected();
                info!(
                    connection = %self.label,
                    rtt_us = rtt.as_micros().min(u64::MAX as u128) as u64,
                    "link established"
                );
                self.transition(ConnectionState::Connected);
                self.start_heartbeat();
            }
            (ConnectionState::Connecting, Err(err)) => {
                warn!(connection = %self.label, error = %err, "connect probe failed");
                if self.schedule_reconnect() {
                    self.transition(ConnectionState::Error);
                }
            }
            (ConnectionState::Connected, Ok(rtt)) => {
                self.health.record_probe_acked(rtt);
                self.notify_subscribers();
            }
            (ConnectionState::Connected, Err(err)) => {
                // A single failed heartbeat is treated as connection loss;
                // there is no retry-within-heartbeat.
                warn!(connection = %self.label, error = %err, "heartbeat failed, link lost");
                self.stop_heartbeat();
                if self.schedule_reconnect() {
                    self.transition(ConnectionState::Reconnecting);
                }
            }
            (state, _) => {
                debug!(connection = %self.label, state = ?state, "probe result ignored in current state");
            }
        }
    }

    /// Issue exactly one probe for the current session.
    fn issue_probe(&mut self) {
        self.probe_in_flight = true;
        self.probe_seq = self.probe_seq.wrapping_add(1);
        self.health.record_probe_sent();

        let seq = self.probe_seq;
        let deadline = self.config.probe_timeout;
        let probe = self.probe.clone();
        let epoch = self.epoch;
        let actor_ref = self.actor_ref.clone();

        tokio::spawn(async move {
            let outcome = probe.sample(seq, deadline).await;
            let _ = actor_ref
                .tell(LinkEvent::ProbeSettled { epoch, outcome })
                .send()
                .await;
        });
    }

    /// Schedule the next reconnect attempt, or park in `Error` once retries
    /// are exhausted. Returns false when exhaustion ended the attempt chain.
    fn schedule_reconnect(&mut self) -> bool {
        if self.health.reconnect_attempts() >= self.config.max_retries {
            let err = LinkError::RetriesExhausted {
                attempts: self.health.reconnect_attempts(),
            };
            warn!(connection = %self.label, error = %err, "giving up on automatic reconnect");
            self.reconnect_pending = false;
            self.transition(ConnectionState::Error);
            return false;
        }

        let attempt = self.health.increment_reconnect();
        let delay =
            ExponentialBackoff::new(self.config.base_delay, self.config.max_delay).delay_for(attempt);
        self.reconnect_pending = true;

        info!(
            connection = %self.label,
            attempt,
            delay_ms = delay.as_millis().min(u64::MAX as u128) as u64,
            "reconnect scheduled"
        );

        let epoch = self.epoch;
        let actor_ref = self.actor_ref.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let _ = actor_ref
                .tell(LinkEvent::BackoffElapsed { epoch })
                .send()
                .await;
        });
        true
    }

    fn start_heartbeat(&mut self) {
        if let Some(handle) = self.heartbeat_task.take() {
            handle.abort();
        }

        let mut shutdown_rx = self.shutdown_rx.clone();
        let interval = self.config.heartbeat_interval;
        let epoch = self.epoch;
        let actor_ref = self.actor_ref.clone();

        self.heartbeat_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; the connect probe just
            // succeeded, so heartbeats start one interval from now.
            ticker.tick().await;
            loop {
                tokio::select! {
                    res = shutdown_rx.changed() => {
                        if res.is_err() || *shutdown_rx.borrow_and_update() { break; }
                    }
                    _ = ticker.tick() => {
                        if actor_ref.tell(LinkEvent::HeartbeatTick { epoch }).send().await.is_err() {
                            break;
                        }
                    }
                }
            }
        }));
    }

    fn stop_heartbeat(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.heartbeat_task.take() {
            handle.abort();
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown_tx = shutdown_tx;
        self.shutdown_rx = shutdown_rx;
    }

    /// Cancel every pending timer and invalidate in-flight probe results.
    fn teardown(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.reconnect_pending = false;
        self.probe_in_flight = false;
        self.stop_heartbeat();
        self.health.clear_session();
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        info!(
            connection = %self.label,
            from = ?self.state,
            to = ?next,
            "connection state changed"
        );
        self.state = next;
        self.notify_subscribers();
    }

    fn notify_subscribers(&self) {
        if self.subscribers.is_empty() {
            return;
        }
        let snapshot = self.health.snapshot(self.state);
        for (_, callback) in &self.subscribers {
            callback(&snapshot);
        }
    }
}
