//! Caller-facing handle over the monitor actor.

use kameo::prelude::{Actor, ActorRef};

use crate::core::{
    ConnectionState, ConnectionStats, LinkConfig, LinkConfigPatch, LinkError, LinkResult,
    SubscriberId,
};
use crate::monitor::actor::{
    GetState, GetStats, LinkEvent, LinkMonitorActor, LinkMonitorArgs, Subscribe,
};
use crate::probe::ProbeTransport;

/// Cheaply cloneable handle to a running link monitor.
#[derive(Clone)]
pub struct LinkMonitor<T>
where
    T: ProbeTransport,
{
    actor: ActorRef<LinkMonitorActor<T>>,
}

impl<T> LinkMonitor<T>
where
    T: ProbeTransport,
{
    /// Spawn a monitor in the `Disconnected` state. Nothing happens until
    /// [`connect`](Self::connect) is called.
    pub fn spawn(label: impl Into<String>, config: LinkConfig, transport: T) -> Self {
        let actor = LinkMonitorActor::spawn(LinkMonitorArgs {
            label: label.into(),
            config,
            transport,
        });
        Self { actor }
    }

    /// Begin establishing the link. Ignored while a session is already
    /// active or a reconnect is pending.
    pub async fn connect(&self) -> LinkResult<()> {
        self.tell(LinkEvent::Connect).await
    }

    /// Tear the link down and cancel all pending timers.
    pub async fn disconnect(&self) -> LinkResult<()> {
        self.tell(LinkEvent::Disconnect).await
    }

    /// Discard the current session and retry immediately with a reset
    /// attempt counter.
    pub async fn force_reconnect(&self) -> LinkResult<()> {
        self.tell(LinkEvent::ForceReconnect).await
    }

    /// Apply a partial configuration update. A pending backoff timer keeps
    /// its original delay; a changed heartbeat interval takes effect
    /// immediately while connected.
    pub async fn configure(&self, patch: LinkConfigPatch) -> LinkResult<()> {
        self.tell(LinkEvent::Configure(patch)).await
    }

    /// Register a stats callback. The current snapshot is replayed into the
    /// callback before this returns.
    pub async fn subscribe<F>(&self, callback: F) -> LinkResult<SubscriberId>
    where
        F: Fn(&ConnectionStats) + Send + Sync + 'static,
    {
        self.actor
            .ask(Subscribe {
                callback: Box::new(callback),
            })
            .await
            .map_err(|err| LinkError::Actor(err.to_string()))
    }

    /// Remove a previously registered callback. Unknown ids are ignored.
    pub async fn unsubscribe(&self, id: SubscriberId) -> LinkResult<()> {
        self.tell(LinkEvent::Unsubscribe(id)).await
    }

    pub async fn stats(&self) -> LinkResult<ConnectionStats> {
        self.actor
            .ask(GetStats)
            .await
            .map_err(|err| LinkError::Actor(err.to_string()))
    }

    pub async fn state(&self) -> LinkResult<ConnectionState> {
        self.actor
            .ask(GetState)
            .await
            .map_err(|err| LinkError::Actor(err.to_string()))
    }

    /// Disconnect, drop all subscriptions, and stop the actor.
    pub async fn shutdown(self) -> LinkResult<()> {
        self.tell(LinkEvent::Disconnect).await?;
        self.actor
            .stop_gracefully()
            .await
            .map_err(|err| LinkError::Actor(err.to_string()))?;
        self.actor.wait_for_shutdown().await;
        Ok(())
    }

    async fn tell(&self, event: LinkEvent) -> LinkResult<()> {
        self.actor
            .tell(event)
            .send()
            .await
            .map_err(|err| LinkError::Actor(err.to_string()))
    }
}
