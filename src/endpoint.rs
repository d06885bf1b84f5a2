//! Responder side of the reachability protocol.
//!
//! Deployments that host their own ping endpoint embed [`PingResponder`] in
//! whatever serves their sockets; [`serve`] runs it over plain accepted
//! websocket connections and doubles as the loopback endpoint for
//! integration tests. Per-request service times feed a bounded window
//! exposing nearest-rank percentiles for external monitoring.

use std::sync::Arc;
use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{Message as TungsteniteMessage, Utf8Bytes};
use tracing::{debug, warn};

use crate::core::{
    LinkError, PercentileSummary, ProbeRequest, ProbeResponse, ResponseTimeWindow, now_epoch_us,
};

/// Stateless request handling plus a rolling response-time window.
#[derive(Debug, Default)]
pub struct PingResponder {
    window: ResponseTimeWindow,
}

impl PingResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one probe request and produce the echoed response payload.
    pub fn handle(&mut self, payload: &[u8]) -> Result<String, LinkError> {
        let started = Instant::now();

        let request: ProbeRequest =
            sonic_rs::from_slice(payload).map_err(|err| LinkError::ProbeRejected {
                reason: format!("malformed probe request: {err}"),
            })?;
        let response = ProbeResponse {
            seq: request.seq,
            client_ts_us: request.client_ts_us,
            server_ts_us: now_epoch_us(),
        };
        let encoded = sonic_rs::to_string(&response).map_err(|err| LinkError::Transport {
            context: "encode",
            error: err.to_string(),
        })?;

        self.window.record(started.elapsed());
        Ok(encoded)
    }

    /// Rolling p50/p95/p99 over recent request service times.
    pub fn response_times(&self) -> PercentileSummary {
        self.window.summary()
    }
}

/// Accept websocket connections forever and answer probe requests on each.
pub async fn serve(listener: TcpListener, responder: Arc<Mutex<PingResponder>>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(error = %err, "ping endpoint accept failed");
                continue;
            }
        };

        let responder = Arc::clone(&responder);
        tokio::spawn(async move {
            let ws = match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => ws,
                Err(err) => {
                    debug!(peer = %peer, error = %err, "websocket handshake failed");
                    return;
                }
            };
            let (mut write, mut read) = ws.split();

            while let Some(frame) = read.next().await {
                let payload = match frame {
                    Ok(TungsteniteMessage::Text(text)) => text.as_bytes().to_vec(),
                    Ok(TungsteniteMessage::Binary(bytes)) => bytes.to_vec(),
                    Ok(TungsteniteMessage::Ping(body)) => {
                        if write.send(TungsteniteMessage::Pong(body)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    Ok(TungsteniteMessage::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };

                let reply = { responder.lock().await.handle(&payload) };
                match reply {
                    Ok(encoded) => {
                        if write
                            .send(TungsteniteMessage::Text(Utf8Bytes::from(encoded)))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(err) => {
                        // Malformed requests are dropped; the prober's
                        // deadline converts silence into a failed probe.
                        debug!(peer = %peer, error = %err, "ignoring malformed probe request");
                    }
                }
            }
        });
    }
}
