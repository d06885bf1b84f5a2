use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{
    connect_async as tungstenite_connect,
    tungstenite::{Message as TungsteniteMessage, Utf8Bytes},
};

use crate::core::{LinkError, ProbeRequest, ProbeResponse};
use crate::probe::{ProbeFuture, ProbeTransport};
use crate::tls::install_rustls_crypto_provider;

fn map_transport_error(context: &'static str, err: impl ToString) -> LinkError {
    LinkError::Transport {
        context,
        error: err.to_string(),
    }
}

fn decode_response(data: &[u8]) -> Result<ProbeResponse, LinkError> {
    sonic_rs::from_slice(data).map_err(|err| LinkError::ProbeRejected {
        reason: format!("malformed probe response: {err}"),
    })
}

/// Probe transport performing one websocket round trip per probe.
///
/// Each probe opens a fresh connection to the reachability endpoint, sends
/// the JSON request as a text frame, and awaits the echoed response. At
/// heartbeat cadence the handshake cost is irrelevant and a fresh socket
/// means a dead endpoint fails the probe instead of a stale connection
/// masking it.
#[derive(Clone, Debug)]
pub struct TungsteniteProbe {
    url: String,
}

impl TungsteniteProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ProbeTransport for TungsteniteProbe {
    fn round_trip(&self, request: ProbeRequest) -> ProbeFuture {
        let url = self.url.clone();
        Box::pin(async move {
            install_rustls_crypto_provider();

            let (mut stream, _) = tungstenite_connect(url.as_str())
                .await
                .map_err(|err| map_transport_error("connect", err))?;

            let payload = sonic_rs::to_string(&request)
                .map_err(|err| map_transport_error("encode", err))?;
            stream
                .send(TungsteniteMessage::Text(Utf8Bytes::from(payload)))
                .await
                .map_err(|err| map_transport_error("write", err))?;

            loop {
                let Some(frame) = stream.next().await else {
                    return Err(LinkError::ProbeRejected {
                        reason: "endpoint closed before responding".to_string(),
                    });
                };
                match frame.map_err(|err| map_transport_error("read", err))? {
                    TungsteniteMessage::Text(text) => return decode_response(text.as_bytes()),
                    TungsteniteMessage::Binary(bytes) => return decode_response(&bytes),
                    TungsteniteMessage::Ping(payload) => {
                        let _ = stream.send(TungsteniteMessage::Pong(payload)).await;
                    }
                    TungsteniteMessage::Close(_) => {
                        return Err(LinkError::ProbeRejected {
                            reason: "endpoint closed before responding".to_string(),
                        });
                    }
                    _ => {}
                }
            }
        })
    }
}
