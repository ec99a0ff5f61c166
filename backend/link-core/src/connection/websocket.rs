//! WebSocket stream transport.
//!
//! Each [`WebSocketConnector::connect`] call spawns one reader task. The access
//! token travels as the `token` query parameter of the stream URL, so the
//! full endpoint is never logged.

use crate::STREAM_TOKEN_PARAM;
use crate::connection::transport::{StreamConnector, TransportEventSink, TransportHandle};
use crate::error::transport::TransportError;
use crate::events::StreamPayload;

use common::{ErrorLocation, RedactedToken};

use std::panic::Location;

use futures_util::StreamExt;
use log::{debug, info, trace, warn};
use tokio::sync::oneshot;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Opens WebSocket streams against a fixed `ws://` / `wss://` URL.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    stream_url: Url,
}

impl WebSocketConnector {
    pub fn new(stream_url: &str) -> Result<Self, TransportError> {
        let stream_url = Url::parse(stream_url)?;

        if !matches!(stream_url.scheme(), "ws" | "wss") {
            return Err(TransportError::InvalidUrl {
                message: format!("unsupported stream scheme '{}'", stream_url.scheme()),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(Self { stream_url })
    }

    pub fn stream_url(&self) -> &Url {
        &self.stream_url
    }

    /// Stream URL with the access token attached. Contains the secret.
    pub fn endpoint_for(&self, access_token: &RedactedToken) -> Url {
        let mut endpoint = self.stream_url.clone();
        endpoint
            .query_pairs_mut()
            .append_pair(STREAM_TOKEN_PARAM, access_token.expose());
        endpoint
    }
}

impl StreamConnector for WebSocketConnector {
    fn connect(
        &self,
        access_token: &RedactedToken,
        events: TransportEventSink,
    ) -> Box<dyn TransportHandle> {
        let endpoint = self.endpoint_for(access_token);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        debug!(
            "Spawning WebSocket reader for transport {} ({})",
            events.generation(),
            self.stream_url
        );
        tokio::spawn(run_stream(endpoint, events, shutdown_rx));

        Box::new(WebSocketHandle {
            shutdown: Some(shutdown_tx),
        })
    }
}

/// Handle to one reader task. Dropping it closes the stream.
struct WebSocketHandle {
    shutdown: Option<oneshot::Sender<()>>,
}

impl TransportHandle for WebSocketHandle {
    fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

impl Drop for WebSocketHandle {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_stream(
    endpoint: Url,
    events: TransportEventSink,
    mut shutdown: oneshot::Receiver<()>,
) {
    let generation = events.generation();

    let connected = tokio::select! {
        biased;

        _ = &mut shutdown => {
            trace!("Transport {generation} closed while connecting");
            return;
        }
        result = connect_async(endpoint.as_str()) => result,
    };

    let mut ws_stream = match connected {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            let error = TransportError::Connect {
                message: e.to_string(),
                location: ErrorLocation::from(Location::caller()),
            };
            warn!("Transport {generation}: {error}");
            events.error(error.to_string());
            return;
        }
    };

    info!("Transport {generation} connected");
    if !events.connected() {
        let _ = ws_stream.close(None).await;
        return;
    }

    loop {
        let frame = tokio::select! {
            biased;

            _ = &mut shutdown => {
                debug!("Transport {generation} closing");
                let _ = ws_stream.close(None).await;
                return;
            }
            frame = ws_stream.next() => frame,
        };

        let delivered = match frame {
            Some(Ok(Message::Text(text))) => {
                events.message(StreamPayload::Text(text.as_str().to_owned()))
            }
            Some(Ok(Message::Binary(data))) => events.message(StreamPayload::Binary(data.to_vec())),
            Some(Ok(Message::Close(frame))) => {
                let reason = match frame {
                    Some(frame) => format!(
                        "closed by server ({}): {}",
                        u16::from(frame.code),
                        frame.reason.as_str()
                    ),
                    None => "closed by server".to_string(),
                };
                events.disconnected(reason);
                return;
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {
                true
            }
            Some(Err(e)) => {
                let error = TransportError::Read {
                    message: e.to_string(),
                    location: ErrorLocation::from(Location::caller()),
                };
                events.error(error.to_string());
                return;
            }
            None => {
                events.disconnected("stream ended");
                return;
            }
        };

        if !delivered {
            trace!("Transport {generation} has no manager, stopping");
            let _ = ws_stream.close(None).await;
            return;
        }
    }
}
