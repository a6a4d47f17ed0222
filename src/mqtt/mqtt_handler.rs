use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    Transport as WireTransport,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::config::{ConnectRequest, TransportKind};
use super::message_manager::{EventSink, InboundMessage, TransportEvent};
use super::transport::{Transport, TransportError, TransportLink};

/// Time the event loop gets to flush a DISCONNECT before it is cancelled.
const DISCONNECT_GRACE: Duration = Duration::from_millis(250);

/// [`Transport`] backed by `rumqttc`.
///
/// Each `open` builds a fresh client and event loop. The event loop runs in
/// its own task until the connection fails or the link is closed; `rumqttc`'s
/// own reconnect-on-poll is not used, the session decides when to retry.
#[derive(Debug, Clone)]
pub struct RumqttTransport {
    capacity: usize,
}

impl RumqttTransport {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    fn options(request: &ConnectRequest) -> MqttOptions {
        let endpoint = &request.endpoint;
        let mut options = MqttOptions::new(&request.client_id, endpoint.url(), endpoint.port);
        options
            .set_keep_alive(request.keep_alive)
            .set_clean_session(request.clean_session);

        if !request.username.is_empty() {
            options.set_credentials(&request.username, &request.password);
        }

        if endpoint.kind == TransportKind::WebSocket {
            options.set_transport(WireTransport::Ws);
        }
        options
    }
}

impl Default for RumqttTransport {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Transport for RumqttTransport {
    type Link = RumqttLink;

    fn open(
        &mut self,
        request: ConnectRequest,
        sink: EventSink,
    ) -> Result<Self::Link, TransportError> {
        info!(
            "Opening link {} to {} as {}",
            sink.link(),
            request.endpoint,
            request.client_id
        );
        let options = Self::options(&request);
        let (client, event_loop) = AsyncClient::new(options, self.capacity);
        let cancel = CancellationToken::new();

        tokio::spawn(drive_event_loop(event_loop, sink, cancel.clone()));

        Ok(RumqttLink { client, cancel })
    }
}

/// Live `rumqttc` connection.
pub struct RumqttLink {
    client: AsyncClient,
    cancel: CancellationToken,
}

impl TransportLink for RumqttLink {
    fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.client
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| TransportError::Request(format!("subscribe {}: {}", topic, e)))
    }

    fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.client
            .try_unsubscribe(topic)
            .map_err(|e| TransportError::Request(format!("unsubscribe {}: {}", topic, e)))
    }

    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| TransportError::Request(format!("publish {}: {}", topic, e)))
    }

    fn close(self) {
        match self.client.try_disconnect() {
            Ok(()) => {
                let cancel = self.cancel;
                tokio::spawn(async move {
                    tokio::time::sleep(DISCONNECT_GRACE).await;
                    cancel.cancel();
                });
            }
            Err(e) => {
                debug!("Disconnect request not queued: {}", e);
                self.cancel.cancel();
            }
        }
    }
}

async fn drive_event_loop(mut event_loop: EventLoop, sink: EventSink, cancel: CancellationToken) {
    let mut connected = false;

    loop {
        let polled = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Link {} cancelled", sink.link());
                break;
            }
            polled = event_loop.poll() => polled,
        };

        let event = match polled {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    connected = true;
                    TransportEvent::Connected
                } else {
                    warn!("Broker refused connection: {:?}", ack.code);
                    sink.send(TransportEvent::ConnectFailed(format!("{:?}", ack.code)))
                        .await;
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => TransportEvent::Message(
                InboundMessage::new(publish.topic, publish.payload.to_vec()),
            ),
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("Link {} sent DISCONNECT", sink.link());
                break;
            }
            Ok(other) => {
                trace!("Link {}: {:?}", sink.link(), other);
                continue;
            }
            Err(e) => {
                let reason = e.to_string();
                let event = if connected {
                    error!("Connection lost: {}", reason);
                    TransportEvent::ConnectionLost(reason)
                } else {
                    error!("Handshake failed: {}", reason);
                    TransportEvent::ConnectFailed(reason)
                };
                sink.send(event).await;
                break;
            }
        };

        if !sink.send(event).await {
            break;
        }
    }

    trace!("Event loop for link {} stopped", sink.link());
}
