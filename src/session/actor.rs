use super::{Command, ConnectionState, ReconnectTimer, SessionError};
use crate::cache::{device_topic, KnownTopics, MessageCache};
use crate::config::{SnifferConfig, TopicMode};
use crate::credentials::{ClientId, Decrypt};
use crate::diagnostic::{DiagnosticClient, DiagnosticError, DiagnosticReply, Route};
use crate::events::{Notifier, SnifferEvent};
use crate::icd::{self, Envelope};
use crate::mqtt::{
    BrokerEndpoint, ConnectRequest, EventSink, InboundMessage, LinkEvent, Transport,
    TransportEvent, TransportLink,
};
use std::collections::HashSet;
use std::ops::ControlFlow;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

const WILDCARD_TOPIC: &str = "#";

/// Link events handled in a row before a pending command gets a turn.
const LINK_BURST: usize = 32;

/// How inbound traffic is routed and what gets subscribed.
#[derive(Debug)]
enum Mode {
    Broadcast {
        broadcast_topic: String,
        device_topic_prefix: String,
    },
    Diagnostic(DiagnosticClient),
}

impl Mode {
    fn new(topics: &TopicMode) -> Self {
        match topics {
            TopicMode::Broadcast {
                broadcast_topic,
                device_topic_prefix,
                ..
            } => Mode::Broadcast {
                broadcast_topic: broadcast_topic.clone(),
                device_topic_prefix: device_topic_prefix.clone(),
            },
            TopicMode::Diagnostic {
                request_topic,
                response_topic,
            } => Mode::Diagnostic(DiagnosticClient::new(
                request_topic.clone(),
                response_topic.clone(),
            )),
        }
    }
}

pub(super) struct SessionActor<T: Transport> {
    transport: T,
    decryptor: Box<dyn Decrypt>,
    client_id: ClientId,
    config: SnifferConfig,
    mode: Mode,

    endpoint: Option<BrokerEndpoint>,
    link: Option<T::Link>,
    link_id: u64,
    /// Topics subscribed on the current link
    subscribed: HashSet<String>,

    cache: MessageCache,
    topics: KnownTopics,

    reconnect: Option<ReconnectTimer>,
    notifier: Notifier,
    state: watch::Sender<ConnectionState>,

    link_tx: mpsc::Sender<LinkEvent>,
    link_rx: mpsc::Receiver<LinkEvent>,
    retry_tx: mpsc::Sender<()>,
    retry_rx: mpsc::Receiver<()>,
}

impl<T: Transport> SessionActor<T> {
    pub(super) fn new(
        transport: T,
        decryptor: Box<dyn Decrypt>,
        client_id: ClientId,
        config: SnifferConfig,
        notifier: Notifier,
        state: watch::Sender<ConnectionState>,
    ) -> Self {
        let (link_tx, link_rx) = mpsc::channel(256);
        let (retry_tx, retry_rx) = mpsc::channel(1);

        Self {
            transport,
            decryptor,
            client_id,
            mode: Mode::new(&config.topics),
            cache: MessageCache::new(config.max_messages(), notifier.clone()),
            topics: KnownTopics::new(config.topics.initial_topics()),
            config,
            endpoint: None,
            link: None,
            link_id: 0,
            subscribed: HashSet::new(),
            reconnect: None,
            notifier,
            state,
            link_tx,
            link_rx,
            retry_tx,
            retry_rx,
        }
    }

    pub(super) async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut burst = 0;
        loop {
            let flow = tokio::select! {
                biased;

                Some(event) = self.link_rx.recv() => {
                    self.on_link_event(event);
                    burst += 1;
                    if burst < LINK_BURST {
                        continue;
                    }
                    burst = 0;
                    // let a waiting consumer in before the next batch of traffic
                    match commands.try_recv() {
                        Ok(command) => self.handle_command(command),
                        Err(_) => ControlFlow::Continue(()),
                    }
                }

                Some(()) = self.retry_rx.recv() => {
                    self.retry();
                    ControlFlow::Continue(())
                }

                command = commands.recv() => {
                    burst = 0;
                    match command {
                        Some(command) => self.handle_command(command),
                        None => {
                            debug!("All session handles dropped");
                            self.disconnect();
                            ControlFlow::Break(())
                        }
                    }
                }
            };

            if flow.is_break() {
                break;
            }
        }
        info!("Session stopped");
    }

    fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Connect {
                address,
                config,
                reply,
            } => {
                self.connect(address, *config);
                let _ = reply.send(());
            }
            Command::Disconnect { reply } => {
                self.disconnect();
                let _ = reply.send(());
            }
            Command::Messages { topic, reply } => {
                let _ = reply.send(self.cache.get(&topic));
            }
            Command::ClearMessages { topic, reply } => {
                self.cache.clear(&topic);
                let _ = reply.send(());
            }
            Command::Topics { reply } => {
                let _ = reply.send(self.topics.to_vec());
            }
            Command::RemoveTopic { topic, reply } => {
                let _ = reply.send(self.remove_topic(&topic));
            }
            Command::RequestKnownTopics { reply } => {
                let _ = reply.send(self.request_known_topics());
            }
            Command::RequestHistory { topic, reply } => {
                let _ = reply.send(self.request_history(&topic));
            }
            Command::Shutdown { reply } => {
                self.disconnect();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!("Connection state {} -> {}", previous, next);
        }
    }

    fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    // ---- connection lifecycle ----

    fn connect(&mut self, address: BrokerEndpoint, config: SnifferConfig) {
        let state = self.current_state();
        if state != ConnectionState::Disconnected && self.endpoint.as_ref() == Some(&address) {
            debug!("Already {} to {}, ignoring connect", state, address);
            return;
        }

        if state != ConnectionState::Disconnected {
            info!("Switching broker to {}", address);
            self.disconnect();
        }

        self.apply_config(config);
        self.endpoint = Some(address);
        self.open_link();
    }

    fn apply_config(&mut self, config: SnifferConfig) {
        if config.topics != self.config.topics {
            debug!("Topic mode changed, resetting known topics");
            self.mode = Mode::new(&config.topics);
            self.topics = KnownTopics::new(config.topics.initial_topics());
        } else {
            for topic in config.topics.initial_topics() {
                self.topics.insert(topic);
            }
        }

        if config.max_messages() != self.cache.max_messages() {
            self.cache.set_max_messages(config.max_messages());
        }
        self.config = config;
    }

    /// Starts a handshake with a freshly decrypted password.
    fn open_link(&mut self) {
        let Some(endpoint) = self.endpoint.clone() else {
            warn!("No broker address to connect to");
            return;
        };

        let password = if self.config.rabbit_password.is_empty() {
            String::new()
        } else {
            match self.decryptor.decrypt(&self.config.rabbit_password) {
                Ok(password) => password,
                Err(e) => {
                    error!("Could not decrypt broker password: {}", e);
                    self.reconnect = None;
                    self.set_state(ConnectionState::Disconnected);
                    self.notifier.emit(SnifferEvent::Error(e.to_string()));
                    return;
                }
            }
        };

        self.link_id += 1;
        let request = ConnectRequest {
            client_id: self.client_id.to_string(),
            endpoint,
            username: self.config.rabbit_user_name.clone(),
            password,
            keep_alive: self.config.keep_alive(),
            clean_session: true,
        };
        let sink = EventSink::new(self.link_id, self.link_tx.clone());

        self.set_state(ConnectionState::Connecting);
        match self.transport.open(request, sink) {
            Ok(link) => self.link = Some(link),
            Err(e) => self.on_connect_failed(e.to_string()),
        }
    }

    /// Unsubscribes everything still subscribed and closes the link.
    fn close_link(&mut self) {
        let Some(link) = self.link.take() else {
            self.subscribed.clear();
            return;
        };
        for topic in self.subscribed.drain() {
            if let Err(e) = link.unsubscribe(&topic) {
                debug!("Unsubscribe failed during teardown: {}", e);
            }
        }
        link.close();
    }

    fn disconnect(&mut self) {
        self.reconnect = None;
        self.close_link();
        self.endpoint = None;
        if let Mode::Diagnostic(client) = &mut self.mode {
            client.reset();
        }
        self.set_state(ConnectionState::Disconnected);
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect.is_some() {
            trace!("Reconnect already scheduled");
            return;
        }
        let period = self.config.reconnect_interval();
        info!("Retrying connection every {:?}", period);
        self.reconnect = Some(ReconnectTimer::start(period, self.retry_tx.clone()));
    }

    fn retry(&mut self) {
        if self.reconnect.is_none() {
            trace!("Dropping retry tick of a cancelled timer");
            return;
        }
        if self.current_state() == ConnectionState::Connected {
            self.reconnect = None;
            return;
        }

        debug!("Reconnect attempt");
        self.close_link();
        self.open_link();
    }

    // ---- transport events ----

    fn on_link_event(&mut self, LinkEvent { link, event }: LinkEvent) {
        if link != self.link_id || self.link.is_none() {
            trace!("Ignoring event from stale link {}: {:?}", link, event);
            return;
        }

        match event {
            TransportEvent::Connected => self.on_connected(),
            TransportEvent::ConnectFailed(reason) => self.on_connect_failed(reason),
            TransportEvent::ConnectionLost(reason) => self.on_connection_lost(reason),
            TransportEvent::Message(message) => self.dispatch(message),
        }
    }

    fn on_connected(&mut self) {
        self.reconnect = None;
        self.set_state(ConnectionState::Connected);

        let topics: Vec<String> = match &self.mode {
            Mode::Broadcast { .. } => self.topics.to_vec(),
            Mode::Diagnostic(_) => vec![WILDCARD_TOPIC.to_string()],
        };
        for topic in topics {
            self.subscribe(&topic);
        }

        if matches!(self.mode, Mode::Diagnostic(_)) {
            if let Err(e) = self.request_known_topics() {
                warn!("Initial topic discovery failed: {}", e);
            }
        }

        if let Some(endpoint) = &self.endpoint {
            info!("Connected to {}", endpoint);
        }
        self.notifier.emit(SnifferEvent::Connected);
    }

    fn on_connect_failed(&mut self, reason: String) {
        error!("Handshake failed: {}", reason);
        self.close_link();
        self.set_state(ConnectionState::Reconnecting);
        self.notifier.emit(SnifferEvent::Disconnected(reason));
        self.schedule_reconnect();
    }

    fn on_connection_lost(&mut self, reason: String) {
        error!("Connection lost: {}", reason);
        // the broker already dropped our subscriptions
        self.subscribed.clear();
        self.close_link();
        self.set_state(ConnectionState::Reconnecting);
        self.notifier.emit(SnifferEvent::Disconnected(reason));
        self.schedule_reconnect();
    }

    fn subscribe(&mut self, topic: &str) {
        let Some(link) = &self.link else {
            return;
        };
        if self.subscribed.contains(topic) {
            return;
        }
        match link.subscribe(topic) {
            Ok(()) => {
                debug!("Subscribed to {}", topic);
                self.subscribed.insert(topic.to_string());
            }
            Err(e) => warn!("Could not subscribe to {}: {}", topic, e),
        }
    }

    // ---- ingestion ----

    fn dispatch(&mut self, message: InboundMessage) {
        let route = match &self.mode {
            Mode::Diagnostic(client) => client.route(&message.topic),
            Mode::Broadcast { .. } => Route::Traffic,
        };

        match route {
            Route::OwnRequest => trace!("Ignoring own request on {}", message.topic),
            Route::Response => self.on_diagnostic_response(&message.payload),
            Route::Traffic => self.ingest_live(message),
        }
    }

    fn ingest_live(&mut self, message: InboundMessage) {
        let envelope = match icd::decode(&message.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping message on {}: {}", message.topic, e);
                return;
            }
        };

        self.track_topics(&message.topic, &envelope);
        self.store(&message.topic, envelope);
    }

    fn track_topics(&mut self, topic: &str, envelope: &Envelope) {
        let discovered = match &self.mode {
            Mode::Diagnostic(_) => Some(topic.to_string()),
            Mode::Broadcast {
                broadcast_topic,
                device_topic_prefix,
            } => {
                if topic != broadcast_topic.as_str() && !envelope.is_broadcast() {
                    Some(device_topic(device_topic_prefix, envelope.device_id))
                } else {
                    None
                }
            }
        };

        let Some(discovered) = discovered else {
            return;
        };
        if self.add_topic(&discovered) && matches!(self.mode, Mode::Broadcast { .. }) {
            self.subscribe(&discovered);
        }
    }

    fn add_topic(&mut self, topic: &str) -> bool {
        if !self.topics.insert(topic) {
            return false;
        }
        info!("New topic {}", topic);
        self.notifier.emit(SnifferEvent::NewTopic(topic.to_string()));
        true
    }

    fn store(&mut self, topic: &str, envelope: Envelope) {
        let appended = self.cache.append(topic, envelope);
        debug!(
            "Cached message {} on {} ({})",
            appended.stored.id, topic, appended.stored.envelope.msg_type
        );
    }

    fn on_diagnostic_response(&mut self, payload: &[u8]) {
        let Mode::Diagnostic(client) = &mut self.mode else {
            return;
        };

        match client.handle_response(payload) {
            Ok(DiagnosticReply::Topics(topics)) => {
                for topic in topics {
                    self.add_topic(&topic);
                }
            }
            Ok(DiagnosticReply::History {
                topic,
                envelopes,
                solicited,
            }) => {
                if !solicited {
                    info!("Unsolicited history for {}", topic);
                }
                self.add_topic(&topic);
                debug!("Backfilling {} messages on {}", envelopes.len(), topic);
                for raw in envelopes {
                    match icd::decode(raw.as_bytes()) {
                        Ok(envelope) => self.store(&topic, envelope),
                        Err(e) => warn!("Dropping history entry on {}: {}", topic, e),
                    }
                }
            }
            Err(DiagnosticError::UnknownType(kind)) => {
                warn!("Dropping diagnostic response of unknown type {:?}", kind)
            }
            Err(e) => warn!("Dropping diagnostic response: {}", e),
        }
    }

    // ---- consumer operations ----

    fn remove_topic(&mut self, topic: &str) -> bool {
        let known = self.topics.remove(topic);
        let dropped = self.cache.remove(topic);

        if self.subscribed.remove(topic) {
            if let Some(link) = &self.link {
                if let Err(e) = link.unsubscribe(topic) {
                    warn!("Could not unsubscribe from {}: {}", topic, e);
                }
            }
        }

        if known {
            info!("Removed topic {} with {} messages", topic, dropped);
            self.notifier
                .emit(SnifferEvent::TopicRemoved(topic.to_string()));
        }
        known
    }

    fn live_diagnostics(&mut self) -> Result<(&mut DiagnosticClient, &T::Link), SessionError> {
        let Mode::Diagnostic(client) = &mut self.mode else {
            return Err(SessionError::DiagnosticsDisabled);
        };
        if *self.state.borrow() != ConnectionState::Connected {
            return Err(SessionError::NotConnected);
        }
        let link = self.link.as_ref().ok_or(SessionError::NotConnected)?;
        Ok((client, link))
    }

    fn request_known_topics(&mut self) -> Result<(), SessionError> {
        let (client, link) = self.live_diagnostics()?;
        let outbound = client.known_topics_request()?;
        link.publish(&outbound.topic, outbound.payload)?;
        debug!("Requested known topics");
        Ok(())
    }

    fn request_history(&mut self, topic: &str) -> Result<(), SessionError> {
        let (client, link) = self.live_diagnostics()?;
        let outbound = client.history_request(topic)?;
        link.publish(&outbound.topic, outbound.payload)?;
        debug!("Requested history of {}", topic);
        Ok(())
    }
}
