use std::fmt;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::identity::{Identity, new_client_id};
use crate::relay::message::ChatMessage;
use crate::relay::retry::RetryPolicy;
use crate::relay::topic::{Topic, is_valid_room};
use crate::relay::view::{MessageDisplay, StatusReporter};
use crate::transport::{Transport, TransportEvent};

pub const STATUS_ESTABLISHED: &str = "Uplink established.";
pub const STATUS_DECODE_ERROR: &str = "Error decoding message.";
pub const STATUS_GAVE_UP: &str = "Retry limit reached. Staying offline.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Lost,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Lost => "lost",
        };
        f.write_str(name)
    }
}

/// Owns the single broker connection and mediates all chat traffic.
///
/// The client is a plain state machine: it issues commands to its
/// `Transport` and is fed `TransportEvent`s through `handle_event`. It never
/// sleeps itself; when a reconnect is due later, `handle_event` returns the
/// delay and whoever drives the client calls `reconnect_due` once it has
/// elapsed. That keeps every transition testable without a network or
/// real timers.
///
/// Invariants:
/// - at most one connection exists, the one opened under `client_id`;
/// - a message whose sender equals the local identity is never rendered;
/// - at most one reconnect is pending at any time.
pub struct RelayClient<T, V> {
    identity: Identity,
    topic: Topic,
    retry: RetryPolicy,
    transport: T,
    view: V,
    state: ConnectionState,
    client_id: Option<String>,
    /// Reconnect attempts since the last successful connection.
    attempt: u32,
    reconnect_pending: bool,
}

impl<T, V> RelayClient<T, V>
where
    T: Transport,
    V: MessageDisplay + StatusReporter,
{
    pub fn new(identity: Identity, topic: Topic, retry: RetryPolicy, transport: T, view: V) -> Self {
        Self {
            identity,
            topic,
            retry,
            transport,
            view,
            state: ConnectionState::Disconnected,
            client_id: None,
            attempt: 0,
            reconnect_pending: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Client id of the current connection attempt, if any.
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    /// Opens a new connection under a fresh client id.
    ///
    /// Ignored while a connection is already being made or is up.
    pub fn connect(&mut self) {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            debug!(state = %self.state, "connect ignored");
            return;
        }

        let client_id = new_client_id();
        info!(%client_id, topic = %self.topic, attempt = self.attempt, "connecting to broker");
        self.reconnect_pending = false;
        self.state = ConnectionState::Connecting;
        self.transport.open(&client_id);
        self.client_id = Some(client_id);
    }

    /// Publishes `message` on the topic if and only if connected.
    ///
    /// Anything sent in another state is dropped: there is no outbound queue.
    pub fn send(&mut self, message: &ChatMessage) {
        if self.state != ConnectionState::Connected {
            debug!(state = %self.state, "not connected, dropping outbound message");
            return;
        }
        match message.to_payload() {
            Ok(payload) => self.transport.publish(self.topic.name(), payload),
            Err(e) => warn!(error = %e, "failed to serialize chat message"),
        }
    }

    /// Renders `text` locally as our own message and sends it.
    pub fn say(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let message = ChatMessage::new(self.identity.as_str(), text);
        self.view.render(&message.text, &message.sender);
        self.send(&message);
    }

    /// The inbound handler for one broker payload.
    ///
    /// Publishes on other topics are ignored, undecodable payloads are
    /// reported and dropped, and echoes of our own messages are suppressed.
    pub fn on_message(&mut self, topic: &str, payload: &[u8]) {
        if topic != self.topic.name() {
            debug!(%topic, "ignoring message for another topic");
            return;
        }

        let message = match ChatMessage::from_payload(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "dropping malformed chat payload");
                self.view.status(STATUS_DECODE_ERROR);
                return;
            }
        };

        if message.is_echo_of(&self.identity) {
            trace!("suppressed echo of own message");
            return;
        }
        self.view.render(&message.text, &message.sender);
    }

    /// Applies one transport event. Returns the delay after which
    /// `reconnect_due` should be called when a reconnect was scheduled.
    pub fn handle_event(&mut self, event: TransportEvent) -> Option<Duration> {
        match event {
            TransportEvent::Connected => {
                self.on_connected();
                None
            }
            TransportEvent::ConnectFailed(reason) => self.on_connect_failed(&reason),
            TransportEvent::Lost(reason) => self.on_lost(&reason),
            TransportEvent::Message { topic, payload } => {
                self.on_message(&topic, &payload);
                None
            }
        }
    }

    /// Called by the driver when a scheduled reconnect delay has elapsed.
    pub fn reconnect_due(&mut self) {
        if !self.reconnect_pending || self.state != ConnectionState::Lost {
            debug!(state = %self.state, "no reconnect pending");
            return;
        }
        self.connect();
    }

    /// Leaves the current room for `room` under the same topic prefix.
    pub fn switch_room(&mut self, room: &str) {
        let room = room.trim();
        if room.is_empty() {
            return;
        }
        if !is_valid_room(room) {
            warn!(%room, "rejecting room name");
            self.view.status(&format!(
                "Invalid room name: [{room}]. Rooms cannot contain '+', '#' or '/'."
            ));
            return;
        }

        let next = self.topic.with_room(room);
        if next != self.topic {
            if self.state == ConnectionState::Connected {
                self.transport.unsubscribe(self.topic.name());
                self.transport.subscribe(next.name());
            }
            info!(from = %self.topic, to = %next, "switching room");
            self.topic = next;
        }
        self.view
            .status(&format!("Joined Room: [{}]", room.to_uppercase()));
    }

    /// Closes the connection and cancels any pending reconnect.
    pub fn shutdown(&mut self) {
        self.reconnect_pending = false;
        if self.client_id.take().is_some() {
            self.transport.close();
        }
        self.state = ConnectionState::Disconnected;
        info!("relay shut down");
    }

    fn on_connected(&mut self) {
        if self.state != ConnectionState::Connecting {
            warn!(state = %self.state, "unexpected connect notification");
            return;
        }
        self.state = ConnectionState::Connected;
        self.attempt = 0;
        // clean session: this connection holds no subscription yet
        self.transport.subscribe(self.topic.name());
        info!(topic = %self.topic, "subscribed");
        self.view.status(STATUS_ESTABLISHED);
    }

    fn on_connect_failed(&mut self, reason: &str) -> Option<Duration> {
        if self.state != ConnectionState::Connecting {
            debug!(state = %self.state, "ignoring stale connect failure");
            return None;
        }

        let lead = failure_line(reason);
        // a failed reconnect keeps looping; a failed first connect only
        // does so when the policy asks for it
        if self.attempt > 0 || self.retry.retry_initial_failure {
            self.state = ConnectionState::Lost;
            return self.schedule_reconnect(&lead);
        }

        self.state = ConnectionState::Disconnected;
        self.view.status(&lead);
        None
    }

    fn on_lost(&mut self, reason: &str) -> Option<Duration> {
        if self.state != ConnectionState::Connected {
            debug!(state = %self.state, %reason, "ignoring loss of inactive connection");
            return None;
        }
        self.state = ConnectionState::Lost;
        self.schedule_reconnect("Connection lost.")
    }

    fn schedule_reconnect(&mut self, lead: &str) -> Option<Duration> {
        if self.reconnect_pending {
            return None;
        }

        let attempt = self.attempt + 1;
        match self.retry.delay_for(attempt) {
            Some(delay) => {
                self.attempt = attempt;
                self.reconnect_pending = true;
                info!(attempt, ?delay, "reconnect scheduled");
                self.view.status(&format!(
                    "{lead} Retrying in {}...",
                    format_delay(delay)
                ));
                Some(delay)
            }
            None => {
                warn!(attempts = self.attempt, "giving up on the broker");
                self.state = ConnectionState::Disconnected;
                self.client_id = None;
                self.view.status(&format!("{lead} {STATUS_GAVE_UP}"));
                None
            }
        }
    }
}

/// `Uplink failed: <reason>.` with exactly one closing period.
pub(crate) fn failure_line(reason: &str) -> String {
    let reason = reason.trim().trim_end_matches(['.', '!', '?']);
    format!("Uplink failed: {reason}.")
}

/// `5s`, `2.5s`, `0.1s`.
pub(crate) fn format_delay(delay: Duration) -> String {
    if delay.subsec_millis() == 0 {
        format!("{}s", delay.as_secs())
    } else {
        let secs = format!("{:.1}", delay.as_secs_f64());
        format!("{}s", secs.trim_end_matches(".0"))
    }
}
