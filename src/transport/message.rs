/// What a broker connection reports back to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The broker accepted the connection.
    Connected,

    /// The attempt never reached the broker or was refused.
    ConnectFailed(String),

    /// An established connection went away.
    Lost(String),

    /// A publish arrived on a subscribed topic.
    Message { topic: String, payload: Vec<u8> },
}

/// A `TransportEvent` tagged with the client id of the connection that
/// produced it, so events from a superseded connection can be told apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEnvelope {
    pub client_id: String,
    pub event: TransportEvent,
}

impl TransportEnvelope {
    pub fn new(client_id: impl Into<String>, event: TransportEvent) -> Self {
        Self {
            client_id: client_id.into(),
            event,
        }
    }
}
