//! The `transport` module carries chat traffic to and from the broker.
//!
//! `Transport` is the seam the relay drives: commands go in as plain method
//! calls and outcomes come back asynchronously as `TransportEvent`s. The
//! production implementation speaks MQTT over a WebSocket.

pub mod message;
pub mod mqtt;
pub mod websocket;

pub use message::{TransportEnvelope, TransportEvent};
pub use websocket::WsTransport;

/// Commands the relay issues to its broker connection.
///
/// Every call is fire-and-forget. Success or failure of `open` is reported
/// later as `TransportEvent::Connected` or `TransportEvent::ConnectFailed`.
pub trait Transport {
    /// Starts a new connection attempt under `client_id`, replacing any
    /// previous connection.
    fn open(&mut self, client_id: &str);

    fn subscribe(&mut self, topic: &str);

    fn unsubscribe(&mut self, topic: &str);

    fn publish(&mut self, topic: &str, payload: Vec<u8>);

    /// Ends the current connection without reporting it as lost.
    fn close(&mut self);
}
