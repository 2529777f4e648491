use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};
use tungstenite::client::IntoClientRequest;
use tungstenite::http::HeaderValue;
use tungstenite::protocol::Message as WsMessage;

use crate::config::BrokerSettings;
use crate::transport::Transport;
use crate::transport::message::{TransportEnvelope, TransportEvent};
use crate::transport::mqtt::{CodecError, Packet, PacketReader};
use crate::utils::error::{RelayError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a connect attempt may take before it counts as failed.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const MQTT_SUBPROTOCOL: &str = "mqtt";

#[derive(Debug)]
enum Outbound {
    Subscribe(String),
    Unsubscribe(String),
    Publish { topic: String, payload: Vec<u8> },
    Disconnect,
}

struct ConnectionHandle {
    commands: UnboundedSender<Outbound>,
    task: JoinHandle<()>,
}

/// MQTT over WebSocket transport.
///
/// Each `open` spawns a connection task that owns the socket. Commands reach
/// it over a channel and its events are sent, tagged with the connection's
/// client id, to the channel given to `new`.
pub struct WsTransport {
    url: String,
    keep_alive: u16,
    events: UnboundedSender<TransportEnvelope>,
    connection: Option<ConnectionHandle>,
}

impl WsTransport {
    pub fn new(settings: &BrokerSettings, events: UnboundedSender<TransportEnvelope>) -> Self {
        Self {
            url: settings.url(),
            keep_alive: settings.keep_alive_secs,
            events,
            connection: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn command(&mut self, outbound: Outbound) {
        match &self.connection {
            Some(connection) => {
                if connection.commands.send(outbound).is_err() {
                    debug!("connection task already finished, dropping command");
                }
            }
            None => debug!(?outbound, "no open connection, dropping command"),
        }
    }
}

impl Transport for WsTransport {
    fn open(&mut self, client_id: &str) {
        if let Some(previous) = self.connection.take() {
            previous.task.abort();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session {
            client_id: client_id.to_string(),
            events: self.events.clone(),
        };
        let task = tokio::spawn(session.run(self.url.clone(), self.keep_alive, rx));
        self.connection = Some(ConnectionHandle { commands: tx, task });
    }

    fn subscribe(&mut self, topic: &str) {
        self.command(Outbound::Subscribe(topic.to_string()));
    }

    fn unsubscribe(&mut self, topic: &str) {
        self.command(Outbound::Unsubscribe(topic.to_string()));
    }

    fn publish(&mut self, topic: &str, payload: Vec<u8>) {
        self.command(Outbound::Publish {
            topic: topic.to_string(),
            payload,
        });
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            // still handshaking: nothing to say goodbye to
            if connection.commands.send(Outbound::Disconnect).is_err() {
                connection.task.abort();
            }
        }
    }
}

/// One connection attempt and, if it succeeds, the connection's lifetime.
struct Session {
    client_id: String,
    events: UnboundedSender<TransportEnvelope>,
}

impl Session {
    fn emit(&self, event: TransportEvent) {
        let envelope = TransportEnvelope::new(self.client_id.clone(), event);
        if self.events.send(envelope).is_err() {
            debug!(client_id = %self.client_id, "relay is gone, event dropped");
        }
    }

    async fn run(self, url: String, keep_alive: u16, mut commands: UnboundedReceiver<Outbound>) {
        let (ws, reader) =
            match timeout(CONNECT_TIMEOUT, handshake(&url, &self.client_id, keep_alive)).await {
                Ok(Ok(connected)) => connected,
                Ok(Err(e)) => {
                    warn!(client_id = %self.client_id, error = %e, "connect attempt failed");
                    self.emit(TransportEvent::ConnectFailed(e.to_string()));
                    return;
                }
                Err(_) => {
                    warn!(client_id = %self.client_id, "connect attempt timed out");
                    self.emit(TransportEvent::ConnectFailed(format!(
                        "no answer from broker within {}s",
                        CONNECT_TIMEOUT.as_secs()
                    )));
                    return;
                }
            };

        info!(client_id = %self.client_id, "connected to {}", url);
        self.emit(TransportEvent::Connected);

        match self.pump(ws, reader, keep_alive, &mut commands).await {
            Some(reason) => {
                warn!(client_id = %self.client_id, %reason, "connection lost");
                self.emit(TransportEvent::Lost(reason));
            }
            None => debug!(client_id = %self.client_id, "connection closed"),
        }
    }

    /// Moves traffic until the connection ends. Returns the reason when the
    /// connection was lost, `None` after a requested disconnect.
    async fn pump(
        &self,
        ws: WsStream,
        mut reader: PacketReader,
        keep_alive: u16,
        commands: &mut UnboundedReceiver<Outbound>,
    ) -> Option<String> {
        let (mut sink, mut stream) = ws.split();
        let pinging = keep_alive > 0;
        let period = Duration::from_secs(u64::from(keep_alive.max(1)));
        let mut ping = interval_at(Instant::now() + period, period);
        let mut last_seen = Instant::now();
        let mut packet_ids = PacketIds::default();

        // bytes after the CONNACK may already hold packets
        if let Err(e) = self.drain(&mut reader) {
            return Some(format!("protocol error: {e}"));
        }

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(WsMessage::Binary(data))) => {
                        last_seen = Instant::now();
                        reader.push(&data);
                        if let Err(e) = self.drain(&mut reader) {
                            return Some(format!("protocol error: {e}"));
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        return Some("connection closed by broker".to_string());
                    }
                    Some(Ok(_)) => last_seen = Instant::now(),
                    Some(Err(e)) => return Some(e.to_string()),
                },

                command = commands.recv() => {
                    let packet = match command {
                        Some(Outbound::Subscribe(topic)) => Packet::Subscribe {
                            packet_id: packet_ids.next(),
                            topic,
                            qos: 0,
                        },
                        Some(Outbound::Unsubscribe(topic)) => Packet::Unsubscribe {
                            packet_id: packet_ids.next(),
                            topic,
                        },
                        Some(Outbound::Publish { topic, payload }) => Packet::publish(topic, payload),
                        Some(Outbound::Disconnect) | None => {
                            let _ = send_packet(&mut sink, &Packet::Disconnect).await;
                            let _ = sink.close().await;
                            return None;
                        }
                    };
                    if let Err(e) = send_packet(&mut sink, &packet).await {
                        return Some(e.to_string());
                    }
                }

                _ = ping.tick(), if pinging => {
                    if last_seen.elapsed() > period * 3 / 2 {
                        return Some("keep-alive timeout".to_string());
                    }
                    if let Err(e) = send_packet(&mut sink, &Packet::PingReq).await {
                        return Some(e.to_string());
                    }
                }
            }
        }
    }

    fn drain(&self, reader: &mut PacketReader) -> std::result::Result<(), CodecError> {
        while let Some(packet) = reader.next_packet()? {
            match packet {
                Packet::Publish { topic, payload, .. } => {
                    self.emit(TransportEvent::Message { topic, payload });
                }
                Packet::SubAck {
                    packet_id,
                    return_codes,
                } => {
                    if return_codes.contains(&0x80) {
                        warn!(packet_id, "broker rejected subscription");
                    } else {
                        debug!(packet_id, "subscription acknowledged");
                    }
                }
                Packet::PingResp => trace!("ping answered"),
                other => debug!(?other, "ignoring packet"),
            }
        }
        Ok(())
    }
}

async fn handshake(url: &str, client_id: &str, keep_alive: u16) -> Result<(WsStream, PacketReader)> {
    let mut request = url
        .into_client_request()
        .map_err(|e| RelayError::InvalidUrl(format!("{url}: {e}")))?;
    request.headers_mut().insert(
        "Sec-WebSocket-Protocol",
        HeaderValue::from_static(MQTT_SUBPROTOCOL),
    );

    let (mut ws, _response) = connect_async(request).await?;

    let connect = Packet::Connect {
        client_id: client_id.to_string(),
        keep_alive,
        clean_session: true,
    };
    send_packet(&mut ws, &connect).await?;

    let mut reader = PacketReader::default();
    while let Some(frame) = ws.next().await {
        match frame? {
            WsMessage::Binary(data) => {
                reader.push(&data);
                while let Some(packet) = reader.next_packet()? {
                    match packet {
                        Packet::ConnAck { return_code: 0, .. } => return Ok((ws, reader)),
                        Packet::ConnAck { return_code, .. } => {
                            return Err(RelayError::Refused(return_code));
                        }
                        other => debug!(?other, "ignoring packet before CONNACK"),
                    }
                }
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }
    Err(RelayError::ClosedDuringHandshake)
}

async fn send_packet<S>(sink: &mut S, packet: &Packet) -> Result<()>
where
    S: Sink<WsMessage, Error = tungstenite::Error> + Unpin,
{
    let bytes = packet.encode()?;
    sink.send(WsMessage::binary(bytes)).await?;
    Ok(())
}

/// Packet identifiers for SUBSCRIBE/UNSUBSCRIBE. Zero is never used.
#[derive(Debug, Default)]
struct PacketIds(u16);

impl PacketIds {
    fn next(&mut self) -> u16 {
        self.0 = self.0.wrapping_add(1);
        if self.0 == 0 {
            self.0 = 1;
        }
        self.0
    }
}
