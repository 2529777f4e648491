//! Test support: a tiny MQTT-over-WebSocket broker and a recording view.
//!
//! The broker keeps a topic -> subscribers map and fans every publish out to
//! all subscribers of its topic, the sender included, the way a real broker
//! does. It only understands the QoS 0 subset the client speaks.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::accept_hdr_async;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::HeaderValue;
use tungstenite::protocol::Message as WsMessage;

use termchat::config::BrokerSettings;
use termchat::relay::{MessageDisplay, StatusReporter};
use termchat::transport::mqtt::{Packet, PacketReader};

#[derive(Default)]
struct BrokerState {
    topics: HashMap<String, HashSet<String>>,
    clients: HashMap<String, mpsc::UnboundedSender<Vec<u8>>>,
    connects: usize,
}

impl BrokerState {
    fn cleanup_client(&mut self, client_id: &str) {
        self.clients.remove(client_id);
        for subscribers in self.topics.values_mut() {
            subscribers.remove(client_id);
        }
    }

    fn publish(&self, topic: &str, payload: &[u8]) {
        let Some(subscribers) = self.topics.get(topic) else {
            return;
        };
        let bytes = Packet::publish(topic, payload.to_vec()).encode().unwrap();
        for id in subscribers {
            if let Some(sender) = self.clients.get(id) {
                let _ = sender.send(bytes.clone());
            }
        }
    }
}

pub struct FakeBroker {
    pub addr: SocketAddr,
    state: Arc<Mutex<BrokerState>>,
    kick: broadcast::Sender<()>,
}

impl FakeBroker {
    pub async fn start() -> Self {
        Self::start_with(None).await
    }

    /// A broker that answers every CONNECT with `return_code`.
    pub async fn start_refusing(return_code: u8) -> Self {
        Self::start_with(Some(return_code)).await
    }

    async fn start_with(refuse: Option<u8>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(BrokerState::default()));
        let (kick, _) = broadcast::channel(4);

        let accept_state = state.clone();
        let accept_kick = kick.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(handle_connection(
                    stream,
                    accept_state.clone(),
                    accept_kick.subscribe(),
                    refuse,
                ));
            }
        });

        Self { addr, state, kick }
    }

    pub fn settings(&self) -> BrokerSettings {
        BrokerSettings {
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            path: "/mqtt".to_string(),
            use_tls: false,
            keep_alive_secs: 30,
            topic_prefix: "termchat/messages".to_string(),
            room: "main".to_string(),
        }
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn subscribers(&self, topic: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .topics
            .get(topic)
            .map_or(0, HashSet::len)
    }

    /// Drops every open connection without a close handshake.
    pub fn kick_all(&self) {
        let _ = self.kick.send(());
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<Mutex<BrokerState>>,
    mut kick: broadcast::Receiver<()>,
    refuse: Option<u8>,
) {
    let callback = |_req: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
        response
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("mqtt"));
        Ok(response)
    };
    let Ok(ws) = accept_hdr_async(stream, callback).await else {
        return;
    };
    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let mut reader = PacketReader::default();
    let mut client_id: Option<String> = None;

    'conn: loop {
        tokio::select! {
            _ = kick.recv() => break 'conn,

            Some(bytes) = rx.recv() => {
                if sink.send(WsMessage::binary(bytes)).await.is_err() {
                    break 'conn;
                }
            }

            frame = stream.next() => {
                let data = match frame {
                    Some(Ok(WsMessage::Binary(data))) => data,
                    Some(Ok(_)) => continue 'conn,
                    _ => break 'conn,
                };
                reader.push(&data);
                while let Ok(Some(packet)) = reader.next_packet() {
                    let reply = match packet {
                        Packet::Connect { client_id: id, .. } => {
                            if let Some(return_code) = refuse {
                                let refusal = Packet::ConnAck { session_present: false, return_code };
                                let _ = sink.send(WsMessage::binary(refusal.encode().unwrap())).await;
                                break 'conn;
                            }
                            let mut state = state.lock().unwrap();
                            state.clients.insert(id.clone(), tx.clone());
                            state.connects += 1;
                            client_id = Some(id);
                            Some(Packet::ConnAck { session_present: false, return_code: 0 })
                        }
                        Packet::Subscribe { packet_id, topic, .. } => {
                            if let Some(id) = &client_id {
                                state.lock().unwrap().topics.entry(topic).or_default().insert(id.clone());
                            }
                            Some(Packet::SubAck { packet_id, return_codes: vec![0] })
                        }
                        Packet::Unsubscribe { packet_id, topic } => {
                            if let Some(id) = &client_id {
                                if let Some(subscribers) = state.lock().unwrap().topics.get_mut(&topic) {
                                    subscribers.remove(id);
                                }
                            }
                            Some(Packet::UnsubAck { packet_id })
                        }
                        Packet::Publish { topic, payload, .. } => {
                            state.lock().unwrap().publish(&topic, &payload);
                            None
                        }
                        Packet::PingReq => Some(Packet::PingResp),
                        Packet::Disconnect => break 'conn,
                        _ => None,
                    };
                    if let Some(reply) = reply {
                        if sink.send(WsMessage::binary(reply.encode().unwrap())).await.is_err() {
                            break 'conn;
                        }
                    }
                }
            }
        }
    }

    if let Some(id) = client_id {
        state.lock().unwrap().cleanup_client(&id);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Chat { text: String, sender: String },
    Status(String),
}

#[derive(Clone, Default)]
pub struct RecordingView {
    lines: Arc<Mutex<Vec<Line>>>,
}

impl RecordingView {
    pub fn chats(&self) -> Vec<(String, String)> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter_map(|l| match l {
                Line::Chat { text, sender } => Some((text.clone(), sender.clone())),
                Line::Status(_) => None,
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter_map(|l| match l {
                Line::Status(s) => Some(s.clone()),
                Line::Chat { .. } => None,
            })
            .collect()
    }

    pub fn count_status(&self, prefix: &str) -> usize {
        self.statuses().iter().filter(|s| s.starts_with(prefix)).count()
    }
}

impl MessageDisplay for RecordingView {
    fn render(&mut self, text: &str, sender: &str) {
        self.lines.lock().unwrap().push(Line::Chat {
            text: text.to_string(),
            sender: sender.to_string(),
        });
    }
}

impl StatusReporter for RecordingView {
    fn status(&mut self, line: &str) {
        self.lines.lock().unwrap().push(Line::Status(line.to_string()));
    }
}

/// Polls `condition` until it holds, panicking after five seconds.
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
