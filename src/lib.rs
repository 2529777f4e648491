//! # termchat
//!
//! `termchat` is a terminal chat client that relays messages through a public
//! MQTT broker over an encrypted WebSocket.
//!
//! ## Core Modules
//!
//! - `relay`: the relay client state machine, the chat message format,
//!   reconnect policy and the async runner.
//! - `transport`: the broker connection (MQTT over WebSocket) and its codec.
//! - `identity`: the session identity and per-connection client ids.
//! - `console`: the terminal display and input parsing.
//! - `config`: layered configuration (file, environment, defaults).
//! - `utils`: error types and logging setup.

pub mod config;
pub mod console;
pub mod identity;
pub mod relay;
pub mod transport;
pub mod utils;
