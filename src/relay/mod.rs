//! The `relay` module is the chat relay client.
//!
//! - `client`: the `RelayClient` state machine (connect, send, inbound
//!   handling, echo suppression, reconnect scheduling).
//! - `message`: the `ChatMessage` wire type.
//! - `topic`: the shared topic and its room naming.
//! - `retry`: the reconnect policy.
//! - `view`: the display and status collaborators the client reports to.
//! - `runner`: the async loop that feeds events and commands to a client.

pub mod client;
pub mod message;
pub mod retry;
pub mod runner;
pub mod topic;
pub mod view;

pub use client::{ConnectionState, RelayClient};
pub use message::ChatMessage;
pub use retry::RetryPolicy;
pub use runner::{Command, run};
pub use topic::{Topic, is_valid_room};
pub use view::{MessageDisplay, StatusReporter};
