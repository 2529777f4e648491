//! The `identity` module names the local participant.
//!
//! It provides the session `Identity` used for echo suppression and the
//! per-connection client identifiers handed to the broker.

pub mod session;
pub use session::{Identity, new_client_id};
