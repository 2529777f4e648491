use std::fmt;

use rand::Rng;
use uuid::Uuid;

/// Prefix of every broker-side client identifier.
pub const CLIENT_ID_PREFIX: &str = "termos-";

/// The display name of the local participant for the whole session.
///
/// Generated once at startup as a prefix plus a random number below 1000.
/// It is never persisted and never changes; inbound messages whose sender
/// equals it are echoes of our own sends.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn generate(prefix: &str) -> Self {
        Self::generate_with(prefix, &mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(prefix: &str, rng: &mut R) -> Self {
        let suffix: u16 = rng.gen_range(0..1000);
        Self(format!("{prefix}{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A fresh broker client identifier, e.g. `termos-1f0c9ab2`.
///
/// A new one is used for every connect attempt so a reconnect never collides
/// with the broker's record of the previous session.
pub fn new_client_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}{}", CLIENT_ID_PREFIX, &hex[..8])
}
