use std::fmt;

/// The shared channel every participant publishes to and subscribes from.
///
/// Named `<prefix>/<room>`, e.g. `termchat/messages/main`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    prefix: String,
    room: String,
    name: String,
}

impl Topic {
    pub fn for_room(prefix: &str, room: &str) -> Self {
        let prefix = prefix.trim_end_matches('/').to_string();
        let room = room.trim().to_string();
        let name = if prefix.is_empty() {
            room.clone()
        } else {
            format!("{prefix}/{room}")
        };
        Self { prefix, room, name }
    }

    /// The same prefix with another room.
    pub fn with_room(&self, room: &str) -> Self {
        Self::for_room(&self.prefix, room)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn room(&self) -> &str {
        &self.room
    }
}

/// Whether `room` can be used as the last topic level.
///
/// MQTT topic names must not contain the `+` and `#` wildcards, and a `/`
/// would move the room to another level of the hierarchy.
pub fn is_valid_room(room: &str) -> bool {
    let room = room.trim();
    !room.is_empty() && !room.contains(['+', '#', '/', '\0'])
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
