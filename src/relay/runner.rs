use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::relay::client::RelayClient;
use crate::relay::view::{MessageDisplay, StatusReporter};
use crate::transport::{Transport, TransportEnvelope};

/// What the user asks the relay to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Join(String),
    Quit,
}

/// Drives `client` until `Command::Quit` arrives or the command channel closes.
///
/// Transport events, user commands and the reconnect timer are handled one
/// at a time on this task, so the client is never touched concurrently.
/// There is a single reconnect timer; it is only armed when the client asks
/// for a reconnect, which it does at most once per loss.
pub async fn run<T, V>(
    mut client: RelayClient<T, V>,
    mut events: UnboundedReceiver<TransportEnvelope>,
    mut commands: UnboundedReceiver<Command>,
) -> RelayClient<T, V>
where
    T: Transport,
    V: MessageDisplay + StatusReporter,
{
    let reconnect = sleep(Duration::ZERO);
    tokio::pin!(reconnect);
    let mut armed = false;

    client.connect();

    loop {
        tokio::select! {
            Some(envelope) = events.recv() => {
                if client.client_id() != Some(envelope.client_id.as_str()) {
                    debug!(client_id = %envelope.client_id, "dropping event from superseded connection");
                    continue;
                }
                if let Some(delay) = client.handle_event(envelope.event) {
                    reconnect.as_mut().reset(Instant::now() + delay);
                    armed = true;
                }
            }

            command = commands.recv() => match command {
                Some(Command::Say(text)) => client.say(&text),
                Some(Command::Join(room)) => client.switch_room(&room),
                Some(Command::Quit) | None => break,
            },

            () = &mut reconnect, if armed => {
                armed = false;
                client.reconnect_due();
            }
        }
    }

    info!("leaving chat");
    client.shutdown();
    client
}
