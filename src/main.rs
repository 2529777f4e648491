//! CLI for termchat
//!
//! Connects to the configured broker, joins the room topic and relays lines
//! typed on stdin. `/join <room>` switches rooms, `/quit` leaves.

use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{error, info, warn};

use termchat::config::{Settings, load_config_from};
use termchat::console::{ConsoleView, parse_input};
use termchat::identity::Identity;
use termchat::relay::{
    self, Command, RelayClient, RetryPolicy, StatusReporter, Topic, is_valid_room,
};
use termchat::transport::WsTransport;
use termchat::utils::logging;

#[derive(Parser)]
#[command(name = "termchat", about = "Terminal chat over a public MQTT broker")]
struct Cli {
    /// Configuration file (defaults to config/default if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use this display name instead of a random one
    #[arg(long)]
    name: Option<String>,

    /// Room to join on start
    #[arg(long)]
    room: Option<String>,

    /// error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut settings = match load_config_from(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("error");
            error!("Failed to load configuration: {}", e);
            return;
        }
    };
    if let Some(name) = cli.name {
        settings.identity.name = Some(name);
    }
    if let Some(room) = cli.room {
        settings.broker.room = room;
    }
    if let Some(level) = cli.log_level {
        settings.logging.level = level;
    }

    logging::init(&settings.logging.level);

    if !is_valid_room(&settings.broker.room) {
        error!(
            "Invalid room name {:?}: rooms cannot be empty or contain '+', '#' or '/'",
            settings.broker.room
        );
        return;
    }

    // wss needs a process-wide rustls crypto provider
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("a TLS crypto provider was already installed");
    }

    run_chat(settings).await;
}

async fn run_chat(settings: Settings) {
    let identity = match &settings.identity.name {
        Some(name) => Identity::new(name.clone()),
        None => Identity::generate(&settings.identity.prefix),
    };
    let topic = Topic::for_room(&settings.broker.topic_prefix, &settings.broker.room);

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (command_tx, command_rx) = mpsc::unbounded_channel();

    let transport = WsTransport::new(&settings.broker, event_tx);
    info!(url = transport.url(), %topic, "starting chat");

    let mut view = ConsoleView::stdout();
    view.status(&format!("Signed in as {identity}. Room: [{}]", topic.room().to_uppercase()));

    let client = RelayClient::new(
        identity,
        topic,
        RetryPolicy::from(&settings.retry),
        transport,
        view,
    );

    let mut relay_task = tokio::spawn(relay::run(client, event_rx, command_rx));
    tokio::spawn(read_stdin(command_tx.clone()));

    tokio::select! {
        result = &mut relay_task => {
            if let Err(e) = result {
                error!("Relay task failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
            let _ = command_tx.send(Command::Quit);
            if let Err(e) = relay_task.await {
                error!("Relay task failed: {}", e);
            }
        }
    }
}

async fn read_stdin(commands: UnboundedSender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(command) = parse_input(&line) else {
                    continue;
                };
                let quit = command == Command::Quit;
                if commands.send(command).is_err() || quit {
                    break;
                }
            }
            Ok(None) => {
                let _ = commands.send(Command::Quit);
                break;
            }
            Err(e) => {
                warn!(error = %e, "failed to read from stdin");
                let _ = commands.send(Command::Quit);
                break;
            }
        }
    }
}
