use std::{
    collections::HashMap,
    future::Future,
    io::{Write, stdout},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use crossterm::{
    QueueableCommand,
    style::{Color, ResetColor, SetForegroundColor},
};
use futures::{Stream, StreamExt};
use tokio::signal::ctrl_c;
use tracing::{Level, warn};

use rocket_stream::{
    ChatSession, ClientConfig, PollerConfig, PostMessage, RocketClient,
    config::{DEFAULT_DEDUP_CAPACITY, DEFAULT_REQUEST_TIMEOUT},
    display::Display,
    models::{ConversationSet, Message},
    start_incoming_stream,
    telemetry::init_tracing,
    utils::Transcript,
};

#[derive(Parser)]
#[command(name = "rocket-stream")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Stream new Rocket.Chat messages from every room you are in", long_about = None)]
struct Cli {
    /// Server base url, e.g. https://chat.example.com
    #[arg(long, env = "ROCKET_URL")]
    url: String,

    #[arg(long, env = "ROCKET_USERNAME")]
    username: String,

    #[arg(long, env = "ROCKET_PASSWORD", hide_env_values = true)]
    password: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print incoming messages until Ctrl+C
    Watch(WatchArgs),

    /// List the conversations that would be polled
    Rooms,

    /// Post a message
    Post {
        /// `#channel`, `@username` or a room id
        #[arg(short, long)]
        channel: String,

        #[arg(short, long)]
        text: String,

        #[arg(long)]
        alias: Option<String>,
    },

    /// Set the user's status
    Status {
        /// online, away, busy or offline
        #[arg(short, long)]
        status: String,

        #[arg(short, long, default_value = "")]
        message: String,
    },

    /// Show the direct-message history with a user
    DmHistory {
        #[arg(short, long)]
        username: String,
    },
}

#[derive(Args)]
struct WatchArgs {
    #[arg(long, env = "ROCKET_POLL_INTERVAL_MS", default_value_t = 2000)]
    poll_interval_ms: u64,

    #[arg(long, env = "ROCKET_DEDUP_CAPACITY", default_value_t = DEFAULT_DEDUP_CAPACITY)]
    dedup_capacity: usize,

    /// Also append every received message to a JSON file in this directory
    #[arg(long)]
    transcript_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs, if cli.verbose { Level::DEBUG } else { Level::INFO });

    let config = ClientConfig {
        base_url: cli.url.clone(),
        request_timeout: Duration::from_secs(cli.timeout_secs),
    };
    let client = RocketClient::new(&config).context("Invalid client configuration")?;
    let session = client
        .login(&cli.username, &cli.password)
        .await
        .context("Failed to log in")?;
    println!("🔑 Logged in as {} ({})", cli.username, session.user_id);

    let chat = Arc::new(client.with_session(session));
    let outcome = run_command(Arc::clone(&chat), cli.command).await;

    if let Err(e) = chat.logout().await {
        warn!(error = %e, "logout failed");
    }
    outcome
}

async fn run_command(chat: Arc<ChatSession>, command: Commands) -> Result<()> {
    match command {
        Commands::Watch(args) => watch(chat, args).await,
        Commands::Rooms => list_rooms(&chat).await,
        Commands::Post {
            channel,
            text,
            alias,
        } => {
            let mut message = PostMessage::to_channel(channel, text);
            message.alias = alias;
            let posted = chat.post_message(&message).await.context("Failed to post")?;
            println!(
                "✅ Posted {} to {}",
                posted.message.map(|m| m.id).unwrap_or_default(),
                posted.room_id.unwrap_or_default()
            );
            Ok(())
        }
        Commands::Status { status, message } => {
            chat.set_status(&message, &status)
                .await
                .context("Failed to set status")?;
            println!("✅ Status set to {}", status);
            Ok(())
        }
        Commands::DmHistory { username } => {
            let messages = chat
                .direct_messages_with(&username)
                .await
                .with_context(|| format!("Failed to read messages with {}", username))?;
            let display = Display::new();
            for message in &messages {
                println!("{}", display.format_line(message));
            }
            println!("📨 {} messages", messages.len());
            Ok(())
        }
    }
}

async fn conversation_labels(chat: &ChatSession, display: &mut Display) -> Result<ConversationSet> {
    let rooms = chat.list_rooms().await.context("Failed to list rooms")?;
    let ims = chat
        .list_direct_messages()
        .await
        .context("Failed to list direct messages")?;
    let names: HashMap<_, _> = rooms
        .iter()
        .filter_map(|r| r.name.clone().map(|name| (r.id.clone(), name)))
        .collect();
    let set = ConversationSet::from_listings(&rooms, &ims);
    display.set_labels(&set, &names);
    Ok(set)
}

async fn watch(chat: Arc<ChatSession>, args: WatchArgs) -> Result<()> {
    let mut display = Display::new();
    match conversation_labels(&chat, &mut display).await {
        Ok(set) => println!(
            "📊 Found {} channels and {} direct messages",
            set.channels.len(),
            set.direct_messages.len()
        ),
        Err(e) => warn!(error = %e, "could not load room names, showing raw ids"),
    }

    let mut transcript = args
        .transcript_dir
        .as_deref()
        .map(|dir| Transcript::create(dir, "rocket"))
        .transpose()?;

    let config = PollerConfig::new(
        Duration::from_millis(args.poll_interval_ms),
        chat.session().user_id.clone(),
    )
    .with_dedup_capacity(args.dedup_capacity);
    let mut stream = start_incoming_stream(Arc::clone(&chat), config)
        .context("Failed to start incoming stream")?;
    println!("🚀 Watching for new messages (Ctrl+C to stop)\n");

    let outcome = forward_messages(&mut stream, ctrl_c(), |message| {
        if let Some(transcript) = transcript.as_mut() {
            transcript.push(message.clone())?;
        }
        display.print_message(&message)
    })
    .await;

    // Cleanup runs on every exit path; the first error wins afterwards.
    let stats = stream.stop().await;
    let flushed = match transcript.as_mut() {
        Some(transcript) => transcript.flush().map(|()| {
            display.total_saved = transcript.saved();
            println!("💾 Messages saved to: {}", transcript.path().display());
        }),
        None => Ok(()),
    };
    stats.log_summary();
    let summary = if matches!(outcome, Ok(WatchExit::Interrupted)) {
        display.show_shutdown_message()
    } else {
        Ok(())
    }
    .and_then(|()| display.print_summary(&stats));

    outcome?;
    flushed?;
    summary
}

#[derive(Debug, PartialEq, Eq)]
enum WatchExit {
    Interrupted,
    StreamEnded,
}

/// Hands every message to `handle` until `shutdown` resolves or the stream
/// ends. A handler error ends the loop and is returned to the caller.
async fn forward_messages<S, F, H>(stream: &mut S, shutdown: F, mut handle: H) -> Result<WatchExit>
where
    S: Stream<Item = Message> + Unpin,
    F: Future,
    H: FnMut(Message) -> Result<()>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => return Ok(WatchExit::Interrupted),
            next = stream.next() => match next {
                Some(message) => handle(message)?,
                None => {
                    warn!("incoming stream closed");
                    return Ok(WatchExit::StreamEnded);
                }
            }
        }
    }
}

async fn list_rooms(chat: &ChatSession) -> Result<()> {
    let mut display = Display::new();
    let set = conversation_labels(chat, &mut display).await?;
    let channels = chat.list_channels().await.context("Failed to list channels")?;

    let mut out = stdout();
    out.queue(SetForegroundColor(Color::Cyan))?;
    println!("\nPolled conversations:");
    out.queue(ResetColor)?;
    out.flush()?;
    for (i, conversation) in set.in_poll_order().enumerate() {
        println!(
            "{}. {} ({})",
            i + 1,
            display.label_for(&conversation.id),
            conversation.kind
        );
    }

    out.queue(SetForegroundColor(Color::Cyan))?;
    println!("\nPublic channels:");
    out.queue(ResetColor)?;
    out.flush()?;
    for channel in &channels {
        println!("- #{} ({} msgs)", channel.name, channel.msgs);
    }
    Ok(())
}
