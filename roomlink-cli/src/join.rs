use crate::{files, render};
use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use dialoguer::Confirm;
use roomlink::client::{
    Bootstrap, HttpBootstrap, RoomDeps, RoomEvent, RoomSession, StaticBootstrap, TransferRequest,
    WebRtcConnectionFactory, WsSignalingGateway,
};
use roomlink::model::{DataTransferState, PeerId, RoomCredentials};
use roomlink::RoomOptions;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::warn;

#[derive(Args)]
pub struct JoinArgs {
    #[arg(long)]
    app_key: String,

    #[arg(long)]
    room: String,

    /// Bootstrap API; without it the room name doubles as the room key.
    #[arg(long)]
    api_server: Option<String>,

    #[arg(long)]
    signaling: Option<String>,

    /// JSON room options; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Display name announced to other participants.
    #[arg(long)]
    name: Option<String>,

    #[arg(long, default_value = "./downloads")]
    downloads: PathBuf,

    /// Accept every incoming transfer without asking.
    #[arg(long)]
    auto_accept: bool,
}

const HELP: &str = "\
/peers                  list participants
/send <peer> <path>     send a file
/send-url <peer> <path> send a file as a data URL
/p2p <text>             message every peer over data channels
/lock, /unlock          lock or unlock the room
/restart <peer>         renegotiate with a peer
/quit                   leave the room
anything else           message the room through the server";

pub async fn run(args: JoinArgs) -> Result<()> {
    let options = options_from(&args)?;
    let bootstrap: Arc<dyn Bootstrap> = if options.api_server.is_some() {
        Arc::new(HttpBootstrap::new())
    } else {
        Arc::new(StaticBootstrap::new(RoomCredentials {
            room_key: args.room.clone(),
            ..Default::default()
        }))
    };
    let deps = RoomDeps::new(
        bootstrap,
        Arc::new(WsSignalingGateway::new()),
        Arc::new(WebRtcConnectionFactory::new().context("Failed to set up WebRTC")?),
    );

    let room = Arc::new(RoomSession::from_options(options, deps)?);
    let events = room.subscribe();

    println!("{}", format!("🚀 Joining '{}'...", args.room).green().bold());
    room.connect().await.context("Failed to join the room")?;

    let listener = tokio::spawn(listen(
        Arc::clone(&room),
        events,
        args.downloads.clone(),
        args.auto_accept,
    ));
    println!("{}", "Type /help for commands.".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match execute(&room, line).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("{} {:#}", "✘".red(), e),
        }
    }

    room.leave().await.ok();
    listener.abort();
    println!("{}", "👋 Left the room".green());
    Ok(())
}

fn options_from(args: &JoinArgs) -> Result<RoomOptions> {
    let mut options = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            RoomOptions::from_json_str(&raw)
                .with_context(|| format!("{} is not valid room options JSON", path.display()))?
        }
        None => RoomOptions::default(),
    };
    options.app_key = args.app_key.clone();
    options.room = args.room.clone();
    if args.api_server.is_some() {
        options.api_server = args.api_server.clone();
    }
    if args.signaling.is_some() {
        options.signaling_url = args.signaling.clone();
    }
    if let Some(name) = &args.name {
        options.user_data = json!({ "name": name });
    }
    Ok(options)
}

/// Runs one input line; `Ok(false)` ends the session.
async fn execute(room: &RoomSession, line: &str) -> Result<bool> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match command {
        "/quit" | "/exit" => return Ok(false),
        "/help" => println!("{HELP}"),
        "/peers" => {
            let peers = room.peers();
            if peers.is_empty() {
                println!("{}", "nobody else is here".dimmed());
            }
            for (id, info) in peers {
                println!(
                    "  {} {} ({})",
                    id.to_string().bold(),
                    info.user.data,
                    info.user.agent.name
                );
            }
        }
        "/send" | "/send-url" => {
            let (peer, path) = rest
                .split_once(' ')
                .context("usage: /send <peer> <path>")?;
            let (name, data) = files::load(Path::new(path.trim()), command == "/send-url")?;
            let id = room
                .transfer(&PeerId::from(peer), TransferRequest::new(name, data))
                .await?;
            println!("{}", format!("   offered as {}", id.as_str()).dimmed());
        }
        "/p2p" => room.send_p2p_message(None, json!({ "text": rest })).await?,
        "/lock" => room.lock_room(true).await?,
        "/unlock" => room.lock_room(false).await?,
        "/restart" => room.restart_peer(&PeerId::from(rest), false).await?,
        _ if command.starts_with('/') => println!("unknown command, try /help"),
        _ => room.send_message(None, json!({ "text": line })).await?,
    }
    Ok(true)
}

async fn listen(
    room: Arc<RoomSession>,
    mut events: broadcast::Receiver<RoomEvent>,
    downloads: PathBuf,
    auto_accept: bool,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Dropped {} room events", n);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };
        if let Some(line) = render::describe(&event) {
            println!("{line}");
        }

        let RoomEvent::DataTransferState {
            peer_id,
            transfer_id,
            state,
            info,
            data,
            ..
        } = event
        else {
            continue;
        };
        match state {
            DataTransferState::UploadRequest => {
                let prompt = format!("Accept '{}' from {}?", info.name, peer_id);
                let accept = auto_accept || ask(prompt).await;
                if let Err(e) = room.respond_transfer(&peer_id, &transfer_id, accept).await {
                    println!("{} {}", "✘".red(), e);
                }
            }
            DataTransferState::DownloadCompleted => {
                let Some(data) = data else {
                    continue;
                };
                match files::save(&downloads, &info.name, &data) {
                    Ok(path) => println!("{}", format!("   saved to {}", path.display()).dimmed()),
                    Err(e) => println!("{} {:#}", "✘".red(), e),
                }
            }
            _ => {}
        }
    }
}

async fn ask(prompt: String) -> bool {
    tokio::task::spawn_blocking(move || {
        Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()
            .unwrap_or(false)
    })
    .await
    .unwrap_or(false)
}
