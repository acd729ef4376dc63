use colored::*;
use roomlink::client::{HandshakeStep, RoomEvent};
use roomlink::model::{DataTransferState, ReadyState};

/// One line per event worth showing; `None` hides the event.
pub fn describe(event: &RoomEvent) -> Option<String> {
    let line = match event {
        RoomEvent::ReadyStateChange(state) => match state {
            ReadyState::InRoom => "● in room".green().bold().to_string(),
            ReadyState::Error(reason) => format!("{} {}", "✘ error:".red().bold(), reason),
            other => format!("● {:?}", other).dimmed().to_string(),
        },
        RoomEvent::PeerJoined {
            peer_id, is_self, ..
        } => {
            if *is_self {
                format!("{} you are {}", "→".cyan(), peer_id.to_string().bold())
            } else {
                format!("{} {} joined", "+".green(), peer_id.to_string().bold())
            }
        }
        RoomEvent::PeerLeft { peer_id } => {
            format!("{} {} left", "-".red(), peer_id.to_string().bold())
        }
        RoomEvent::HandshakeProgress {
            peer_id,
            step: HandshakeStep::Error,
            error,
        } => format!(
            "{} handshake with {} failed: {}",
            "!".red(),
            peer_id,
            error.as_deref().unwrap_or("unknown error")
        ),
        RoomEvent::IceConnectionState { peer_id, state } if state.is_connected() => {
            format!("{} connected to {}", "⇄".green(), peer_id)
        }
        RoomEvent::PeerRestart { peer_id, hard, .. } => format!(
            "{} restarting connection to {} ({})",
            "↻".yellow(),
            peer_id,
            if *hard { "hard" } else { "soft" }
        ),
        RoomEvent::IncomingMessage {
            peer_id,
            data,
            is_private,
            is_data_channel,
        } => {
            let text = data
                .get("text")
                .and_then(|t| t.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| data.to_string());
            let via = if *is_data_channel { "p2p" } else { "relay" };
            let scope = if *is_private { "private" } else { "public" };
            format!(
                "{} {}",
                format!("[{peer_id} {scope}/{via}]").blue(),
                text
            )
        }
        RoomEvent::RoomLock { peer_id, locked } => format!(
            "{} room {} by {}",
            "🔒".yellow(),
            if *locked { "locked" } else { "unlocked" },
            peer_id
        ),
        RoomEvent::PeerUpdated { peer_id, user_data } => {
            format!("{} {} is now {}", "~".cyan(), peer_id, user_data)
        }
        RoomEvent::DataTransferState {
            peer_id,
            state,
            info,
            error,
            ..
        } => match state {
            DataTransferState::UploadRequest => format!(
                "{} {} offers '{}' ({} bytes)",
                "⇩".cyan(),
                peer_id,
                info.name,
                info.size
            ),
            DataTransferState::Uploading | DataTransferState::Downloading => {
                format!("   '{}' {}%", info.name, info.percentage).dimmed().to_string()
            }
            DataTransferState::UploadCompleted => {
                format!("{} sent '{}' to {}", "✔".green(), info.name, peer_id)
            }
            DataTransferState::DownloadCompleted => {
                format!("{} received '{}' from {}", "✔".green(), info.name, peer_id)
            }
            DataTransferState::Rejected => {
                format!("{} {} declined '{}'", "✘".yellow(), peer_id, info.name)
            }
            DataTransferState::Cancel | DataTransferState::Error => format!(
                "{} transfer '{}' with {} stopped: {}",
                "✘".red(),
                info.name,
                peer_id,
                error.as_deref().unwrap_or("cancelled")
            ),
            DataTransferState::UploadStarted | DataTransferState::DownloadStarted => return None,
        },
        RoomEvent::Redirect { action, info, .. } => {
            format!("{} server says {}: {}", "!".red().bold(), action, info)
        }
        RoomEvent::ChannelError {
            peer_id,
            channel,
            error,
        } => format!("{} channel '{}' to {}: {}", "!".red(), channel, peer_id, error),
        _ => return None,
    };
    Some(line)
}
