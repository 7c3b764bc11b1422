use anyhow::Result;
use serenity::{
    builder::CreateMessage,
    http::Http,
    model::id::{ChannelId, GuildId, MessageId},
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tracing::{debug, info, warn};

use crate::{
    audio::{DisconnectReason, PlayerEvent, TrackInfo},
    ui::{buttons, embeds},
};

/// Posts a now-playing message when a track starts and deletes it again when
/// the track ends or the player leaves voice.
pub async fn relay_now_playing(http: Arc<Http>, mut events: Receiver<PlayerEvent>) {
    let mut messages: HashMap<GuildId, (ChannelId, MessageId)> = HashMap::new();
    info!("📣 Now-playing relay started");

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(missed)) => {
                warn!("Now-playing relay fell behind, {} events dropped", missed);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let guild_id = event.guild_id();
        match event {
            PlayerEvent::TrackStarted {
                text_channel: Some(channel),
                track,
                ..
            } => match send_now_playing(&http, channel, &track).await {
                Ok(message) => {
                    if let Some((channel, stale)) = messages.insert(guild_id, (channel, message)) {
                        delete(&http, channel, stale).await;
                    }
                }
                Err(e) => warn!("Failed to send now playing message: {:?}", e),
            },
            PlayerEvent::TrackEnded { track, outcome, .. } => {
                debug!("'{}' ended in guild {} ({:?})", track.title, guild_id, outcome);
                if let Some((channel, message)) = messages.remove(&guild_id) {
                    delete(&http, channel, message).await;
                }
            }
            PlayerEvent::Disconnected {
                text_channel, reason, ..
            } => {
                if let Some((channel, message)) = messages.remove(&guild_id) {
                    delete(&http, channel, message).await;
                }
                if let (Some(channel), DisconnectReason::Idle) = (text_channel, reason) {
                    let notice = CreateMessage::new()
                        .embed(embeds::success_embed("💤 Left the voice channel after inactivity"));
                    if let Err(e) = channel.send_message(&http, notice).await {
                        warn!("Failed to send idle notice: {:?}", e);
                    }
                }
            }
            PlayerEvent::TrackStarted { .. } => {}
        }
    }

    debug!("Now-playing relay stopped");
}

async fn send_now_playing(http: &Arc<Http>, channel: ChannelId, track: &TrackInfo) -> Result<MessageId> {
    let message = channel.send_message(http, now_playing_message(track)).await?;
    Ok(message.id)
}

fn now_playing_message(track: &TrackInfo) -> CreateMessage {
    CreateMessage::new()
        .embed(embeds::track_embed("Now playing", track))
        .components(vec![buttons::player_controls()])
}

async fn delete(http: &Arc<Http>, channel: ChannelId, message: MessageId) {
    if let Err(e) = channel.delete_message(http, message).await {
        warn!(
            "Failed to delete message {} in channel {}: {:?}",
            message, channel, e
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{audio::testing::{requestor, resolved}, ui::buttons::ControlAction};
    use pretty_assertions::assert_eq;

    #[test]
    fn now_playing_shows_full_track_details_and_controls() {
        let track = TrackInfo::new(resolved("song"), requestor());
        let value = serde_json::to_value(now_playing_message(&track)).unwrap();

        let embed = &value["embeds"][0];
        assert_eq!(embed["author"]["name"], "Now playing");
        assert_eq!(embed["fields"][0]["name"], "Uploader");
        assert_eq!(embed["fields"][0]["value"], "uploader");
        assert_eq!(embed["fields"][1]["value"], "`3m`");

        let controls = &value["components"][0]["components"];
        assert_eq!(controls[0]["custom_id"], ControlAction::Skip.custom_id());
        assert_eq!(controls[1]["custom_id"], ControlAction::ShowQueue.custom_id());
    }
}
