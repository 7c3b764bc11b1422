use serenity::model::id::{ChannelId, GuildId};

use crate::audio::track::TrackInfo;

/// Notifications published by playback loops. The command layer renders
/// them; nothing in the core depends on anyone listening.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    TrackStarted {
        guild_id: GuildId,
        text_channel: Option<ChannelId>,
        track: TrackInfo,
    },
    TrackEnded {
        guild_id: GuildId,
        text_channel: Option<ChannelId>,
        track: TrackInfo,
        outcome: TrackOutcome,
    },
    Disconnected {
        guild_id: GuildId,
        text_channel: Option<ChannelId>,
        reason: DisconnectReason,
    },
}

impl PlayerEvent {
    pub fn guild_id(&self) -> GuildId {
        match self {
            Self::TrackStarted { guild_id, .. }
            | Self::TrackEnded { guild_id, .. }
            | Self::Disconnected { guild_id, .. } => *guild_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    Finished,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Requested,
    Idle,
}
