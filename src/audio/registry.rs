use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::audio::{
    events::PlayerEvent,
    player::{GuildPlayer, PlayerServices, PlayerSettings},
};

/// Guild id → player. Players are created on first use and reused for every
/// later session in that guild.
pub struct PlayerRegistry {
    players: DashMap<GuildId, Arc<GuildPlayer>>,
    services: PlayerServices,
    settings: PlayerSettings,
}

impl PlayerRegistry {
    pub fn new(services: PlayerServices, settings: PlayerSettings) -> Self {
        Self {
            players: DashMap::new(),
            services,
            settings,
        }
    }

    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildPlayer> {
        self.players
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("Creating player for guild {}", guild_id);
                Arc::new(GuildPlayer::new(guild_id, self.services.clone(), self.settings))
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildPlayer>> {
        self.players.get(&guild_id).map(|player| player.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.services.events.subscribe()
    }
}
