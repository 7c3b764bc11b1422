//! # Bot Module
//!
//! Thin serenity layer in front of the guild players.
//!
//! - Slash command registration and dispatch ([`commands`], [`handlers`])
//! - Now-playing messages driven by player events ([`events`])
//! - Cleanup when the bot is removed from voice by someone else
//!
//! Every guild's state lives in its [`GuildPlayer`](crate::audio::GuildPlayer);
//! this module only translates interactions into player operations and
//! player results into messages.

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod events;
pub mod handlers;

use crate::{
    audio::{PlayerError, PlayerRegistry},
    config::Config,
};

/// Discord event handler for the music bot.
pub struct MusicBot {
    /// Bot configuration loaded from environment variables
    config: Arc<Config>,
    /// One player per guild
    pub players: Arc<PlayerRegistry>,
    /// The now-playing relay is started once, on the first ready event
    relay_started: AtomicBool,
}

impl MusicBot {
    pub fn new(config: Config, players: Arc<PlayerRegistry>) -> Self {
        Self {
            config: Arc::new(config),
            players,
            relay_started: AtomicBool::new(false),
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// Commands go to a single guild when `GUILD_ID` is set (updates show up
    /// immediately) and globally otherwise.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registering slash commands...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Guild commands registered for: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Global commands registered");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Failed to register commands: {:?}", e);
        }

        // Ready fires again on every reconnect.
        if !self.relay_started.swap(true, Ordering::AcqRel) {
            let http = ctx.http.clone();
            let events = self.players.subscribe();
            tokio::spawn(events::relay_now_playing(http, events));
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                    error!("Error handling command: {:?}", e);
                }
            }
            Interaction::Component(component) => {
                if let Err(e) = handlers::handle_component(&ctx, component, self).await {
                    error!("Error handling component: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Tears the session down when the bot is kicked or moved out of voice.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        if new.user_id != ctx.cache.current_user().id || old.is_none() || new.channel_id.is_some() {
            return;
        }
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let Some(player) = self.players.get(guild_id) else {
            return;
        };

        match player.disconnect().await {
            Ok(()) => warn!("🔌 Removed from voice in guild {}, stopping player", guild_id),
            // Our own leave also lands here after the session is gone.
            Err(PlayerError::NotConnected) => debug!("Voice state cleared for guild {}", guild_id),
            Err(e) => error!("Failed to stop player in guild {}: {}", guild_id, e),
        }
    }
}
