use anyhow::{anyhow, Result};
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseFollowup,
        CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::{CommandDataOptionValue, CommandInteraction, ComponentInteraction},
        id::{ChannelId, GuildId, UserId},
        user::User,
    },
    prelude::Context,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    audio::{GuildPlayer, PlayerError, Requestor},
    bot::MusicBot,
    ui::{buttons::ControlAction, embeds},
};

/// Commands that may wait on a voice join or yt-dlp and have to be deferred.
const SLOW_COMMANDS: &[&str] = &["connect", "play"];

/// Handles slash commands
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &MusicBot) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return reply_ephemeral(ctx, &command, "This command only works inside a server").await;
    };

    info!(
        "📝 Command /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    let deferred = SLOW_COMMANDS.contains(&command.data.name.as_str());
    if deferred {
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
            )
            .await?;
    }

    let player = bot.players.get_or_create(guild_id);
    let result = match command.data.name.as_str() {
        "connect" => handle_connect(ctx, &command, &player).await,
        "disconnect" => handle_disconnect(&player).await,
        "play" => handle_play(ctx, &command, &player).await,
        "skip" => handle_skip(&command, &player).await,
        "replay" => Ok(handle_replay(&player)),
        "volume" => handle_volume(&command, &player),
        "queue" => handle_queue(&player).await,
        other => Err(anyhow!("Unknown command: {}", other)),
    };

    match (result, deferred) {
        (Ok(embed), false) => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
                )
                .await?;
        }
        (Ok(embed), true) => {
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                .await?;
        }
        (Err(e), false) => {
            debug!("/{} failed: {}", command.data.name, e);
            reply_ephemeral(ctx, &command, &e.to_string()).await?;
        }
        (Err(e), true) => {
            debug!("/{} failed: {}", command.data.name, e);
            // A deferred reply is public, so swap it for a private follow-up.
            command.delete_response(&ctx.http).await?;
            command
                .create_followup(
                    &ctx.http,
                    CreateInteractionResponseFollowup::new()
                        .embed(embeds::error_embed(&e.to_string()))
                        .ephemeral(true),
                )
                .await?;
        }
    }

    Ok(())
}

/// Handles button presses on now-playing messages
pub async fn handle_component(ctx: &Context, component: ComponentInteraction, bot: &MusicBot) -> Result<()> {
    let Some(guild_id) = component.guild_id else {
        return Ok(());
    };
    let Some(action) = ControlAction::from_custom_id(&component.data.custom_id) else {
        debug!("Ignoring unknown component {}", component.data.custom_id);
        return Ok(());
    };

    info!(
        "🔘 {:?} pressed by {} in guild {}",
        action, component.user.name, guild_id
    );

    let player = bot.players.get_or_create(guild_id);
    let embed = match action {
        ControlAction::Skip => skip(&player, 1).await,
        ControlAction::ShowQueue => handle_queue(&player).await,
    }
    .unwrap_or_else(|e| embeds::error_embed(&e.to_string()));

    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed).ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}

async fn handle_connect(ctx: &Context, command: &CommandInteraction, player: &Arc<GuildPlayer>) -> Result<CreateEmbed> {
    let voice_channel = match option(command, "channel").and_then(CommandDataOptionValue::as_channel_id) {
        Some(channel) => channel,
        None => user_voice_channel(ctx, player.guild_id(), command.user.id)?,
    };

    player.connect(voice_channel, command.channel_id).await?;
    Ok(embeds::success_embed(&format!("🔌 Connected to <#{}>", voice_channel)))
}

async fn handle_disconnect(player: &GuildPlayer) -> Result<CreateEmbed> {
    player.disconnect().await?;
    Ok(embeds::success_embed("👋 Disconnected"))
}

async fn handle_play(ctx: &Context, command: &CommandInteraction, player: &Arc<GuildPlayer>) -> Result<CreateEmbed> {
    let query = option(command, "query")
        .and_then(CommandDataOptionValue::as_str)
        .ok_or_else(|| anyhow!("Missing search query"))?;

    if !player.is_connected().await {
        let voice_channel = user_voice_channel(ctx, player.guild_id(), command.user.id)?;
        match player.connect(voice_channel, command.channel_id).await {
            // Someone else connected it in the meantime.
            Ok(()) | Err(PlayerError::AlreadyConnected) => {}
            Err(e) => return Err(e.into()),
        }
    }

    let track = player.add_to_queue(requestor(&command.user), query).await?;
    Ok(embeds::track_embed("Added to queue", &track))
}

async fn handle_skip(command: &CommandInteraction, player: &GuildPlayer) -> Result<CreateEmbed> {
    let amount = option(command, "number")
        .and_then(CommandDataOptionValue::as_i64)
        .unwrap_or(1);
    skip(player, usize::try_from(amount).unwrap_or(0)).await
}

async fn skip(player: &GuildPlayer, amount: usize) -> Result<CreateEmbed> {
    let skipped = player.skip_queue(amount).await?;
    let noun = if skipped == 1 { "track" } else { "tracks" };
    Ok(embeds::success_embed(&format!("⏭️ Skipped {} {}", skipped, noun)))
}

fn handle_replay(player: &GuildPlayer) -> CreateEmbed {
    if player.toggle_replay_mode() {
        embeds::success_embed("🔂 Replay mode enabled")
    } else {
        embeds::success_embed("➡️ Replay mode disabled")
    }
}

fn handle_volume(command: &CommandInteraction, player: &GuildPlayer) -> Result<CreateEmbed> {
    let level = option(command, "number")
        .and_then(CommandDataOptionValue::as_i64)
        .ok_or_else(|| anyhow!("Missing volume"))?;
    let level = u32::try_from(level).map_err(|_| anyhow!("Volume can't be negative"))?;

    player.set_volume(level)?;
    Ok(embeds::success_embed(&format!("🔊 Volume set to {}%", player.volume())))
}

async fn handle_queue(player: &GuildPlayer) -> Result<CreateEmbed> {
    let tracks = player.queue().await?;
    if tracks.is_empty() {
        return Err(PlayerError::QueueEmpty.into());
    }
    Ok(embeds::queue_embed(&tracks, player.is_replay_active()))
}

async fn reply_ephemeral(ctx: &Context, command: &CommandInteraction, message: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::error_embed(message))
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

fn option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a CommandDataOptionValue> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .map(|opt| &opt.value)
}

fn requestor(user: &User) -> Requestor {
    Requestor {
        id: user.id,
        name: user.display_name().to_string(),
        avatar_url: user.avatar_url(),
    }
}

fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Result<ChannelId> {
    let guild = guild_id
        .to_guild_cached(&ctx.cache)
        .ok_or_else(|| anyhow!("Guild not found in cache"))?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or_else(|| anyhow!("You need to be in a voice channel"))
}
