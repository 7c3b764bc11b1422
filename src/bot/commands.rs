use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, channel::ChannelType, id::GuildId},
    prelude::Context,
};

use crate::audio::frame::MAX_VOLUME;

/// Registers global commands
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registers commands on a single guild (development)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        connect_command(),
        disconnect_command(),
        play_command(),
        skip_command(),
        replay_command(),
        volume_command(),
        queue_command(),
    ]
}

// Connection

fn connect_command() -> CreateCommand {
    CreateCommand::new("connect")
        .description("Join a voice channel")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Channel,
                "channel",
                "Voice channel to join (defaults to yours)",
            )
            .channel_types(vec![ChannelType::Voice, ChannelType::Stage]),
        )
}

fn disconnect_command() -> CreateCommand {
    CreateCommand::new("disconnect").description("Leave the voice channel and clear the queue")
}

// Playback

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Add a track to the queue")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "URL or search terms")
                .required(true),
        )
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip")
        .description("Skip the current track, and optionally more after it")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "number",
                "How many tracks to skip, counting the current one",
            )
            .min_int_value(1),
        )
}

fn replay_command() -> CreateCommand {
    CreateCommand::new("replay").description("Toggle repeating the current track")
}

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Set the playback volume")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "number",
                format!("Volume percent (0-{})", MAX_VOLUME),
            )
            .min_int_value(0)
            .max_int_value(u64::from(MAX_VOLUME))
            .required(true),
        )
}

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Show the queue")
}
