use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod sources;
mod ui;
mod voice;

use crate::audio::{transcode::FfmpegTranscoder, PlayerRegistry, PlayerServices};
use crate::bot::MusicBot;
use crate::config::Config;
use crate::sources::YtDlpResolver;
use crate::voice::SongbirdGateway;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_player=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting guild-player v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    info!("{}", config.summary());

    // Only guild metadata and voice states are needed
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let songbird = Songbird::serenity();
    let services = PlayerServices::new(
        Arc::new(SongbirdGateway::new(songbird.clone(), config.voice_buffer_frames)),
        Arc::new(YtDlpResolver::new(&config.ytdlp_path)),
        Arc::new(FfmpegTranscoder::new(&config.ffmpeg_path)),
    );
    let players = Arc::new(PlayerRegistry::new(services, config.player_settings()));

    let handler = MusicBot::new(config.clone(), players);
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Graceful shutdown
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, closing...");
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    let ffmpeg = FfmpegTranscoder::new(&config.ffmpeg_path).verify().await?;
    let yt_dlp = YtDlpResolver::new(&config.ytdlp_path).verify().await?;

    info!("ffmpeg: {}", ffmpeg);
    info!("yt-dlp: {}", yt_dlp);
    println!("OK");
    Ok(())
}
