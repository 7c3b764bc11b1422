//! # Voice
//!
//! The voice transport the player streams into. [`VoiceGateway`] joins a
//! channel and hands back a [`VoiceConnection`] that accepts encoded Opus
//! packets, one per 20 ms frame.

pub mod dca;
pub mod songbird_call;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;

pub use songbird_call::SongbirdGateway;

#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Arc<dyn VoiceConnection>>;
}

#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Marks the start or end of a continuous run of frames.
    async fn set_speaking(&self, speaking: bool) -> Result<()>;

    /// Queues one encoded frame. May wait while the transport catches up,
    /// which is what paces the producer.
    async fn send_frame(&self, packet: Bytes) -> Result<()>;

    async fn leave(&self) -> Result<()>;
}
