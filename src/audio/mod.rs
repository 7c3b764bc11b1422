//! # Audio
//!
//! Per-guild playback: a FIFO of tracks, a background loop that streams the
//! head of the queue, and the pipeline that turns a source URL into Opus
//! frames for the voice transport.
//!
//! ## Pipeline
//!
//! ```text
//! yt-dlp (stream URL) ─► ffmpeg (s16le, 48 kHz, stereo) ─► 3840-byte frames
//!     ─► volume (saturating) ─► Opus encoder ─► voice connection
//! ```
//!
//! ## Concurrency
//!
//! Each [`player::GuildPlayer`] owns one mutex guarding its connection,
//! queue and cancellation tokens. Volume and replay mode are atomics. The
//! playback loop runs as one task per connected guild and is the only code
//! that advances the queue head or tears a session down.
//!
//! ## Example
//!
//! ```rust,ignore
//! let players = PlayerRegistry::new(services, PlayerSettings::default());
//! let player = players.get_or_create(guild_id);
//!
//! player.connect(voice_channel, text_channel).await?;
//! player.add_to_queue(requestor, "lofi hip hop").await?;
//! player.set_volume(80)?;
//! player.skip_queue(1).await?;
//! player.disconnect().await?;
//! ```

pub mod cancel;
pub mod encoder;
pub mod error;
pub mod events;
pub mod frame;
mod playback;
pub mod player;
pub mod queue;
pub mod registry;
pub mod track;
pub mod transcode;

#[cfg(test)]
pub(crate) mod testing;

pub use error::PlayerError;
pub use events::{DisconnectReason, PlayerEvent, TrackOutcome};
pub use player::{GuildPlayer, PlayerServices, PlayerSettings};
pub use registry::PlayerRegistry;
pub use track::{Requestor, TrackInfo};
