use serenity::model::id::{ChannelId, GuildId};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    audio::{
        cancel::CancelSlot,
        error::PlayerError,
        events::PlayerEvent,
        frame::MAX_VOLUME,
        queue::TrackQueue,
        track::{Requestor, TrackInfo},
        transcode::Transcoder,
    },
    sources::MetadataResolver,
    voice::{VoiceConnection, VoiceGateway},
};

const EVENT_CAPACITY: usize = 64;

/// External collaborators shared by every guild player.
#[derive(Clone)]
pub struct PlayerServices {
    pub voice: Arc<dyn VoiceGateway>,
    pub resolver: Arc<dyn MetadataResolver>,
    pub transcoder: Arc<dyn Transcoder>,
    pub events: broadcast::Sender<PlayerEvent>,
}

impl PlayerServices {
    pub fn new(
        voice: Arc<dyn VoiceGateway>,
        resolver: Arc<dyn MetadataResolver>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            voice,
            resolver,
            transcoder,
            events,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerSettings {
    pub default_volume: u32,
    /// Playback loop tick.
    pub tick: Duration,
    /// Consecutive empty-queue ticks before the player leaves voice.
    pub idle_ticks: u32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            default_volume: 50,
            tick: Duration::from_secs(3),
            idle_ticks: 10,
        }
    }
}

/// State guarded by the player mutex.
///
/// `stop` is armed exactly while a session exists, from a successful join
/// until the loop has torn it down. `skip` is armed only while the head of the
/// queue is being streamed, and is a child of `stop`.
#[derive(Default)]
pub(super) struct PlayerState {
    pub(super) connection: Option<Arc<dyn VoiceConnection>>,
    pub(super) text_channel: Option<ChannelId>,
    pub(super) queue: TrackQueue,
    pub(super) stop: CancelSlot,
    pub(super) skip: CancelSlot,
}

/// Playback state for one guild.
///
/// Volume and replay live outside the mutex in atomics; the playback loop
/// reads them once per frame and once per track respectively.
pub struct GuildPlayer {
    pub(super) guild_id: GuildId,
    pub(super) services: PlayerServices,
    pub(super) settings: PlayerSettings,
    pub(super) volume: AtomicU32,
    pub(super) replay: AtomicBool,
    /// Set while `connect` waits on the voice gateway.
    joining: AtomicBool,
    pub(super) state: Mutex<PlayerState>,
}

/// Clears the joining flag when `connect` returns or is dropped.
struct JoiningGuard<'a>(&'a AtomicBool);

impl Drop for JoiningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl GuildPlayer {
    pub fn new(guild_id: GuildId, services: PlayerServices, settings: PlayerSettings) -> Self {
        Self {
            guild_id,
            services,
            settings,
            volume: AtomicU32::new(settings.default_volume.min(MAX_VOLUME)),
            replay: AtomicBool::new(false),
            joining: AtomicBool::new(false),
            state: Mutex::new(PlayerState::default()),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Joins `voice_channel` and starts the playback loop in the background.
    ///
    /// Returns as soon as the join succeeds. Fails with
    /// [`PlayerError::AlreadyConnected`] while another join is in flight or a
    /// previous session is still connected or tearing down. The guild lock is
    /// not held during the join, so the player reads as disconnected until it
    /// completes.
    pub async fn connect(
        self: &Arc<Self>,
        voice_channel: ChannelId,
        text_channel: ChannelId,
    ) -> Result<(), PlayerError> {
        if self.joining.swap(true, Ordering::AcqRel) {
            return Err(PlayerError::AlreadyConnected);
        }
        let _joining = JoiningGuard(&self.joining);

        if self.state.lock().await.stop.is_armed() {
            return Err(PlayerError::AlreadyConnected);
        }

        let connection = self
            .services
            .voice
            .join(self.guild_id, voice_channel)
            .await
            .map_err(|e| PlayerError::VoiceJoinFailed(e.to_string()))?;

        // Only a joining `connect` arms stop, so the slot is still empty here.
        let mut state = self.state.lock().await;
        let stop = CancellationToken::new();
        state.connection = Some(connection);
        state.text_channel = Some(text_channel);
        state.stop.arm(stop.clone());
        drop(state);

        tokio::spawn(Arc::clone(self).run(stop));
        info!(guild_id = %self.guild_id, "🔌 Connected to voice channel {}", voice_channel);
        Ok(())
    }

    /// Asks the playback loop to tear the session down. Does not wait for it.
    pub async fn disconnect(&self) -> Result<(), PlayerError> {
        let state = self.state.lock().await;
        if !state.stop.is_live() {
            return Err(PlayerError::NotConnected);
        }

        // The skip token is a child of stop, so an in-flight stream ends too.
        state.stop.fire();
        debug!(guild_id = %self.guild_id, "Disconnect requested");
        Ok(())
    }

    /// Resolves `query` and appends the result to the queue.
    pub async fn add_to_queue(&self, requestor: Requestor, query: &str) -> Result<TrackInfo, PlayerError> {
        if !self.is_connected().await {
            return Err(PlayerError::NotConnected);
        }

        // Resolution runs without the lock so other commands are not held up.
        let resolved = self
            .services
            .resolver
            .resolve(query)
            .await
            .map_err(|e| PlayerError::ResolutionFailed(e.to_string()))?;
        let track = TrackInfo::new(resolved, requestor);

        let mut state = self.state.lock().await;
        if !state.stop.is_live() {
            return Err(PlayerError::NotConnected);
        }
        state.queue.push(track.clone());
        info!(
            guild_id = %self.guild_id,
            user_id = %track.requestor.id,
            "➕ Added to queue: {}",
            track.title
        );
        Ok(track)
    }

    /// Skips `amount` tracks, counting the one currently playing, and returns
    /// how many were actually skipped.
    pub async fn skip_queue(&self, amount: usize) -> Result<usize, PlayerError> {
        let mut state = self.state.lock().await;
        if !state.stop.is_live() {
            return Err(PlayerError::NotConnected);
        }
        if state.queue.is_empty() {
            return Err(PlayerError::QueueEmpty);
        }
        if self.is_replay_active() {
            return Err(PlayerError::ReplayActiveConflict);
        }
        if amount == 0 {
            return Ok(0);
        }

        let skipped = if state.skip.is_armed() && !state.skip.is_live() {
            // The head was skipped already and is about to be popped.
            state.queue.skip_after_head(amount)
        } else {
            let streaming = state.skip.is_armed();
            state.skip.fire();
            state.queue.skip(amount, streaming)
        };
        info!(guild_id = %self.guild_id, "⏭️ Skipped {} tracks", skipped);
        Ok(skipped)
    }

    /// Snapshot of the queue, head first.
    pub async fn queue(&self) -> Result<Vec<TrackInfo>, PlayerError> {
        let state = self.state.lock().await;
        if !state.stop.is_live() {
            return Err(PlayerError::NotConnected);
        }
        Ok(state.queue.snapshot())
    }

    /// Flips replay mode and returns the new value.
    pub fn toggle_replay_mode(&self) -> bool {
        let active = !self.replay.fetch_xor(true, Ordering::AcqRel);
        info!(guild_id = %self.guild_id, "🔂 Replay mode {}", if active { "enabled" } else { "disabled" });
        active
    }

    pub fn set_volume(&self, percent: u32) -> Result<(), PlayerError> {
        if percent > MAX_VOLUME {
            return Err(PlayerError::InvalidVolume(percent));
        }
        self.volume.store(percent, Ordering::Release);
        info!(guild_id = %self.guild_id, "🔊 Volume set to {}%", percent);
        Ok(())
    }

    pub fn volume(&self) -> u32 {
        self.volume.load(Ordering::Acquire)
    }

    pub fn is_replay_active(&self) -> bool {
        self.replay.load(Ordering::Acquire)
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.stop.is_live()
    }

    /// Channel that receives now-playing messages for the current session.
    pub async fn text_channel(&self) -> Option<ChannelId> {
        self.state.lock().await.text_channel
    }

    pub(super) fn publish(&self, event: PlayerEvent) {
        // No subscribers is fine.
        let _ = self.services.events.send(event);
    }
}
