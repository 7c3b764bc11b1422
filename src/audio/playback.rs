//! The per-guild playback loop and its streaming pipeline.
//!
//! ```text
//!            tick, queue empty (idle < limit)
//!          ┌──────────────┐
//!          ▼              │
//!   WaitingForQueue ──────┘ ── tick, head available ──► Streaming
//!          │   ▲                                           │
//!          │   └──── finished / skipped / failed ──────────┘
//!          │
//!          └── stop fired or idle limit reached ──► Draining ──► exit
//! ```
//!
//! The head of the queue is popped here once it has been streamed. Commands
//! only enqueue, fire the skip and stop tokens, or flip the volume and replay
//! atomics; a skip removes the head directly only while nothing is streaming.

use bytes::Bytes;
use serenity::model::id::ChannelId;
use std::sync::{atomic::Ordering, Arc};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    audio::{
        encoder::FrameEncoder,
        error::PlayerError,
        events::{DisconnectReason, PlayerEvent, TrackOutcome},
        frame::{PcmFrame, FRAME_BYTES},
        player::GuildPlayer,
        track::TrackInfo,
        transcode::{FrameRead, PcmStream},
    },
    voice::VoiceConnection,
};

/// Everything one streamed track needs, captured under the lock.
struct TrackJob {
    track: TrackInfo,
    connection: Arc<dyn VoiceConnection>,
    text_channel: Option<ChannelId>,
    skip: CancellationToken,
}

impl GuildPlayer {
    pub(super) async fn run(self: Arc<Self>, stop: CancellationToken) {
        let tick = self.settings.tick;
        let mut ticker = time::interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut idle_ticks = 0;

        let reason = loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break DisconnectReason::Requested,
                _ = ticker.tick() => {}
            }

            let Some(job) = self.next_job(&stop).await else {
                idle_ticks += 1;
                if idle_ticks >= self.settings.idle_ticks {
                    info!(guild_id = %self.guild_id, "💤 Idle for {} ticks", idle_ticks);
                    break DisconnectReason::Idle;
                }
                continue;
            };
            idle_ticks = 0;

            let outcome = self.play(&job).await;
            self.finish(job, outcome).await;
        };

        self.drain(reason).await;
    }

    /// Takes the head of the queue and arms a fresh skip token for it.
    async fn next_job(&self, stop: &CancellationToken) -> Option<TrackJob> {
        let mut state = self.state.lock().await;
        let track = state.queue.head()?.clone();
        let connection = state.connection.clone()?;

        let skip = stop.child_token();
        state.skip.arm(skip.clone());

        Some(TrackJob {
            track,
            connection,
            text_channel: state.text_channel,
            skip,
        })
    }

    async fn play(&self, job: &TrackJob) -> TrackOutcome {
        let outcome = match self.stream(job).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(guild_id = %self.guild_id, "Abandoning '{}': {}", job.track.title, e);
                TrackOutcome::Failed
            }
        };

        debug!(guild_id = %self.guild_id, "Track '{}' ended: {:?}", job.track.title, outcome);
        self.publish(PlayerEvent::TrackEnded {
            guild_id: self.guild_id,
            text_channel: job.text_channel,
            track: job.track.clone(),
            outcome,
        });
        outcome
    }

    async fn stream(&self, job: &TrackJob) -> Result<TrackOutcome, PlayerError> {
        let url = tokio::select! {
            biased;
            _ = job.skip.cancelled() => return Ok(TrackOutcome::Skipped),
            url = self.stream_url(&job.track) => url?,
        };

        let mut pcm = tokio::select! {
            biased;
            _ = job.skip.cancelled() => return Ok(TrackOutcome::Skipped),
            pcm = self.services.transcoder.open(&url) => pcm?,
        };

        info!(guild_id = %self.guild_id, "🎵 Now playing: {}", job.track.title);
        self.publish(PlayerEvent::TrackStarted {
            guild_id: self.guild_id,
            text_channel: job.text_channel,
            track: job.track.clone(),
        });

        let result = self.pump(&mut pcm, job).await;
        pcm.close().await;
        result
    }

    /// Streaming links expire, so every play asks the resolver again.
    async fn stream_url(&self, track: &TrackInfo) -> Result<String, PlayerError> {
        self.services
            .resolver
            .stream_url(&track.url)
            .await
            .map_err(|e| PlayerError::ResolutionFailed(e.to_string()))
    }

    async fn pump(&self, pcm: &mut PcmStream, job: &TrackJob) -> Result<TrackOutcome, PlayerError> {
        let mut encoder = FrameEncoder::new()?;

        if let Err(e) = job.connection.set_speaking(true).await {
            warn!(guild_id = %self.guild_id, "Failed to start speaking: {}", e);
        }
        let result = self.pump_frames(pcm, &mut encoder, job).await;
        if let Err(e) = job.connection.set_speaking(false).await {
            warn!(guild_id = %self.guild_id, "Failed to stop speaking: {}", e);
        }
        result
    }

    async fn pump_frames(
        &self,
        pcm: &mut PcmStream,
        encoder: &mut FrameEncoder,
        job: &TrackJob,
    ) -> Result<TrackOutcome, PlayerError> {
        let mut bytes = [0u8; FRAME_BYTES];

        loop {
            let read = tokio::select! {
                biased;
                _ = job.skip.cancelled() => return Ok(TrackOutcome::Skipped),
                read = pcm.read_frame(&mut bytes) => read?,
            };

            let (mut frame, last) = match read {
                FrameRead::Eof => return Ok(TrackOutcome::Finished),
                FrameRead::Full => (PcmFrame::from_le_bytes(&bytes), false),
                FrameRead::Partial(n) => (PcmFrame::from_partial_le_bytes(&bytes[..n]), true),
            };

            frame.apply_volume(self.volume.load(Ordering::Acquire));
            let packet = encoder.encode(&frame)?;

            tokio::select! {
                biased;
                _ = job.skip.cancelled() => return Ok(TrackOutcome::Skipped),
                sent = self.send(job, packet) => sent?,
            }

            if last {
                return Ok(TrackOutcome::Finished);
            }
        }
    }

    async fn send(&self, job: &TrackJob, packet: Bytes) -> Result<(), PlayerError> {
        job.connection
            .send_frame(packet)
            .await
            .map_err(|e| PlayerError::VoiceSendFailed(e.to_string()))
    }

    /// Disarms the skip token and advances the queue.
    ///
    /// Only a track that played to the end is kept for replay. A skipped one
    /// was already counted by `skip_queue`, and a failed one would be retried
    /// on every tick.
    async fn finish(&self, job: TrackJob, outcome: TrackOutcome) {
        let mut state = self.state.lock().await;
        state.skip.take();

        let replay = outcome == TrackOutcome::Finished && self.is_replay_active();
        if replay {
            debug!(guild_id = %self.guild_id, "🔂 Replaying {}", job.track.title);
        }
        state.queue.advance(replay);
    }

    /// Tears the session down.
    ///
    /// The stop token is fired before voice is left, so every operation sees
    /// `NotConnected` without waiting on the gateway. The stop slot is cleared
    /// last, which is what makes the player available to `connect` again.
    async fn drain(&self, reason: DisconnectReason) {
        let mut state = self.state.lock().await;
        state.skip.fire();
        state.skip.take();
        state.queue.clear();
        let text_channel = state.text_channel.take();
        let connection = state.connection.take();
        state.stop.fire();
        drop(state);

        if let Some(connection) = connection {
            if let Err(e) = connection.leave().await {
                warn!(guild_id = %self.guild_id, "Failed to leave voice cleanly: {}", e);
            }
        }

        self.state.lock().await.stop.take();

        info!(guild_id = %self.guild_id, "⏹️ Disconnected ({:?})", reason);
        self.publish(PlayerEvent::Disconnected {
            guild_id: self.guild_id,
            text_channel,
            reason,
        });
    }
}
