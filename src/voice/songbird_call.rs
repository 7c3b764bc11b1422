use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{AudioStream, Input, LiveInput},
    tracks::TrackHandle,
    Call, Songbird,
};
use std::sync::Arc;
use symphonia::core::{io::MediaSource, probe::Hint};
use tracing::{debug, info, warn};

use super::{dca::DcaFrameSource, VoiceConnection, VoiceGateway};

/// Joins voice channels through the songbird manager registered on the client.
pub struct SongbirdGateway {
    manager: Arc<Songbird>,
    buffer_frames: usize,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>, buffer_frames: usize) -> Self {
        Self {
            manager,
            buffer_frames: buffer_frames.max(1),
        }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Arc<dyn VoiceConnection>> {
        let call = self.manager.join(guild_id, channel_id).await?;
        info!("🔊 Joined voice channel {} in guild {}", channel_id, guild_id);

        Ok(Arc::new(SongbirdConnection {
            guild_id,
            manager: self.manager.clone(),
            call,
            buffer_frames: self.buffer_frames,
            sink: Mutex::new(None),
        }))
    }
}

/// One songbird track per run of frames, fed through a bounded channel.
struct ActiveSink {
    packets: flume::Sender<Bytes>,
    track: TrackHandle,
}

pub struct SongbirdConnection {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    call: Arc<tokio::sync::Mutex<Call>>,
    buffer_frames: usize,
    sink: Mutex<Option<ActiveSink>>,
}

impl SongbirdConnection {
    fn live_input(packets: flume::Receiver<Bytes>) -> Input {
        let mut hint = Hint::new();
        hint.with_extension("dca");

        let source: Box<dyn MediaSource> = Box::new(DcaFrameSource::new(packets));
        Input::Live(
            LiveInput::Raw(AudioStream {
                input: source,
                hint: Some(hint),
            }),
            None,
        )
    }

    fn close_sink(&self) -> Option<ActiveSink> {
        self.sink.lock().take()
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn set_speaking(&self, speaking: bool) -> Result<()> {
        if !speaking {
            // Dropping the sender lets the track drain what is buffered and end.
            if self.close_sink().is_some() {
                debug!("Voice stream closed in guild {}", self.guild_id);
            }
            return Ok(());
        }

        let (packets, receiver) = flume::bounded(self.buffer_frames);
        let track = self.call.lock().await.play_only_input(Self::live_input(receiver));

        if let Some(previous) = self.sink.lock().replace(ActiveSink { packets, track }) {
            let _ = previous.track.stop();
        }
        debug!("Voice stream opened in guild {}", self.guild_id);
        Ok(())
    }

    async fn send_frame(&self, packet: Bytes) -> Result<()> {
        let packets = self
            .sink
            .lock()
            .as_ref()
            .map(|sink| sink.packets.clone())
            .ok_or_else(|| anyhow!("no open voice stream"))?;

        packets
            .send_async(packet)
            .await
            .map_err(|_| anyhow!("voice stream was closed by the driver"))
    }

    async fn leave(&self) -> Result<()> {
        if let Some(sink) = self.close_sink() {
            let _ = sink.track.stop();
        }

        if let Err(e) = self.manager.remove(self.guild_id).await {
            warn!("Failed to leave voice in guild {}: {:?}", self.guild_id, e);
            return Err(e.into());
        }

        info!("👋 Left voice channel in guild {}", self.guild_id);
        Ok(())
    }
}
