//! Scripted collaborators for player tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use audiopus::{coder::Decoder, packet::Packet, Channels, MutSignals, SampleRate};
use bytes::Bytes;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{
    pin::Pin,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    task::{Context, Poll},
    time::Duration,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, ReadBuf},
    sync::broadcast,
};

use crate::{
    audio::{
        error::PlayerError,
        events::PlayerEvent,
        frame::{FRAME_BYTES, FRAME_SAMPLES},
        player::{GuildPlayer, PlayerServices, PlayerSettings},
        track::Requestor,
        transcode::{PcmStream, Transcoder},
    },
    sources::{MockMetadataResolver, ResolvedTrack},
    voice::{VoiceConnection, VoiceGateway},
};

const FRAME_PERIOD: Duration = Duration::from_millis(20);

#[derive(Default)]
pub struct FakeVoice {
    pub fail_join: AtomicBool,
    pub join_delay: Mutex<Duration>,
    pub joins: AtomicUsize,
    pub connection: Arc<FakeConnection>,
}

#[async_trait]
impl VoiceGateway for FakeVoice {
    async fn join(&self, _guild_id: GuildId, _channel_id: ChannelId) -> Result<Arc<dyn VoiceConnection>> {
        let delay = *self.join_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_join.load(Ordering::SeqCst) {
            bail!("channel is full");
        }
        self.joins.fetch_add(1, Ordering::SeqCst);
        Ok(self.connection.clone())
    }
}

/// Accepts frames at real-time pace and keeps every packet it was sent.
#[derive(Default)]
pub struct FakeConnection {
    pub frames: AtomicUsize,
    pub packets: Mutex<Vec<Bytes>>,
    pub leaves: AtomicUsize,
    pub leave_delay: Mutex<Duration>,
    pub speaking: AtomicBool,
}

impl FakeConnection {
    /// Decodes the packets received so far and returns the peak of each.
    pub fn decoded_peaks(&self) -> Vec<u16> {
        let mut decoder = Decoder::new(SampleRate::Hz48000, Channels::Stereo).expect("opus decoder");
        let mut pcm = vec![0i16; FRAME_SAMPLES * 3];

        self.packets
            .lock()
            .iter()
            .map(|packet| {
                let packet = Packet::try_from(&packet[..]).expect("opus packet");
                let output = MutSignals::try_from(&mut pcm[..]).expect("pcm buffer");
                let per_channel = decoder.decode(Some(packet), output, false).expect("decode");
                pcm[..per_channel * 2]
                    .iter()
                    .map(|s| s.unsigned_abs())
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    async fn set_speaking(&self, speaking: bool) -> Result<()> {
        self.speaking.store(speaking, Ordering::SeqCst);
        Ok(())
    }

    async fn send_frame(&self, packet: Bytes) -> Result<()> {
        tokio::time::sleep(FRAME_PERIOD).await;
        self.packets.lock().push(packet);
        self.frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn leave(&self) -> Result<()> {
        let delay = *self.leave_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.leaves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Produces PCM, either forever or for a fixed number of frames. Silent unless
/// built with [`FakeTranscoder::tone`].
pub struct FakeTranscoder {
    frames: Option<usize>,
    tone: bool,
    failing: Vec<String>,
    pub opened: Mutex<Vec<String>>,
    pub closed: Arc<AtomicUsize>,
}

impl FakeTranscoder {
    pub fn endless() -> Self {
        Self {
            frames: None,
            tone: false,
            failing: Vec::new(),
            opened: Mutex::new(Vec::new()),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn finite(frames: usize) -> Self {
        Self {
            frames: Some(frames),
            ..Self::endless()
        }
    }

    /// An endless 1 kHz square wave.
    pub fn tone() -> Self {
        Self {
            tone: true,
            ..Self::endless()
        }
    }

    pub fn failing_on(mut self, url: &str) -> Self {
        self.failing.push(url.to_string());
        self
    }

    pub fn opened_count(&self) -> usize {
        self.opened.lock().len()
    }

    pub fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn open(&self, url: &str) -> Result<PcmStream, PlayerError> {
        self.opened.lock().push(url.to_string());
        if self.failing.iter().any(|u| u == url) {
            return Err(PlayerError::TranscodeStartFailed("no such stream".to_string()));
        }

        let source: Box<dyn AsyncRead + Send + Unpin> = if self.tone {
            Box::new(SquareWave::default())
        } else {
            Box::new(tokio::io::repeat(0))
        };
        let inner: Box<dyn AsyncRead + Send + Unpin> = match self.frames {
            None => source,
            Some(n) => Box::new(source.take((n * FRAME_BYTES) as u64)),
        };
        Ok(PcmStream::from_reader(CountingReader {
            inner,
            closed: self.closed.clone(),
        }))
    }
}

/// Stereo s16le square wave, 24 samples high then 24 low.
#[derive(Default)]
struct SquareWave {
    position: usize,
}

impl SquareWave {
    const AMPLITUDE: i16 = 10_000;

    fn byte_at(position: usize) -> u8 {
        let sample_frame = position / 4;
        let sample = if (sample_frame / 24) % 2 == 0 {
            Self::AMPLITUDE
        } else {
            -Self::AMPLITUDE
        };
        sample.to_le_bytes()[position % 2]
    }
}

impl AsyncRead for SquareWave {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let start = self.position;
        let bytes: Vec<u8> = (start..start + buf.remaining()).map(Self::byte_at).collect();
        buf.put_slice(&bytes);
        self.position += bytes.len();
        Poll::Ready(Ok(()))
    }
}

/// Counts how many pipes were dropped.
struct CountingReader {
    inner: Box<dyn AsyncRead + Send + Unpin>,
    closed: Arc<AtomicUsize>,
}

impl AsyncRead for CountingReader {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl Drop for CountingReader {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn media_url(title: &str) -> String {
    format!("https://media.example/{title}")
}

pub fn stream_url(title: &str) -> String {
    format!("stream:{}", media_url(title))
}

pub fn resolved(title: &str) -> ResolvedTrack {
    ResolvedTrack {
        title: title.to_string(),
        uploader: Some("uploader".to_string()),
        url: media_url(title),
        stream_url: None,
        thumbnail: None,
        duration: Some(Duration::from_secs(180)),
    }
}

/// A resolver that echoes the query as the title.
pub fn echo_resolver() -> MockMetadataResolver {
    let mut resolver = MockMetadataResolver::new();
    resolver.expect_resolve().returning(|query| Ok(resolved(query)));
    resolver
        .expect_stream_url()
        .returning(|url| Ok(format!("stream:{url}")));
    resolver
}

pub fn requestor() -> Requestor {
    Requestor {
        id: UserId::new(42),
        name: "listener".to_string(),
        avatar_url: None,
    }
}

pub struct Harness {
    pub player: Arc<GuildPlayer>,
    pub voice: Arc<FakeVoice>,
    pub transcoder: Arc<FakeTranscoder>,
    pub events: broadcast::Receiver<PlayerEvent>,
}

impl Harness {
    pub fn new(resolver: MockMetadataResolver, transcoder: FakeTranscoder) -> Self {
        let voice = Arc::new(FakeVoice::default());
        let transcoder = Arc::new(transcoder);
        let services = PlayerServices::new(voice.clone(), Arc::new(resolver), transcoder.clone());
        let events = services.events.subscribe();
        let player = Arc::new(GuildPlayer::new(GuildId::new(1), services, PlayerSettings::default()));

        Self {
            player,
            voice,
            transcoder,
            events,
        }
    }

    pub async fn connect(&self) {
        self.player
            .connect(ChannelId::new(10), ChannelId::new(20))
            .await
            .expect("connect");
    }

    pub async fn add(&self, title: &str) {
        self.player.add_to_queue(requestor(), title).await.expect("add_to_queue");
    }

    pub async fn titles(&self) -> Vec<String> {
        self.player
            .queue()
            .await
            .expect("queue")
            .into_iter()
            .map(|track| track.title)
            .collect()
    }

    /// Starts `connect` on a background task.
    pub fn connect_in_background(&self) -> tokio::task::JoinHandle<Result<(), PlayerError>> {
        let player = self.player.clone();
        tokio::spawn(async move { player.connect(ChannelId::new(10), ChannelId::new(20)).await })
    }

    pub fn leaves(&self) -> usize {
        self.voice.connection.leaves.load(Ordering::SeqCst)
    }

    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
