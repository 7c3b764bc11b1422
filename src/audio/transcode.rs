//! ffmpeg subprocess that turns a source URL into raw PCM.

use async_trait::async_trait;
use std::{path::PathBuf, process::Stdio};
use tokio::{
    io::{AsyncRead, AsyncReadExt, BufReader},
    process::{Child, Command},
};
use tracing::{debug, warn};

use crate::audio::{
    error::PlayerError,
    frame::{CHANNELS, FRAME_BYTES, SAMPLE_RATE},
};

const PIPE_BUFFER_BYTES: usize = 16 * 1024;

/// Starts one PCM stream per played track.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn open(&self, url: &str) -> Result<PcmStream, PlayerError>;
}

/// Result of filling one frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRead {
    Full,
    /// The stream ended after this many bytes.
    Partial(usize),
    Eof,
}

/// Output pipe of a transcoder, plus the process behind it when there is one.
pub struct PcmStream {
    reader: BufReader<Box<dyn AsyncRead + Send + Unpin>>,
    child: Option<Child>,
}

impl PcmStream {
    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            reader: BufReader::with_capacity(PIPE_BUFFER_BYTES, Box::new(reader)),
            child: None,
        }
    }

    fn spawn(mut command: Command) -> Result<Self, PlayerError> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlayerError::TranscodeStartFailed(e.to_string()))?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.start_kill();
            return Err(PlayerError::TranscodeStartFailed(
                "transcoder stdout was not captured".to_string(),
            ));
        };

        let mut stream = Self::from_reader(stdout);
        stream.child = Some(child);
        Ok(stream)
    }

    /// Reads until `buf` is full or the stream ends.
    pub async fn read_frame(&mut self, buf: &mut [u8; FRAME_BYTES]) -> Result<FrameRead, PlayerError> {
        let mut filled = 0;
        while filled < FRAME_BYTES {
            match self.reader.read(&mut buf[filled..]).await {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(PlayerError::StreamReadError(e.to_string())),
            }
        }

        Ok(match filled {
            0 => FrameRead::Eof,
            FRAME_BYTES => FrameRead::Full,
            n => FrameRead::Partial(n),
        })
    }

    /// Closes the pipe, then kills and reaps the process.
    pub async fn close(self) {
        let Self { reader, child } = self;
        drop(reader);

        let Some(mut child) = child else {
            return;
        };

        // Fails only when the process already exited, which `wait` still reaps.
        if let Err(e) = child.start_kill() {
            debug!("Transcoder already exited: {}", e);
        }
        match child.wait().await {
            Ok(status) => debug!("Transcoder reaped ({})", status),
            Err(e) => warn!("Failed to reap transcoder: {}", e),
        }
    }
}

/// Runs `ffmpeg` with a fixed s16le / 48 kHz / stereo output on stdout.
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Runs `ffmpeg -version` and returns its first line.
    pub async fn verify(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.binary)
            .arg("-version")
            .kill_on_drop(true)
            .output()
            .await?;
        if !output.status.success() {
            anyhow::bail!("{} -version exited with {}", self.binary.display(), output.status);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().to_string())
    }

    fn args(url: &str) -> Vec<String> {
        let sample_rate = SAMPLE_RATE.to_string();
        let channels = CHANNELS.to_string();
        [
            "-reconnect", "1",
            "-reconnect_streamed", "1",
            "-reconnect_delay_max", "5",
            "-i", url,
            "-vn",
            "-f", "s16le",
            "-ar", sample_rate.as_str(),
            "-ac", channels.as_str(),
            "-loglevel", "warning",
            "pipe:1",
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect()
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn open(&self, url: &str) -> Result<PcmStream, PlayerError> {
        let mut command = Command::new(&self.binary);
        command.args(Self::args(url));
        let stream = PcmStream::spawn(command)?;
        debug!("🎛️ ffmpeg started for {}", url);
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn reads_full_partial_then_eof() {
        let data = vec![1u8; FRAME_BYTES * 2 + 100];
        let mut stream = PcmStream::from_reader(std::io::Cursor::new(data));
        let mut buf = [0u8; FRAME_BYTES];

        assert_eq!(stream.read_frame(&mut buf).await.unwrap(), FrameRead::Full);
        assert_eq!(stream.read_frame(&mut buf).await.unwrap(), FrameRead::Full);
        assert_eq!(stream.read_frame(&mut buf).await.unwrap(), FrameRead::Partial(100));
        assert_eq!(stream.read_frame(&mut buf).await.unwrap(), FrameRead::Eof);
        stream.close().await;
    }

    #[tokio::test]
    async fn empty_stream_ends_cleanly() {
        let mut stream = PcmStream::from_reader(tokio::io::empty());
        let mut buf = [0u8; FRAME_BYTES];
        assert_eq!(stream.read_frame(&mut buf).await.unwrap(), FrameRead::Eof);
    }

    #[tokio::test]
    async fn missing_binary_fails_to_start() {
        let transcoder = FfmpegTranscoder::new("/nonexistent/ffmpeg-for-tests");
        let result = transcoder.open("https://example.com/audio").await;
        assert!(matches!(result, Err(PlayerError::TranscodeStartFailed(_))));
    }

    #[test]
    fn requests_raw_stereo_pcm_on_stdout() {
        let args = FfmpegTranscoder::args("https://example.com/a.webm");
        let joined = args.join(" ");
        assert!(joined.contains("-i https://example.com/a.webm"));
        assert!(joined.contains("-f s16le -ar 48000 -ac 2"));
        assert!(joined.contains("-reconnect 1"));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
        let input = args.iter().position(|a| a == "-i").unwrap();
        let reconnect = args.iter().position(|a| a == "-reconnect").unwrap();
        assert!(reconnect < input);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn close_kills_and_reaps_a_running_process() {
        let mut command = Command::new("sh");
        command.args(["-c", "sleep 30"]);
        let stream = PcmStream::spawn(command).unwrap();

        tokio::time::timeout(Duration::from_secs(5), stream.close())
            .await
            .expect("close should not wait for the process to finish on its own");
    }
}
