use thiserror::Error;

use crate::audio::frame::MAX_VOLUME;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    #[error("not connected to a voice channel")]
    NotConnected,
    #[error("already connected to a voice channel")]
    AlreadyConnected,
    #[error("failed to join the voice channel: {0}")]
    VoiceJoinFailed(String),
    #[error("could not resolve the track: {0}")]
    ResolutionFailed(String),
    #[error("failed to start the transcoder: {0}")]
    TranscodeStartFailed(String),
    #[error("failed reading the audio stream: {0}")]
    StreamReadError(String),
    #[error("failed to encode an audio frame: {0}")]
    EncodeError(String),
    #[error("failed to send an audio frame: {0}")]
    VoiceSendFailed(String),
    #[error("the queue is empty")]
    QueueEmpty,
    #[error("tracks can't be skipped while replay mode is active")]
    ReplayActiveConflict,
    #[error("volume must be between 0% and {max}%, got {0}%", max = MAX_VOLUME)]
    InvalidVolume(u32),
}
