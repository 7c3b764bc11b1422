use audiopus::{coder::Encoder, Application, Channels, SampleRate};
use bytes::Bytes;

use crate::audio::{error::PlayerError, frame::PcmFrame};

/// Upper bound for one encoded 20 ms packet.
const MAX_PACKET_BYTES: usize = 4000;

/// Opus encoder for 48 kHz stereo 20 ms frames.
pub struct FrameEncoder {
    inner: Encoder,
    packet: Vec<u8>,
}

impl FrameEncoder {
    pub fn new() -> Result<Self, PlayerError> {
        let inner = Encoder::new(SampleRate::Hz48000, Channels::Stereo, Application::Audio)
            .map_err(|e| PlayerError::EncodeError(e.to_string()))?;

        Ok(Self {
            inner,
            packet: vec![0; MAX_PACKET_BYTES],
        })
    }

    pub fn encode(&mut self, frame: &PcmFrame) -> Result<Bytes, PlayerError> {
        let len = self
            .inner
            .encode(frame.samples(), &mut self.packet)
            .map_err(|e| PlayerError::EncodeError(e.to_string()))?;

        Ok(Bytes::copy_from_slice(&self.packet[..len]))
    }
}
