//! Fixed-size PCM frames and volume scaling.
//!
//! The transcoder emits interleaved stereo signed 16-bit little-endian PCM at
//! 48 kHz. The voice codec consumes it in 20 ms blocks: 960 samples per
//! channel, 1920 interleaved samples, 3840 bytes.

pub const SAMPLE_RATE: u32 = 48_000;
pub const CHANNELS: usize = 2;
pub const FRAME_MILLIS: usize = 20;
pub const SAMPLES_PER_CHANNEL: usize = SAMPLE_RATE as usize / 1000 * FRAME_MILLIS;
pub const FRAME_SAMPLES: usize = SAMPLES_PER_CHANNEL * CHANNELS;
pub const FRAME_BYTES: usize = FRAME_SAMPLES * 2;

/// Volume percentage at which samples pass through untouched.
pub const UNITY_VOLUME: u32 = 100;
pub const MAX_VOLUME: u32 = 300;

/// One 20 ms block of interleaved stereo samples.
#[derive(Clone, PartialEq, Eq)]
pub struct PcmFrame {
    samples: [i16; FRAME_SAMPLES],
}

impl PcmFrame {
    pub fn silent() -> Self {
        Self {
            samples: [0; FRAME_SAMPLES],
        }
    }

    /// Decodes a full frame of s16le bytes.
    pub fn from_le_bytes(bytes: &[u8; FRAME_BYTES]) -> Self {
        Self::from_partial_le_bytes(bytes)
    }

    /// Decodes up to one frame of s16le bytes; missing samples stay silent and
    /// a trailing odd byte is ignored.
    pub fn from_partial_le_bytes(bytes: &[u8]) -> Self {
        let mut frame = Self::silent();
        for (sample, pair) in frame.samples.iter_mut().zip(bytes.chunks_exact(2)) {
            *sample = i16::from_le_bytes([pair[0], pair[1]]);
        }
        frame
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn apply_volume(&mut self, percent: u32) {
        scale_samples(&mut self.samples, percent);
    }
}

impl std::fmt::Debug for PcmFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let peak = self.samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        f.debug_struct("PcmFrame").field("peak", &peak).finish()
    }
}

/// Multiplies every sample by `percent / 100`, saturating at the i16 range
/// instead of wrapping.
pub fn scale_samples(samples: &mut [i16], percent: u32) {
    if percent == UNITY_VOLUME {
        return;
    }
    for sample in samples.iter_mut() {
        *sample = scale_sample(*sample, percent);
    }
}

fn scale_sample(sample: i16, percent: u32) -> i16 {
    let scaled = i64::from(sample) * i64::from(percent) / i64::from(UNITY_VOLUME);
    scaled.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_geometry() {
        assert_eq!(SAMPLES_PER_CHANNEL, 960);
        assert_eq!(FRAME_SAMPLES, 1920);
        assert_eq!(FRAME_BYTES, 3840);
    }

    #[test]
    fn max_volume_saturates_instead_of_wrapping() {
        let mut samples = [i16::MAX; 8];
        scale_samples(&mut samples, MAX_VOLUME);
        assert!(samples.iter().all(|&s| s == i16::MAX));

        let mut samples = [i16::MIN; 8];
        scale_samples(&mut samples, MAX_VOLUME);
        assert!(samples.iter().all(|&s| s == i16::MIN));
    }

    #[test]
    fn zero_volume_is_exact_silence() {
        let mut frame = PcmFrame::from_le_bytes(&[0x7f; FRAME_BYTES]);
        frame.apply_volume(0);
        assert_eq!(frame, PcmFrame::silent());
    }

    #[test]
    fn unity_volume_is_passthrough() {
        let mut samples = [1234, -4321, i16::MAX, i16::MIN];
        scale_samples(&mut samples, UNITY_VOLUME);
        assert_eq!(samples, [1234, -4321, i16::MAX, i16::MIN]);
    }

    #[test]
    fn half_volume_halves_samples() {
        let mut samples = [1000, -1000, 3];
        scale_samples(&mut samples, 50);
        assert_eq!(samples, [500, -500, 1]);
    }

    #[test]
    fn decodes_little_endian_pairs() {
        let mut bytes = [0u8; FRAME_BYTES];
        bytes[..4].copy_from_slice(&[0x34, 0x12, 0xff, 0xff]);
        let frame = PcmFrame::from_le_bytes(&bytes);
        assert_eq!(&frame.samples()[..3], &[0x1234, -1, 0]);
    }

    #[test]
    fn partial_frame_is_padded_with_silence() {
        let frame = PcmFrame::from_partial_le_bytes(&[0x01, 0x00, 0x02, 0x00, 0x03]);
        assert_eq!(&frame.samples()[..3], &[1, 2, 0]);
        assert!(frame.samples()[2..].iter().all(|&s| s == 0));
    }
}
