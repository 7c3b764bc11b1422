//! Frames Opus packets as a DCA stream so songbird can pass them through
//! without decoding.
//!
//! Layout: `DCA1`, an i32 LE metadata length, JSON metadata, then each packet
//! prefixed by its i16 LE length.

use bytes::Bytes;
use serde_json::json;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use symphonia::core::io::MediaSource;

use crate::audio::frame::{CHANNELS, SAMPLES_PER_CHANNEL, SAMPLE_RATE};

const MAGIC: &[u8; 4] = b"DCA1";

/// Blocking reader over a channel of packets. Ends once every sender is gone.
pub struct DcaFrameSource {
    pending: Cursor<Vec<u8>>,
    packets: flume::Receiver<Bytes>,
}

impl DcaFrameSource {
    pub fn new(packets: flume::Receiver<Bytes>) -> Self {
        Self {
            pending: Cursor::new(header()),
            packets,
        }
    }
}

fn header() -> Vec<u8> {
    let metadata = json!({
        "dca": {
            "version": 1,
            "tool": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "url": null,
                "author": null,
            },
        },
        "opus": {
            "mode": "music",
            "sample_rate": SAMPLE_RATE,
            "frame_size": SAMPLES_PER_CHANNEL,
            "abr": null,
            "vbr": true,
            "channels": CHANNELS,
        },
        "info": null,
        "origin": null,
        "extra": null,
    })
    .to_string();

    let mut out = Vec::with_capacity(MAGIC.len() + 4 + metadata.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&(metadata.len() as i32).to_le_bytes());
    out.extend_from_slice(metadata.as_bytes());
    out
}

fn frame(packet: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(packet.len() + 2);
    out.extend_from_slice(&(packet.len() as i16).to_le_bytes());
    out.extend_from_slice(packet);
    out
}

impl Read for DcaFrameSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let n = self.pending.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            match self.packets.recv() {
                Ok(packet) => self.pending = Cursor::new(frame(&packet)),
                Err(flume::RecvError::Disconnected) => return Ok(0),
            }
        }
    }
}

impl Seek for DcaFrameSource {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "live voice stream is not seekable"))
    }
}

impl MediaSource for DcaFrameSource {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn writes_header_then_length_prefixed_packets() {
        let (tx, rx) = flume::unbounded();
        tx.send(Bytes::from_static(&[0xaa, 0xbb, 0xcc])).unwrap();
        tx.send(Bytes::from_static(&[0x01])).unwrap();
        drop(tx);

        let mut out = Vec::new();
        DcaFrameSource::new(rx).read_to_end(&mut out).unwrap();

        assert_eq!(&out[..4], b"DCA1");
        let meta_len = i32::from_le_bytes([out[4], out[5], out[6], out[7]]) as usize;
        let meta: serde_json::Value = serde_json::from_slice(&out[8..8 + meta_len]).unwrap();
        assert_eq!(meta["opus"]["sample_rate"], 48_000);
        assert_eq!(meta["opus"]["frame_size"], 960);
        assert_eq!(meta["opus"]["channels"], 2);

        assert_eq!(&out[8 + meta_len..], &[3, 0, 0xaa, 0xbb, 0xcc, 1, 0, 0x01]);
    }

    #[test]
    fn is_not_seekable() {
        let (_tx, rx) = flume::unbounded::<Bytes>();
        let mut source = DcaFrameSource::new(rx);
        assert!(!source.is_seekable());
        assert!(source.seek(SeekFrom::Start(0)).is_err());
    }
}
