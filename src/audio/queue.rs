use std::collections::VecDeque;
use tracing::debug;

use crate::audio::track::TrackInfo;

/// FIFO of tracks. The head is the track currently streaming, or the next one
/// the playback loop will pick up.
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: VecDeque<TrackInfo>,
}

impl TrackQueue {
    pub fn push(&mut self, track: TrackInfo) {
        debug!("➕ Queued: {}", track.title);
        self.items.push_back(track);
    }

    pub fn head(&self) -> Option<&TrackInfo> {
        self.items.front()
    }

    /// Drops the head once it has been played. With replay active the head
    /// stays so the loop selects it again.
    pub fn advance(&mut self, replay: bool) -> Option<TrackInfo> {
        if replay {
            return None;
        }
        self.items.pop_front()
    }

    /// Removes up to `amount` tracks counting the head, and returns how many
    /// were skipped. When the head is streaming it is left in place: the
    /// playback loop pops it after the cancelled stream unwinds.
    pub fn skip(&mut self, amount: usize, head_streaming: bool) -> usize {
        let skipped = amount.min(self.items.len());
        let start = usize::from(head_streaming);
        if skipped > start {
            self.items.drain(start..skipped);
        }
        skipped
    }

    /// Like [`skip`](Self::skip) for a head that is already being skipped:
    /// only tracks after it are removed and counted.
    pub fn skip_after_head(&mut self, amount: usize) -> usize {
        let skipped = amount.min(self.items.len().saturating_sub(1));
        if skipped > 0 {
            self.items.drain(1..=skipped);
        }
        skipped
    }

    pub fn clear(&mut self) {
        if !self.items.is_empty() {
            debug!("🗑️ Cleared {} queued tracks", self.items.len());
        }
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn snapshot(&self) -> Vec<TrackInfo> {
        self.items.iter().cloned().collect()
    }
}
