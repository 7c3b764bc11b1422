use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::time::Duration;

use crate::sources::ResolvedTrack;

/// Who asked for a track, kept for the now-playing footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requestor {
    pub id: UserId,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// A queued track. `stream_url` is only the link seen at request time: the
/// playback loop resolves a fresh one every time the track starts.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub title: String,
    pub requestor: Requestor,
    pub requested_at: DateTime<Utc>,
    pub uploader: Option<String>,
    pub url: String,
    pub stream_url: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<Duration>,
}

impl TrackInfo {
    pub fn new(resolved: ResolvedTrack, requestor: Requestor) -> Self {
        Self {
            title: resolved.title,
            requestor,
            requested_at: Utc::now(),
            uploader: resolved.uploader,
            url: resolved.url,
            stream_url: resolved.stream_url,
            thumbnail: resolved.thumbnail,
            duration: resolved.duration,
        }
    }
}
