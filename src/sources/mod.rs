//! # Sources
//!
//! Turns a user query (search terms or a URL) into track metadata, and a
//! track page into a short-lived streaming URL.

pub mod ytdlp;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

pub use ytdlp::YtDlpResolver;

/// Metadata for a single playable item.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrack {
    pub title: String,
    pub uploader: Option<String>,
    /// Canonical page URL, used later to resolve fresh stream links.
    pub url: String,
    pub stream_url: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<Duration>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Resolves search terms or a URL into one track.
    async fn resolve(&self, query: &str) -> Result<ResolvedTrack>;

    /// Resolves a direct audio URL for a track page. Links expire, so callers
    /// ask again every time playback starts.
    async fn stream_url(&self, url: &str) -> Result<String>;
}
