use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::{path::PathBuf, time::Duration};
use tracing::{debug, info, warn};
use url::Url;

use super::{MetadataResolver, ResolvedTrack};

/// Resolver backed by the `yt-dlp` executable.
pub struct YtDlpResolver {
    binary: PathBuf,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Checks that the binary runs at all.
    pub async fn verify(&self) -> Result<String> {
        let stdout = self.run(&["--version"]).await?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }

    async fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
        let output = tokio::process::Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.binary.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .find(|line| line.starts_with("ERROR:"))
                .unwrap_or_else(|| stderr.trim());
            warn!("yt-dlp failed ({}): {}", output.status, reason);
            anyhow::bail!("yt-dlp failed: {}", reason);
        }

        Ok(output.stdout)
    }
}

/// Plain search terms go through YouTube search; URLs are passed as-is.
fn search_target(query: &str) -> String {
    let query = query.trim();
    match Url::parse(query) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => query.to_string(),
        _ => format!("ytsearch1:{}", query),
    }
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: Option<String>,
    uploader: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<Format>,
    /// Present when the result is a search or a playlist.
    entries: Option<Vec<VideoInfo>>,
}

#[derive(Debug, Deserialize)]
struct Format {
    url: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    abr: Option<f64>,
}

impl Format {
    fn is_audio_only(&self) -> bool {
        self.vcodec.as_deref() == Some("none") && self.acodec.as_deref().is_some_and(|c| c != "none")
    }
}

fn parse_info(json: &[u8]) -> Result<ResolvedTrack> {
    let mut info: VideoInfo = serde_json::from_slice(json).context("malformed yt-dlp output")?;

    if let Some(entries) = info.entries.take() {
        info = entries.into_iter().next().context("no results found")?;
    }

    let url = info
        .webpage_url
        .or(info.url)
        .context("result has no page URL")?;

    let stream_url = info
        .formats
        .into_iter()
        .filter(Format::is_audio_only)
        .filter(|f| f.url.is_some())
        .max_by(|a, b| a.abr.unwrap_or(0.0).total_cmp(&b.abr.unwrap_or(0.0)))
        .and_then(|f| f.url);

    Ok(ResolvedTrack {
        title: info.title.unwrap_or_else(|| "Unknown".to_string()),
        uploader: info.uploader,
        url,
        stream_url,
        thumbnail: info.thumbnail,
        duration: info
            .duration
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64),
    })
}

#[async_trait]
impl MetadataResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<ResolvedTrack> {
        let target = search_target(query);
        debug!("🔍 Resolving {}", target);

        let stdout = self
            .run(&[
                "-J",
                "--no-playlist",
                "--skip-download",
                "--no-cache-dir",
                "--quiet",
                "--no-warnings",
                target.as_str(),
            ])
            .await?;

        let track = parse_info(&stdout)?;
        info!("🔍 Resolved '{}' to {}", query, track.title);
        Ok(track)
    }

    async fn stream_url(&self, url: &str) -> Result<String> {
        let stdout = self
            .run(&[
                "--get-url",
                "--no-playlist",
                "--no-cache-dir",
                "--quiet",
                "--no-warnings",
                "-f",
                "bestaudio/best",
                url,
            ])
            .await?;

        String::from_utf8_lossy(&stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .context("yt-dlp returned no stream URL")
    }
}
