use serenity::{
    all::{Colour, Timestamp},
    builder::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::TrackInfo;

/// Discord rejects descriptions past 4096 characters.
const DESCRIPTION_LIMIT: usize = 4000;

const UNKNOWN: &str = "Unknown";

/// Standard colour palette for player embeds
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Embed for a single track.
pub fn track_embed(heading: &str, track: &TrackInfo) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .author(CreateEmbedAuthor::new(heading))
        .title(&track.title)
        .url(&track.url)
        .color(colors::MUSIC_PURPLE);

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed = embed
        .field("Uploader", track.uploader.as_deref().unwrap_or(UNKNOWN), true)
        .field("Length", format!("`{}`", format_length(track.duration)), true);

    let mut footer = CreateEmbedFooter::new(&track.requestor.name);
    if let Some(avatar) = &track.requestor.avatar_url {
        footer = footer.icon_url(avatar);
    }
    embed = embed.footer(footer);

    if let Ok(timestamp) = Timestamp::from_unix_timestamp(track.requested_at.timestamp()) {
        embed = embed.timestamp(timestamp);
    }

    embed
}

/// Numbered queue listing, head first, cut off before the description limit.
pub fn queue_embed(tracks: &[TrackInfo], replay: bool) -> CreateEmbed {
    let heading = if replay { "Queue 🔂" } else { "Queue" };

    CreateEmbed::new()
        .author(CreateEmbedAuthor::new(heading))
        .description(queue_listing(tracks))
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new(format!(
            "{} tracks • {}",
            tracks.len(),
            format_length(Some(tracks.iter().filter_map(|t| t.duration).sum()))
        )))
}

pub fn error_embed(description: &str) -> CreateEmbed {
    message_embed(colors::ERROR_RED, format!("❌ {}", description))
}

pub fn success_embed(description: &str) -> CreateEmbed {
    message_embed(colors::SUCCESS_GREEN, description.to_string())
}

fn message_embed(colour: Colour, description: String) -> CreateEmbed {
    CreateEmbed::new().description(description).color(colour)
}

fn queue_listing(tracks: &[TrackInfo]) -> String {
    let mut listing = String::new();
    let mut chars = 0;

    for (i, track) in tracks.iter().enumerate() {
        let line = format!(
            "{}. [{}]({}) (`{}`) ({})\n",
            i + 1,
            track.title,
            track.url,
            format_length(track.duration),
            track.requestor.name
        );

        let line_chars = line.chars().count();
        if chars + line_chars >= DESCRIPTION_LIMIT {
            listing.push_str(".....");
            break;
        }
        listing.push_str(&line);
        chars += line_chars;
    }

    listing
}

fn format_length(duration: Option<Duration>) -> String {
    match duration {
        Some(duration) if !duration.is_zero() => {
            humantime::format_duration(Duration::from_secs(duration.as_secs())).to_string()
        }
        Some(_) => "0s".to_string(),
        None => "🔴 live".to_string(),
    }
}
