use anyhow::{Context, Result};
use std::{path::PathBuf, time::Duration};

use crate::audio::{frame::MAX_VOLUME, PlayerSettings};

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // development: register commands on one guild

    // Player
    pub default_volume: u32,
    pub tick_secs: u64,
    pub idle_timeout_secs: u64,

    // Voice
    pub voice_buffer_frames: usize,

    // External tools
    pub ffmpeg_path: PathBuf,
    pub ytdlp_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            guild_id: parse_optional_var("GUILD_ID")?,

            // Player
            default_volume: parse_var("DEFAULT_VOLUME", defaults.default_volume)?,
            tick_secs: parse_var("PLAYER_TICK_SECS", defaults.tick_secs)?,
            idle_timeout_secs: parse_var("PLAYER_IDLE_TIMEOUT_SECS", defaults.idle_timeout_secs)?,

            // Voice
            voice_buffer_frames: parse_var("VOICE_BUFFER_FRAMES", defaults.voice_buffer_frames)?,

            // External tools
            ffmpeg_path: std::env::var("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_path),
            ytdlp_path: std::env::var("YTDLP_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ytdlp_path),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0 and 300
    /// - The tick must be at least one second
    /// - The idle timeout must be a positive multiple of the tick
    /// - The voice buffer must hold at least one frame
    pub fn validate(&self) -> Result<()> {
        if self.default_volume > MAX_VOLUME {
            anyhow::bail!(
                "Default volume must be between 0 and {}, got: {}",
                MAX_VOLUME,
                self.default_volume
            );
        }

        if self.tick_secs == 0 {
            anyhow::bail!("Player tick must be greater than 0");
        }

        if self.idle_timeout_secs == 0 || self.idle_timeout_secs % self.tick_secs != 0 {
            anyhow::bail!(
                "Idle timeout must be a positive multiple of the tick ({}s), got: {}s",
                self.tick_secs,
                self.idle_timeout_secs
            );
        }

        if self.voice_buffer_frames == 0 {
            anyhow::bail!("Voice buffer must hold at least one frame");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands on {}\n  \
            Player: {}% vol, {} tick, {} idle timeout\n  \
            Voice: {} buffered frames\n  \
            Tools: ffmpeg={}, yt-dlp={}",
            self.guild_id.map_or("all guilds".to_string(), |id| format!("guild {}", id)),
            self.default_volume,
            humantime::format_duration(Duration::from_secs(self.tick_secs)),
            humantime::format_duration(Duration::from_secs(self.idle_timeout_secs)),
            self.voice_buffer_frames,
            self.ffmpeg_path.display(),
            self.ytdlp_path.display(),
        )
    }

    pub fn player_settings(&self) -> PlayerSettings {
        let idle_ticks = self.idle_timeout_secs / self.tick_secs.max(1);
        PlayerSettings {
            default_volume: self.default_volume,
            tick: Duration::from_secs(self.tick_secs),
            idle_ticks: u32::try_from(idle_ticks).unwrap_or(u32::MAX),
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parse_optional_var(name)?.unwrap_or(default))
}

/// Unset or blank is `None`; anything else must parse.
fn parse_optional_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(val) if !val.trim().is_empty() => val
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} has an invalid value: {:?}", name, val)),
        _ => Ok(None),
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            guild_id: None,

            // Player defaults
            default_volume: 50,
            tick_secs: 3,
            idle_timeout_secs: 30, // ten empty ticks

            // Voice defaults
            voice_buffer_frames: 50, // one second of audio

            // Tool defaults
            ffmpeg_path: "ffmpeg".into(),
            ytdlp_path: "yt-dlp".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.player_settings(), PlayerSettings::default());
    }

    #[test]
    fn idle_timeout_becomes_tick_count() {
        let config = Config {
            tick_secs: 2,
            idle_timeout_secs: 60,
            ..Config::default()
        };
        let settings = config.player_settings();
        assert_eq!(settings.tick, Duration::from_secs(2));
        assert_eq!(settings.idle_ticks, 30);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let loud = Config {
            default_volume: 301,
            ..Config::default()
        };
        assert!(loud.validate().is_err());

        let no_tick = Config {
            tick_secs: 0,
            ..Config::default()
        };
        assert!(no_tick.validate().is_err());

        let uneven = Config {
            idle_timeout_secs: 31,
            ..Config::default()
        };
        assert!(uneven.validate().is_err());

        let unbuffered = Config {
            voice_buffer_frames: 0,
            ..Config::default()
        };
        assert!(unbuffered.validate().is_err());
    }

    #[test]
    fn summary_hides_the_token() {
        let config = Config {
            discord_token: "super-secret".to_string(),
            guild_id: Some(1234),
            ..Config::default()
        };
        let summary = config.summary();
        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("guild 1234"));
        assert!(summary.contains("50% vol"));
        assert!(summary.contains("30s idle timeout"));
    }

    #[test]
    fn unset_variables_fall_back() {
        let value: u32 = parse_var("GUILD_PLAYER_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
        let guild: Option<u64> = parse_optional_var("GUILD_PLAYER_TEST_UNSET_VARIABLE").unwrap();
        assert_eq!(guild, None);
    }

    #[test]
    fn malformed_optional_variable_is_reported() {
        std::env::set_var("GUILD_PLAYER_TEST_GUILD_ID", "not-a-snowflake");
        let result = parse_optional_var::<u64>("GUILD_PLAYER_TEST_GUILD_ID");
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("GUILD_PLAYER_TEST_GUILD_ID"));

        std::env::set_var("GUILD_PLAYER_TEST_GUILD_ID", " 1234 ");
        let guild: Option<u64> = parse_optional_var("GUILD_PLAYER_TEST_GUILD_ID").unwrap();
        assert_eq!(guild, Some(1234));
    }
}
