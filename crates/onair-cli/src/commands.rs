//! Subcommands and their arguments.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use onair_core::{MusicLibrary, PlaybackPosition, SessionSettings};
use onair_tts::TtsClientConfig;

use crate::error::CliError;

#[derive(Subcommand)]
pub enum Commands {
    /// Play a program file
    Play(PlayArgs),

    /// Maintain the audio cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheCommand {
    /// Delete every cached clip
    Clear,
    /// Delete clips older than the cache lifetime
    Sweep,
}

#[derive(Args, Debug, Clone)]
pub struct PlayArgs {
    /// Program JSON file
    pub program: PathBuf,

    /// Start at SECTION:CHUNK (both zero-based)
    #[arg(long, value_parser = parse_position, default_value = "0:0")]
    pub from: PlaybackPosition,

    /// Synthesis voice
    #[arg(long, env = "ONAIR_VOICE")]
    pub voice: Option<String>,

    /// Playback speed, 0.5 to 2.0
    #[arg(long, env = "ONAIR_SPEED")]
    pub speed: Option<f32>,

    /// Background music volume in percent; 0 disables music
    #[arg(long, env = "ONAIR_MUSIC_VOLUME", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub music_volume: Option<u8>,

    /// Category used to pick the background track
    #[arg(long)]
    pub category: Option<String>,

    /// Directory holding `<category>.mp3`, `default.mp3` and `uploads/`
    #[arg(long, env = "ONAIR_MUSIC_DIR")]
    pub music_dir: Option<PathBuf>,

    /// Synthesis service root URL
    #[arg(long, env = "ONAIR_TTS_URL")]
    pub tts_url: Option<String>,

    /// Synthesis service API key
    #[arg(long, env = "ONAIR_TTS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

impl PlayArgs {
    /// Session settings from flags, scanning the music directory if given.
    pub fn session_settings(&self) -> Result<SessionSettings, CliError> {
        let mut settings = SessionSettings::default();
        if let Some(voice) = &self.voice {
            settings = settings.with_voice(voice.clone());
        }
        if let Some(speed) = self.speed {
            settings = settings.with_speed(speed);
        }
        if let Some(volume) = self.music_volume {
            settings = settings.with_music_volume(volume);
        }
        if let Some(category) = &self.category {
            settings = settings.with_category(category.clone());
        }
        if let Some(dir) = &self.music_dir {
            let library = MusicLibrary::scan(dir).map_err(|e| {
                CliError::Arguments(format!("cannot read music directory {}: {e}", dir.display()))
            })?;
            settings = settings.with_music(library);
        }
        settings
            .validate()
            .map_err(|e| CliError::Arguments(e.to_string()))?;
        Ok(settings)
    }

    pub fn tts_config(&self) -> TtsClientConfig {
        let mut config = TtsClientConfig::new();
        if let Some(url) = &self.tts_url {
            config = config.with_base_url(url.clone());
        }
        config.with_optional_api_key(self.api_key.clone())
    }
}

/// Parse `SECTION:CHUNK`.
pub fn parse_position(value: &str) -> Result<PlaybackPosition, String> {
    let (section, chunk) = value
        .split_once(':')
        .ok_or_else(|| format!("expected SECTION:CHUNK, got '{value}'"))?;
    let section = section
        .trim()
        .parse()
        .map_err(|e| format!("invalid section '{section}': {e}"))?;
    let chunk = chunk
        .trim()
        .parse()
        .map_err(|e| format!("invalid chunk '{chunk}': {e}"))?;
    Ok(PlaybackPosition::new(section, chunk))
}
