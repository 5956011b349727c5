//! Session settings and validation.
//!
//! Settings are read once when a playback session starts. Changes made
//! while a session is running only affect the next session.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::MusicTrack;

/// Voice used when none is configured.
pub const DEFAULT_VOICE_ID: &str = "default";

/// Default playback speed multiplier.
pub const DEFAULT_SPEED: f32 = 1.0;

/// Slowest accepted playback speed.
pub const MIN_SPEED: f32 = 0.5;

/// Fastest accepted playback speed.
pub const MAX_SPEED: f32 = 2.0;

/// Default background music volume, in percent.
pub const DEFAULT_MUSIC_VOLUME: u8 = 30;

/// Name of the category-independent fallback track in a music directory.
pub const DEFAULT_TRACK_STEM: &str = "default";

/// Subdirectory of a music directory holding user-uploaded tracks.
pub const UPLOADS_DIR: &str = "uploads";

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac", "m4a"];

/// Settings for one playback session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Synthesis voice identifier.
    pub voice_id: String,

    /// Playback speed multiplier (0.5–2.0).
    pub speed: f32,

    /// Background music volume in percent (0–100). Zero disables music.
    pub music_volume: u8,

    /// Program category chosen by the user; falls back to the program's own.
    pub category: Option<String>,

    /// Available background music.
    pub music: MusicLibrary,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            voice_id: DEFAULT_VOICE_ID.to_string(),
            speed: DEFAULT_SPEED,
            music_volume: DEFAULT_MUSIC_VOLUME,
            category: None,
            music: MusicLibrary::default(),
        }
    }
}

impl SessionSettings {
    /// Set the synthesis voice.
    #[must_use]
    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    /// Set the playback speed multiplier.
    #[must_use]
    pub const fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Set the music volume in percent.
    #[must_use]
    pub const fn with_music_volume(mut self, volume: u8) -> Self {
        self.music_volume = volume;
        self
    }

    /// Set the program category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the music library.
    #[must_use]
    pub fn with_music(mut self, music: MusicLibrary) -> Self {
        self.music = music;
        self
    }

    /// Music volume as a 0.0–1.0 gain.
    pub fn music_gain(&self) -> f32 {
        f32::from(self.music_volume.min(100)) / 100.0
    }

    /// Validate all fields.
    pub fn validate(&self) -> Result<(), SettingsError> {
        validate_settings(self)
    }
}

/// Background music available to the mixer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MusicLibrary {
    /// One looping track per program category.
    pub category_tracks: BTreeMap<String, PathBuf>,

    /// Fallback when the category is unknown.
    pub default_track: Option<PathBuf>,

    /// User-uploaded tracks; when present they take precedence and rotate.
    pub uploaded: Vec<PathBuf>,
}

impl MusicLibrary {
    /// Scan a music directory.
    ///
    /// Layout: `<dir>/<category>.<ext>` per category, `<dir>/default.<ext>`
    /// as the fallback, and `<dir>/uploads/*` for user-supplied tracks.
    pub fn scan(dir: &Path) -> io::Result<Self> {
        let mut library = Self::default();

        for path in audio_files(dir)? {
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_lowercase()) else {
                continue;
            };
            if stem == DEFAULT_TRACK_STEM {
                library.default_track = Some(path);
            } else {
                library.category_tracks.insert(stem, path);
            }
        }

        let uploads = dir.join(UPLOADS_DIR);
        if uploads.is_dir() {
            library.uploaded = audio_files(&uploads)?;
        }

        Ok(library)
    }

    /// Whether the library holds no track at all.
    pub fn is_empty(&self) -> bool {
        self.category_tracks.is_empty() && self.default_track.is_none() && self.uploaded.is_empty()
    }

    /// The looping track for a category, falling back to the default track.
    pub fn track_for_category(&self, category: Option<&str>) -> Option<MusicTrack> {
        category
            .map(str::to_lowercase)
            .and_then(|c| self.category_tracks.get(&c))
            .or(self.default_track.as_ref())
            .map(MusicTrack::from_path)
    }

    /// User-uploaded tracks.
    pub fn uploaded_tracks(&self) -> Vec<MusicTrack> {
        self.uploaded.iter().map(MusicTrack::from_path).collect()
    }
}

fn audio_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("Voice identifier cannot be empty")]
    EmptyVoice,

    #[error("Playback speed must be between 0.5 and 2.0, got {0}")]
    InvalidSpeed(f32),

    #[error("Music volume must be between 0 and 100, got {0}")]
    InvalidMusicVolume(u8),
}

/// Validate session settings.
pub fn validate_settings(settings: &SessionSettings) -> Result<(), SettingsError> {
    if settings.voice_id.trim().is_empty() {
        return Err(SettingsError::EmptyVoice);
    }

    if !(MIN_SPEED..=MAX_SPEED).contains(&settings.speed) {
        return Err(SettingsError::InvalidSpeed(settings.speed));
    }

    if settings.music_volume > 100 {
        return Err(SettingsError::InvalidMusicVolume(settings.music_volume));
    }

    Ok(())
}
