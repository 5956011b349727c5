//! Synthesized audio and background music tracks.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;

/// Encoded audio returned by the synthesis endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    /// Encoded bytes (mp3, wav, ...).
    pub data: Bytes,
    /// MIME type reported by the endpoint (e.g. `"audio/mpeg"`).
    pub mime_type: String,
}

impl AudioClip {
    /// Create a clip from encoded bytes.
    pub fn new(data: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Size of the encoded payload in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Shared, cheaply clonable handle to a clip.
///
/// Handles live in the session cache and the prefetch window; they are not
/// durable across process restarts.
pub type AudioHandle = Arc<AudioClip>;

/// A background music file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicTrack {
    /// Display name (file stem).
    pub name: String,
    /// Location on disk.
    pub path: PathBuf,
}

impl MusicTrack {
    /// Create a track from a file path, naming it after the file stem.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { name, path }
    }
}
