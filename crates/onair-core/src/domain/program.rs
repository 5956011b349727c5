//! Program structure produced by the script generator.
//!
//! A [`Program`] is an ordered list of [`Section`]s, each holding the
//! [`Chunk`]s that are read aloud. The structure is immutable once handed
//! to the playback engine; chunks are addressed by a stable
//! [`PlaybackPosition`] (section index, chunk index).
//!
//! [`FlatProgram`] is the linearised view used during playback: every chunk
//! gets a single linear index equal to the cumulative chunk count of the
//! sections before it.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::events::NowPlaying;

/// Average speaking rate used to estimate a chunk's duration before synthesis.
pub const ESTIMATED_CHARS_PER_SECOND: f64 = 12.0;

/// Speaking rate for CJK text, where one character carries a syllable or
/// more. Kept on the slow side so the estimate errs long.
pub const ESTIMATED_CJK_CHARS_PER_SECOND: f64 = 6.0;

/// Floor applied to every duration estimate.
const MIN_ESTIMATED_DURATION: Duration = Duration::from_secs(1);

// ── Sections and chunks ────────────────────────────────────────────

/// Role of a section inside the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    /// Show intro.
    Opening,
    /// A themed segment of the show.
    Corner,
    /// Short bridge between two corners.
    Transition,
    /// Show outro.
    Ending,
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Opening => "opening",
            Self::Corner => "corner",
            Self::Transition => "transition",
            Self::Ending => "ending",
        };
        f.write_str(label)
    }
}

/// Smallest unit of script text scheduled for synthesis and playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Chunk {
    text: String,
}

impl Chunk {
    /// Create a chunk from read-aloud text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The text to be spoken.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Rough playback duration derived from the text length.
    ///
    /// Used to size the playback watchdog when the output device cannot
    /// report a media duration.
    pub fn estimated_duration(&self) -> Duration {
        let (cjk, other) = self
            .text
            .chars()
            .filter(|c| !c.is_whitespace())
            .fold((0_usize, 0_usize), |(cjk, other), c| {
                if is_cjk(c) {
                    (cjk + 1, other)
                } else {
                    (cjk, other + 1)
                }
            });

        #[allow(clippy::cast_precision_loss)]
        let secs = cjk as f64 / ESTIMATED_CJK_CHARS_PER_SECOND
            + other as f64 / ESTIMATED_CHARS_PER_SECOND;

        Duration::from_secs_f64(secs).max(MIN_ESTIMATED_DURATION)
    }
}

/// Han, kana, Hangul, CJK punctuation and full-width forms.
const fn is_cjk(c: char) -> bool {
    matches!(
        c,
        '\u{3000}'..='\u{30FF}'
            | '\u{3400}'..='\u{4DBF}'
            | '\u{4E00}'..='\u{9FFF}'
            | '\u{AC00}'..='\u{D7AF}'
            | '\u{F900}'..='\u{FAFF}'
            | '\u{FF00}'..='\u{FFEF}'
    )
}

/// A titled group of chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Section role.
    #[serde(rename = "type")]
    pub kind: SectionKind,

    /// Optional category label (e.g. `"tech"`), used for music selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Human-readable title.
    pub title: String,

    /// Chunks in reading order.
    #[serde(default)]
    pub chunks: Vec<Chunk>,
}

impl Section {
    /// Create a section from a list of chunk texts.
    pub fn new<I, S>(kind: SectionKind, title: impl Into<String>, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            category: None,
            title: title.into(),
            chunks: chunks.into_iter().map(Chunk::new).collect(),
        }
    }

    /// Attach a category label.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// The full show.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Sections in broadcast order.
    pub sections: Vec<Section>,
}

impl Program {
    /// Create a program from its sections.
    pub const fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    /// Total number of chunks across all sections.
    pub fn chunk_count(&self) -> usize {
        self.sections.iter().map(|s| s.chunks.len()).sum()
    }

    /// First category label found in the program, if any.
    pub fn category(&self) -> Option<&str> {
        self.sections.iter().find_map(|s| s.category.as_deref())
    }
}

// ── Positions ──────────────────────────────────────────────────────

/// (section index, chunk index) of the chunk playing or about to play.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PlaybackPosition {
    /// Index into [`Program::sections`].
    pub section: usize,
    /// Index into [`Section::chunks`].
    pub chunk: usize,
}

impl PlaybackPosition {
    /// The very first chunk of a program.
    pub const START: Self = Self::new(0, 0);

    /// Create a position.
    pub const fn new(section: usize, chunk: usize) -> Self {
        Self { section, chunk }
    }
}

impl fmt::Display for PlaybackPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.section, self.chunk)
    }
}

// ── Linear view ────────────────────────────────────────────────────

/// A chunk placed in linear playback order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatChunk {
    /// Cumulative index across all sections.
    pub linear_index: usize,
    /// Stable (section, chunk) address.
    pub position: PlaybackPosition,
    /// Text to synthesize.
    pub text: String,
    /// Duration estimate from [`Chunk::estimated_duration`].
    pub estimated_duration: Duration,
}

#[derive(Debug, Clone)]
struct SectionSpan {
    start: usize,
    len: usize,
    title: String,
    kind: SectionKind,
}

/// Linearised program, built once per playback session.
#[derive(Debug, Clone)]
pub struct FlatProgram {
    chunks: Vec<FlatChunk>,
    spans: Vec<SectionSpan>,
}

impl FlatProgram {
    /// Flatten a program into a single ordered chunk list.
    pub fn new(program: &Program) -> Self {
        let mut chunks = Vec::with_capacity(program.chunk_count());
        let mut spans = Vec::with_capacity(program.sections.len());

        for (section_index, section) in program.sections.iter().enumerate() {
            spans.push(SectionSpan {
                start: chunks.len(),
                len: section.chunks.len(),
                title: section.title.clone(),
                kind: section.kind,
            });

            for (chunk_index, chunk) in section.chunks.iter().enumerate() {
                chunks.push(FlatChunk {
                    linear_index: chunks.len(),
                    position: PlaybackPosition::new(section_index, chunk_index),
                    text: chunk.text().to_string(),
                    estimated_duration: chunk.estimated_duration(),
                });
            }
        }

        Self { chunks, spans }
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the program has nothing to play.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunk at a linear index.
    pub fn get(&self, index: usize) -> Option<&FlatChunk> {
        self.chunks.get(index)
    }

    /// All chunks in playback order.
    pub fn chunks(&self) -> &[FlatChunk] {
        &self.chunks
    }

    /// Linear index of a (section, chunk) position.
    ///
    /// A position one past the last chunk of a section is not valid; the
    /// only valid "end" position is the program end itself.
    pub fn linear_index(&self, position: PlaybackPosition) -> Option<usize> {
        let span = self.spans.get(position.section)?;
        (position.chunk < span.len).then_some(span.start + position.chunk)
    }

    /// Position of a linear index.
    pub fn position(&self, index: usize) -> Option<PlaybackPosition> {
        self.chunks.get(index).map(|c| c.position)
    }

    /// Number of chunks after `index` inside the same section.
    pub fn remaining_in_section(&self, index: usize) -> Option<usize> {
        let position = self.position(index)?;
        let span = &self.spans[position.section];
        Some(span.len - position.chunk - 1)
    }

    /// Linear range of the first non-empty section after the one holding `index`.
    pub fn next_section_range(&self, index: usize) -> Option<std::ops::Range<usize>> {
        let position = self.position(index)?;
        self.spans
            .iter()
            .skip(position.section + 1)
            .find(|span| span.len > 0)
            .map(|span| span.start..span.start + span.len)
    }

    /// Now-playing metadata for a linear index.
    pub fn now_playing(&self, index: usize) -> Option<NowPlaying> {
        let chunk = self.chunks.get(index)?;
        let span = &self.spans[chunk.position.section];
        Some(NowPlaying {
            section_index: chunk.position.section,
            chunk_index: chunk.position.chunk,
            linear_index: index,
            total: self.chunks.len(),
            section_kind: span.kind,
            section_title: span.title.clone(),
            title: format!("{} ({}/{})", span.title, chunk.position.chunk + 1, span.len),
        })
    }
}
