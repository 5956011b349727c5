//! Domain types for the playback engine.

mod audio;
mod program;

pub use audio::{AudioClip, AudioHandle, MusicTrack};
pub use program::{
    Chunk, ESTIMATED_CHARS_PER_SECOND, ESTIMATED_CJK_CHARS_PER_SECOND, FlatChunk, FlatProgram,
    PlaybackPosition, Program, Section, SectionKind,
};
