//! Playback observer for state and now-playing updates.

use crate::events::PlaybackEvent;

/// Receives playback events.
///
/// Implementations must not block: the orchestrator calls `emit` from its
/// playback loop.
///
/// # Implementations
///
/// - `NoopObserver` - discards everything
/// - `ChannelObserver` in `onair-playback` - forwards to an mpsc channel
pub trait PlaybackObserver: Send + Sync {
    fn emit(&self, event: PlaybackEvent);
}

/// Observer that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl NoopObserver {
    pub const fn new() -> Self {
        Self
    }
}

impl PlaybackObserver for NoopObserver {
    fn emit(&self, _event: PlaybackEvent) {}
}
