//! Terminal rendering of playback events.

use onair_core::{PlaybackEvent, PlaybackState};

/// One status line for an event, or `None` for events the session summary
/// already covers.
pub fn format_event(event: &PlaybackEvent) -> Option<String> {
    match event {
        PlaybackEvent::NowPlaying(now) => Some(format!(
            "▶ {}  [{}/{}]",
            now.title,
            now.linear_index + 1,
            now.total
        )),
        PlaybackEvent::StateChanged { state } => match state {
            PlaybackState::Buffering => Some("… buffering".to_string()),
            PlaybackState::Paused => Some("⏸ paused".to_string()),
            _ => None,
        },
        PlaybackEvent::Error { message } => Some(format!("✖ {message}")),
    }
}
