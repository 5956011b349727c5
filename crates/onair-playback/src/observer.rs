//! Channel-backed playback observer.

use onair_core::{PlaybackEvent, PlaybackObserver};
use tokio::sync::mpsc;

/// Forwards every event to an unbounded channel.
///
/// Events sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<PlaybackEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl PlaybackObserver for ChannelObserver {
    fn emit(&self, event: PlaybackEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("Playback observer receiver dropped");
        }
    }
}
