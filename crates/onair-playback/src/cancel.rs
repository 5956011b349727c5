//! Cooperative stop signal shared by the playback components.
//!
//! Each session gets its own [`CancellationToken`] from
//! [`StopSignal::begin`] and hands it back with [`StopSignal::end`]. A stop
//! only ever cancels the token of the session that is live at that moment,
//! so a stop racing the end of one session cannot leak into the next.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct StopSignal {
    stopping: AtomicBool,
    session: Mutex<Option<CancellationToken>>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session and return its token.
    pub fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        *session = Some(token.clone());
        self.stopping.store(false, Ordering::SeqCst);
        token
    }

    /// Raise the flag and cancel the live session's token.
    ///
    /// Returns `false` when no session is live or a stop was already
    /// underway.
    pub fn request(&self) -> bool {
        self.request_with(|| ())
    }

    /// Like [`request`](Self::request), running `halt` first. `halt` runs
    /// only when the stop targets a live session.
    pub fn request_with(&self, halt: impl FnOnce()) -> bool {
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(token) = session.as_ref() else {
            return false;
        };
        if self.stopping.swap(true, Ordering::SeqCst) {
            return false;
        }
        halt();
        token.cancel();
        true
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// End the live session once its stop, if any, has been fully observed.
    pub fn end(&self) {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        *session = None;
        self.stopping.store(false, Ordering::SeqCst);
    }
}
