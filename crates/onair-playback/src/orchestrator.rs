//! Playback orchestrator: runs one session over a program.
//!
//! The session loop, per chunk:
//! 1. check for a stop
//! 2. make sure the chunk and its lookahead are being synthesized
//! 3. wait for this chunk's audio, whatever finished first
//! 4. duck the music and play the chunk to completion
//!
//! Music is unducked only while the playhead waits for synthesis, so back to
//! back chunks do not pump the volume. A fatal error stops every component
//! and ends the session; a user stop never counts as an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use onair_core::{
    FlatProgram, PlaybackEvent, PlaybackObserver, PlaybackPosition, PlaybackState, Program,
    SessionSettings,
};
use onair_tts::{SynthesisContext, SynthesisGateway};

use crate::cancel::StopSignal;
use crate::driver::SpeechDriver;
use crate::error::{PlaybackError, SessionError};
use crate::mixer::BackgroundMixer;
use crate::prefetch::{PrefetchConfig, PrefetchScheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// How long a new session waits for a stopping one to unwind.
    pub stop_grace: Duration,
    pub prefetch: PrefetchConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stop_grace: Duration::from_millis(300),
            prefetch: PrefetchConfig::default(),
        }
    }
}

/// How a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Every chunk was played.
    Completed,
    /// The user stopped playback; `at` is the chunk that was interrupted
    /// or about to start.
    Stopped { at: PlaybackPosition },
}

pub struct PlaybackOrchestrator {
    gateway: Arc<SynthesisGateway>,
    driver: SpeechDriver,
    mixer: BackgroundMixer,
    observer: Arc<dyn PlaybackObserver>,
    signal: StopSignal,
    config: OrchestratorConfig,
    running: AtomicBool,
    idle: Notify,
    position: Mutex<Option<PlaybackPosition>>,
    state: Mutex<PlaybackState>,
}

/// Marks a session as running and owns its stop token; dropping it ends
/// the session and lets the next one in.
struct SessionGuard<'a> {
    orchestrator: &'a PlaybackOrchestrator,
    token: CancellationToken,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        let orchestrator = self.orchestrator;
        orchestrator.signal.end();
        orchestrator.running.store(false, Ordering::SeqCst);
        orchestrator.idle.notify_waiters();
    }
}

impl PlaybackOrchestrator {
    pub fn new(
        gateway: Arc<SynthesisGateway>,
        driver: SpeechDriver,
        mixer: BackgroundMixer,
        observer: Arc<dyn PlaybackObserver>,
    ) -> Self {
        Self {
            gateway,
            driver,
            mixer,
            observer,
            signal: StopSignal::new(),
            config: OrchestratorConfig::default(),
            running: AtomicBool::new(false),
            idle: Notify::new(),
            position: Mutex::new(None),
            state: Mutex::new(PlaybackState::Idle),
        }
    }

    #[must_use]
    pub const fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub const fn mixer(&self) -> &BackgroundMixer {
        &self.mixer
    }

    pub const fn driver(&self) -> &SpeechDriver {
        &self.driver
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_stopping(&self) -> bool {
        self.signal.is_stopping()
    }

    /// Position of the chunk playing or about to play.
    pub fn position(&self) -> Option<PlaybackPosition> {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: PlaybackState) {
        let changed = {
            let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, state) != state
        };
        if changed {
            self.observer.emit(PlaybackEvent::state(state));
        }
    }

    fn set_position(&self, position: PlaybackPosition) {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner) = Some(position);
    }

    /// Play `program` from `start` until it ends, fails or is stopped.
    ///
    /// Settings are read once here; changing them affects the next session
    /// only. Seeking is a stop followed by a new `play` from the target.
    pub async fn play(
        &self,
        program: &Program,
        settings: &SessionSettings,
        start: PlaybackPosition,
    ) -> Result<SessionOutcome, SessionError> {
        settings.validate()?;
        let flat = FlatProgram::new(program);
        let first = if flat.is_empty() && start == PlaybackPosition::START {
            0
        } else {
            flat.linear_index(start)
                .ok_or(SessionError::InvalidPosition(start))?
        };

        let session = self.begin_session().await?;
        let token = session.token.clone();

        let category = settings.category.as_deref().or_else(|| program.category());
        info!(
            chunks = flat.len(),
            %start,
            voice = %settings.voice_id,
            speed = settings.speed,
            category,
            "Playback session started"
        );

        let mut prefetch = PrefetchScheduler::new(
            Arc::clone(&self.gateway),
            settings.voice_id.as_str(),
            SynthesisContext::new(category.map(str::to_string)),
            self.config.prefetch,
        );
        if let Err(e) = self.mixer.start(settings, category) {
            warn!(error = %e, "Background music unavailable, continuing without it");
        }

        let result = self
            .run(&flat, first, settings.speed, &mut prefetch, &token)
            .await;

        prefetch.clear();
        self.mixer.stop();
        match &result {
            Ok(SessionOutcome::Completed) => {
                info!("Playback session ended");
                self.set_state(PlaybackState::Ended);
            }
            Ok(SessionOutcome::Stopped { at }) => {
                info!(%at, "Playback session stopped");
                self.set_state(PlaybackState::Stopped);
            }
            Err(e) => {
                self.driver.halt();
                error!(error = %e, "Playback session failed");
                self.observer.emit(PlaybackEvent::error(e.to_string()));
                self.set_state(PlaybackState::Error);
            }
        }
        result
    }

    async fn run(
        &self,
        program: &FlatProgram,
        first: usize,
        speed: f32,
        prefetch: &mut PrefetchScheduler,
        token: &CancellationToken,
    ) -> Result<SessionOutcome, SessionError> {
        for chunk in program.chunks().iter().skip(first) {
            let index = chunk.linear_index;
            let stopped = SessionOutcome::Stopped { at: chunk.position };
            if token.is_cancelled() {
                return Ok(stopped);
            }
            self.set_position(chunk.position);

            prefetch.ensure(program, index);
            if !prefetch.is_ready(index) {
                debug!(index, "Waiting for synthesis");
                self.mixer.unduck();
                self.set_state(PlaybackState::Buffering);
            }

            let Some(mut task) = prefetch.take(program, index) else {
                return Err(SessionError::InvalidPosition(chunk.position));
            };
            let audio = tokio::select! {
                biased;
                () = token.cancelled() => {
                    task.abort();
                    return Ok(stopped);
                }
                joined = &mut task => joined.map_err(|e| SessionError::TaskFailed(e.to_string()))??,
            };
            if token.is_cancelled() {
                return Ok(stopped);
            }

            if let Some(now_playing) = program.now_playing(index) {
                debug!(index, title = %now_playing.title, "Now playing");
                self.observer.emit(PlaybackEvent::NowPlaying(now_playing));
            }
            if !self.driver.is_paused() {
                self.set_state(PlaybackState::Playing);
            }
            self.mixer.duck();

            let outcome = self
                .driver
                .play(&audio, speed, chunk.estimated_duration, token)
                .await?;
            if outcome.is_cancelled() || token.is_cancelled() {
                return Ok(stopped);
            }
            debug!(index, ?outcome, "Chunk finished");
        }

        if let Some(end) = program.len().checked_sub(1).and_then(|i| program.position(i)) {
            self.set_position(end);
        }
        Ok(SessionOutcome::Completed)
    }

    /// Wait out a stopping session for up to the grace period.
    async fn begin_session(&self) -> Result<SessionGuard<'_>, SessionError> {
        let deadline = tokio::time::Instant::now() + self.config.stop_grace;
        loop {
            let idle = self.idle.notified();
            if self
                .running
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Ok(SessionGuard {
                    orchestrator: self,
                    token: self.signal.begin(),
                });
            }
            if tokio::time::timeout_at(deadline, idle).await.is_err() {
                warn!("Previous session still running");
                return Err(SessionError::Busy);
            }
        }
    }

    /// Stop the running session.
    ///
    /// Halts speech and music immediately, then raises the stop flag the
    /// session loop exits on. Only the session live at the time of the call
    /// is affected. Returns `false` when there was nothing to stop or a stop
    /// was already underway.
    pub fn request_stop(&self) -> bool {
        self.signal.request_with(|| {
            info!("Stop requested");
            self.driver.halt();
            self.mixer.stop();
        })
    }

    /// User pause of the current chunk.
    pub fn pause(&self) -> Result<(), PlaybackError> {
        if !self.is_running() {
            return Ok(());
        }
        self.driver.pause()?;
        self.set_state(PlaybackState::Paused);
        Ok(())
    }

    pub fn resume(&self) -> Result<(), PlaybackError> {
        if !self.is_running() || !self.driver.is_paused() {
            return Ok(());
        }
        self.driver.resume()?;
        self.set_state(PlaybackState::Playing);
        Ok(())
    }
}

impl std::fmt::Debug for PlaybackOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackOrchestrator")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .field("state", &self.state())
            .field("position", &self.position())
            .finish_non_exhaustive()
    }
}
