//! Speech playback driver.
//!
//! Plays one synthesized item at a time on the session's single
//! [`SpeechOutput`]. Per item the driver walks
//! `Idle -> Loading -> Playing -> {Ended | Errored | PausedUnexpectedly}`:
//!
//! - an unexpected pause or device error gets exactly one automatic resume
//!   after [`DriverConfig::resume_delay`]
//! - a second unexpected pause completes the item so the program moves on;
//!   a second device error (or a failed resume after one) fails it
//! - a watchdog of `duration / speed + margin` force-completes an item the
//!   device never finishes
//! - a user pause freezes the watchdog until the user resumes

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use onair_core::{AudioHandle, OutputEvent, OutputNotice, SpeechOutput};

use crate::error::PlaybackError;

/// Lowest rate used when sizing the watchdog.
const MIN_WATCHDOG_RATE: f32 = 0.1;

/// Driver timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Added to the expected play time before the watchdog fires.
    pub watchdog_margin: Duration,
    /// Wait before the automatic resume after an interruption.
    pub resume_delay: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            watchdog_margin: Duration::from_secs(10),
            resume_delay: Duration::from_millis(500),
        }
    }
}

/// Lifecycle of the item currently owned by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Loading,
    Playing,
    Ended,
    Errored,
    PausedUnexpectedly,
}

/// How an item finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The device reported the natural end.
    Ended,
    /// Interrupted again after the automatic resume; treated as complete.
    Abandoned,
    /// The watchdog fired.
    TimedOut,
    /// A stop was requested.
    Cancelled,
}

impl ItemOutcome {
    pub const fn is_cancelled(self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Expected wall-clock play time plus margin.
pub fn watchdog_budget(duration: Duration, speed: f32, margin: Duration) -> Duration {
    duration.div_f32(speed.max(MIN_WATCHDOG_RATE)) + margin
}

enum Interruption {
    Paused,
    Error(String),
}

/// Owns the speech output for the whole session.
pub struct SpeechDriver {
    output: Arc<dyn SpeechOutput>,
    notices: tokio::sync::Mutex<mpsc::UnboundedReceiver<OutputNotice>>,
    config: DriverConfig,
    state: Mutex<DriverState>,
    user_paused: watch::Sender<bool>,
}

impl SpeechDriver {
    /// `notices` is the channel handed out together with `output`.
    pub fn new(
        output: Arc<dyn SpeechOutput>,
        notices: mpsc::UnboundedReceiver<OutputNotice>,
        config: DriverConfig,
    ) -> Self {
        Self {
            output,
            notices: tokio::sync::Mutex::new(notices),
            config,
            state: Mutex::new(DriverState::Idle),
            user_paused: watch::Sender::new(false),
        }
    }

    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn state(&self) -> DriverState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: DriverState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn is_paused(&self) -> bool {
        *self.user_paused.borrow()
    }

    /// Play one item to completion.
    ///
    /// `expected` is used for the watchdog when the output cannot tell the
    /// media duration. Returns [`ItemOutcome::Cancelled`] without error when
    /// `cancel` fires.
    pub async fn play(
        &self,
        clip: &AudioHandle,
        speed: f32,
        expected: Duration,
        cancel: &CancellationToken,
    ) -> Result<ItemOutcome, PlaybackError> {
        let mut notices = self.notices.lock().await;
        while notices.try_recv().is_ok() {}

        if !self.wait_while_paused(cancel).await {
            return Ok(self.cancelled());
        }

        self.set_state(DriverState::Loading);
        self.output.set_volume(1.0);
        self.output.set_rate(speed);
        let media = match self.output.load(clip) {
            Ok(media) => media,
            Err(e) => {
                self.set_state(DriverState::Errored);
                return Err(e.into());
            }
        };
        if let Err(e) = self.output.play() {
            self.set_state(DriverState::Errored);
            self.output.stop();
            return Err(e.into());
        }
        self.set_state(DriverState::Playing);

        let duration = media.duration.unwrap_or(expected);
        let budget = watchdog_budget(duration, speed, self.config.watchdog_margin);
        debug!(generation = media.generation, ?duration, ?budget, "Speech item started");

        let mut deadline = Instant::now() + budget;
        let mut paused_rx = self.user_paused.subscribe();
        let mut paused_since = (*paused_rx.borrow_and_update()).then(Instant::now);
        let mut resumed = false;

        loop {
            let interruption = tokio::select! {
                biased;

                () = cancel.cancelled() => return Ok(self.cancelled()),

                notice = notices.recv() => {
                    let Some(notice) = notice else {
                        self.set_state(DriverState::Errored);
                        return Err(PlaybackError::Failure("speech output closed".to_string()));
                    };
                    if notice.generation != media.generation {
                        continue;
                    }
                    match notice.event {
                        OutputEvent::Ended => {
                            self.set_state(DriverState::Ended);
                            return Ok(ItemOutcome::Ended);
                        }
                        OutputEvent::Paused => Interruption::Paused,
                        OutputEvent::Error(message) => Interruption::Error(message),
                    }
                }

                changed = paused_rx.changed() => {
                    if changed.is_ok() {
                        if *paused_rx.borrow_and_update() {
                            paused_since.get_or_insert_with(Instant::now);
                        } else if let Some(since) = paused_since.take() {
                            deadline += since.elapsed();
                        }
                    }
                    continue;
                }

                () = tokio::time::sleep_until(deadline), if paused_since.is_none() => {
                    warn!(?budget, "Speech watchdog fired, forcing item completion");
                    self.output.stop();
                    self.set_state(DriverState::Ended);
                    return Ok(ItemOutcome::TimedOut);
                }
            };

            if cancel.is_cancelled() {
                return Ok(self.cancelled());
            }

            match interruption {
                Interruption::Paused => {
                    self.set_state(DriverState::PausedUnexpectedly);
                    if resumed {
                        warn!("Speech paused again after automatic resume, moving on");
                        self.output.stop();
                        return Ok(ItemOutcome::Abandoned);
                    }
                    warn!("Speech paused unexpectedly, resuming");
                }
                Interruption::Error(ref message) => {
                    self.set_state(DriverState::Errored);
                    if resumed {
                        self.output.stop();
                        return Err(PlaybackError::Failure(message.clone()));
                    }
                    warn!(error = %message, "Speech output error, attempting resume");
                }
            }
            resumed = true;

            let started = Instant::now();
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(self.cancelled()),
                () = tokio::time::sleep(self.config.resume_delay) => {}
            }
            deadline += started.elapsed();

            if let Err(e) = self.output.play() {
                self.output.stop();
                return match interruption {
                    Interruption::Paused => {
                        warn!(error = %e, "Automatic resume failed, moving on");
                        Ok(ItemOutcome::Abandoned)
                    }
                    Interruption::Error(message) => {
                        Err(PlaybackError::Failure(format!("{message}; resume failed: {e}")))
                    }
                };
            }
            self.set_state(DriverState::Playing);
        }
    }

    /// Stop the current item immediately.
    pub fn halt(&self) {
        self.output.stop();
        self.user_paused.send_replace(false);
        self.set_state(DriverState::Idle);
    }

    /// User pause. The watchdog is frozen until [`resume`](Self::resume).
    pub fn pause(&self) -> Result<(), PlaybackError> {
        self.user_paused.send_replace(true);
        if self.state() == DriverState::Playing {
            self.output.pause()?;
        }
        Ok(())
    }

    pub fn resume(&self) -> Result<(), PlaybackError> {
        self.user_paused.send_replace(false);
        if self.state() == DriverState::Playing {
            self.output.play()?;
        }
        Ok(())
    }

    /// Returns `false` when cancelled while waiting.
    async fn wait_while_paused(&self, cancel: &CancellationToken) -> bool {
        let mut paused_rx = self.user_paused.subscribe();
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            result = paused_rx.wait_for(|paused| !paused) => result.is_ok(),
        }
    }

    fn cancelled(&self) -> ItemOutcome {
        self.output.stop();
        self.set_state(DriverState::Idle);
        ItemOutcome::Cancelled
    }
}

impl std::fmt::Debug for SpeechDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechDriver")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
