//! Background music mixer with ducking.
//!
//! The mixer owns the music output. Volume changes are linear ramps run as
//! spawned tasks; starting a new ramp aborts the one in progress so duck and
//! unduck never fight over the output.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use onair_core::{MusicOutput, MusicTrack, OutputEvent, OutputNotice, SessionSettings};

use crate::error::PlaybackError;

/// Extra gain applied on platforms whose speakers render louder by default.
pub const fn platform_attenuation() -> f32 {
    if cfg!(any(target_os = "ios", target_os = "android")) {
        0.5
    } else {
        1.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixerConfig {
    /// Ducked volume as a share of the base volume.
    pub duck_ratio: f32,
    pub duck_duration: Duration,
    pub unduck_duration: Duration,
    /// Interval between two volume updates during a ramp.
    pub fade_step: Duration,
    /// Multiplier applied to the configured base volume.
    pub attenuation: f32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            duck_ratio: 0.25,
            duck_duration: Duration::from_millis(300),
            unduck_duration: Duration::from_millis(200),
            fade_step: Duration::from_millis(20),
            attenuation: platform_attenuation(),
        }
    }
}

#[derive(Default)]
struct MixerState {
    active: bool,
    ducked: bool,
    base_volume: f32,
    fade: Option<JoinHandle<()>>,
    rotation: Option<JoinHandle<()>>,
}

/// Owns the background music output for the whole session.
pub struct BackgroundMixer {
    output: Arc<dyn MusicOutput>,
    notices: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<OutputNotice>>>,
    config: MixerConfig,
    state: Mutex<MixerState>,
}

impl BackgroundMixer {
    /// `notices` is the channel handed out together with `output`.
    pub fn new(
        output: Arc<dyn MusicOutput>,
        notices: mpsc::UnboundedReceiver<OutputNotice>,
        config: MixerConfig,
    ) -> Self {
        Self {
            output,
            notices: Arc::new(tokio::sync::Mutex::new(notices)),
            config,
            state: Mutex::new(MixerState::default()),
        }
    }

    pub const fn config(&self) -> &MixerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, MixerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub fn is_ducked(&self) -> bool {
        self.lock().ducked
    }

    /// Attenuated base volume of the running track, zero when inactive.
    pub fn base_volume(&self) -> f32 {
        let state = self.lock();
        if state.active { state.base_volume } else { 0.0 }
    }

    /// Start the music bed for a session.
    ///
    /// Uploaded tracks take precedence and rotate randomly each time one
    /// ends. Otherwise the category track loops, falling back to the
    /// default track. Returns the track started, or `None` when music is
    /// disabled or no track is available.
    pub fn start(
        &self,
        settings: &SessionSettings,
        category: Option<&str>,
    ) -> Result<Option<MusicTrack>, PlaybackError> {
        self.stop();

        let base_volume = settings.music_gain() * self.config.attenuation;
        if base_volume <= 0.0 {
            debug!("Background music disabled");
            return Ok(None);
        }

        let uploads = settings.music.uploaded_tracks();
        let (track, generation, rotation) = if uploads.is_empty() {
            let Some(track) = settings.music.track_for_category(category) else {
                debug!(category, "No background track available");
                return Ok(None);
            };
            let generation = self.output.load(&track, true)?;
            (track, generation, None)
        } else {
            let current = pick_track(uploads.len(), None);
            let track = uploads[current].clone();
            let generation = self.output.load(&track, false)?;
            (track, generation, Some((uploads, current)))
        };

        self.output.set_volume(base_volume);
        if let Err(e) = self.output.play() {
            self.output.stop();
            return Err(e.into());
        }

        let mut state = self.lock();
        state.active = true;
        state.ducked = false;
        state.base_volume = base_volume;
        state.rotation = rotation.map(|(tracks, current)| {
            tokio::spawn(rotate(
                Arc::clone(&self.output),
                Arc::clone(&self.notices),
                tracks,
                current,
                generation,
            ))
        });

        info!(
            track = %track.name,
            volume = base_volume,
            looping = state.rotation.is_none(),
            "Background music started"
        );
        Ok(Some(track))
    }

    /// Ramp down to the ducked volume.
    pub fn duck(&self) {
        self.fade(true);
    }

    /// Ramp back up to the base volume.
    pub fn unduck(&self) {
        self.fade(false);
    }

    fn fade(&self, duck: bool) {
        let mut state = self.lock();
        if !state.active || state.ducked == duck {
            return;
        }
        state.ducked = duck;
        if let Some(fade) = state.fade.take() {
            fade.abort();
        }

        let (target, duration) = if duck {
            (state.base_volume * self.config.duck_ratio, self.config.duck_duration)
        } else {
            (state.base_volume, self.config.unduck_duration)
        };
        let from = self.output.volume();
        debug!(from, target, ducked = duck, "Fading background music");

        state.fade = Some(tokio::spawn(ramp(
            Arc::clone(&self.output),
            from,
            target,
            duration,
            self.config.fade_step,
        )));
    }

    /// Stop the music and any fade or rotation in progress.
    pub fn stop(&self) {
        let mut state = self.lock();
        if let Some(fade) = state.fade.take() {
            fade.abort();
        }
        if let Some(rotation) = state.rotation.take() {
            rotation.abort();
        }
        if state.active {
            self.output.stop();
            debug!("Background music stopped");
        }
        state.active = false;
        state.ducked = false;
    }
}

impl Drop for BackgroundMixer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for BackgroundMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("BackgroundMixer")
            .field("config", &self.config)
            .field("active", &state.active)
            .field("ducked", &state.ducked)
            .finish_non_exhaustive()
    }
}

/// Linear volume ramp in `fade_step` increments.
async fn ramp(
    output: Arc<dyn MusicOutput>,
    from: f32,
    to: f32,
    duration: Duration,
    step: Duration,
) {
    let steps = if step.is_zero() {
        1
    } else {
        u32::try_from(duration.as_nanos() / step.as_nanos())
            .unwrap_or(u32::MAX)
            .max(1)
    };
    let interval = duration / steps;

    for i in 1..=steps {
        tokio::time::sleep(interval).await;
        #[allow(clippy::cast_precision_loss)]
        let progress = i as f32 / steps as f32;
        output.set_volume((to - from).mul_add(progress, from));
    }
}

/// Random index, different from `current` when there is a choice.
fn pick_track(len: usize, current: Option<usize>) -> usize {
    let mut rng = rand::rng();
    match current {
        Some(current) if len > 1 => {
            let next = rng.random_range(0..len - 1);
            if next >= current { next + 1 } else { next }
        }
        _ => rng.random_range(0..len.max(1)),
    }
}

/// Advance to a new random uploaded track each time one ends.
async fn rotate(
    output: Arc<dyn MusicOutput>,
    notices: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<OutputNotice>>>,
    tracks: Vec<MusicTrack>,
    mut current: usize,
    mut generation: u64,
) {
    let mut notices = notices.lock().await;
    while let Some(notice) = notices.recv().await {
        if notice.generation != generation {
            continue;
        }
        match notice.event {
            OutputEvent::Ended => {
                let next = pick_track(tracks.len(), Some(current));
                let track = &tracks[next];
                match output.load(track, false).and_then(|g| output.play().map(|()| g)) {
                    Ok(g) => {
                        debug!(track = %track.name, "Rotated background track");
                        generation = g;
                        current = next;
                    }
                    Err(e) => {
                        warn!(track = %track.name, error = %e, "Failed to rotate background track");
                        return;
                    }
                }
            }
            OutputEvent::Error(message) => {
                warn!(error = %message, "Background music output failed");
                return;
            }
            OutputEvent::Paused => {}
        }
    }
}
