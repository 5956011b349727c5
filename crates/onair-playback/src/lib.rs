//! Playback engine for onair.
//!
//! [`PlaybackOrchestrator`] runs a session over a program, pulling audio
//! from [`PrefetchScheduler`], playing it through [`SpeechDriver`] and
//! ducking [`BackgroundMixer`] under speech. Stops are cooperative through
//! [`StopSignal`].
//!
//! With the `rodio` feature (default), [`device`] provides outputs on the
//! system's default audio device.

mod cancel;
#[cfg(feature = "rodio")]
pub mod device;
mod driver;
mod error;
mod mixer;
mod observer;
mod orchestrator;
mod prefetch;

pub use cancel::StopSignal;
pub use driver::{DriverConfig, DriverState, ItemOutcome, SpeechDriver, watchdog_budget};
pub use error::{PlaybackError, SessionError};
pub use mixer::{BackgroundMixer, MixerConfig, platform_attenuation};
pub use observer::ChannelObserver;
pub use orchestrator::{OrchestratorConfig, PlaybackOrchestrator, SessionOutcome};
pub use prefetch::{PrefetchConfig, PrefetchScheduler, SynthesisTask};
