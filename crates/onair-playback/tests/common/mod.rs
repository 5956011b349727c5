//! Fakes shared by the playback integration tests.
//!
//! Everything runs on tokio's paused clock: synthesis delays and speech
//! durations are virtual time.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use onair_core::{
    AudioCache, AudioHandle, CacheConfig, EndpointError, LoadedMedia, MusicLibrary, MusicOutput,
    MusicTrack, OutputError, OutputEvent, OutputNotice, PlaybackEvent, Program, Section,
    SectionKind, SessionSettings, SpeechOutput, SynthesisEndpoint, SynthesisRequest,
    SynthesizedAudio,
};
use onair_playback::{
    BackgroundMixer, ChannelObserver, DriverConfig, MixerConfig, PlaybackOrchestrator,
    SpeechDriver,
};
use onair_tts::SynthesisGateway;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// How long every fake speech item plays unless scripted otherwise.
pub const PLAY_TIME: Duration = Duration::from_secs(5);

// ── Synthesis endpoint ─────────────────────────────────────────────

/// Endpoint that answers after a per-text delay and echoes the text back
/// as the audio payload.
#[derive(Default)]
pub struct FakeEndpoint {
    delays: Mutex<HashMap<String, Duration>>,
    failures: Mutex<HashMap<String, EndpointError>>,
    requests: Mutex<Vec<(Instant, String)>>,
}

impl FakeEndpoint {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delays<'a>(delays: impl IntoIterator<Item = (&'a str, u64)>) -> Arc<Self> {
        let endpoint = Self::new();
        for (text, secs) in delays {
            endpoint.set_delay(text, Duration::from_secs(secs));
        }
        endpoint
    }

    pub fn set_delay(&self, text: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(text.to_string(), delay);
    }

    pub fn fail(&self, text: &str, error: EndpointError) {
        self.failures
            .lock()
            .unwrap()
            .insert(text.to_string(), error);
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn request_time(&self, text: &str) -> Option<Instant> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|(_, t)| t == text)
            .map(|(at, _)| *at)
    }
}

#[async_trait]
impl SynthesisEndpoint for FakeEndpoint {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesizedAudio, EndpointError> {
        self.requests
            .lock()
            .unwrap()
            .push((Instant::now(), request.text.clone()));

        let delay = self
            .delays
            .lock()
            .unwrap()
            .get(&request.text)
            .copied()
            .unwrap_or(Duration::ZERO);
        tokio::time::sleep(delay).await;

        if let Some(error) = self.failures.lock().unwrap().get(&request.text) {
            return Err(error.clone());
        }
        Ok(SynthesizedAudio {
            data: Bytes::from(request.text.clone()),
            mime_type: "audio/mpeg".to_string(),
        })
    }
}

// ── Speech output ──────────────────────────────────────────────────

/// What the fake device does on the next `play` call.
#[derive(Debug, Clone)]
pub enum Behavior {
    EndAfter(Duration),
    PauseAfter(Duration),
    ErrorAfter(Duration, &'static str),
    /// Never reports anything.
    Hang,
    /// `play` itself fails.
    RejectPlay,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpeechCall {
    Load(String),
    Play,
    Pause,
    Stop,
    Volume(f32),
    Rate(f32),
}

struct SpeechState {
    generation: u64,
    loaded: Option<String>,
    played_current: bool,
    timer: Option<JoinHandle<()>>,
    script: VecDeque<Behavior>,
    calls: Vec<SpeechCall>,
    started: Vec<(Instant, String)>,
    ended: Vec<(Instant, String)>,
}

impl SpeechState {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

pub struct FakeSpeechOutput {
    play_time: Duration,
    notices: mpsc::UnboundedSender<OutputNotice>,
    state: Arc<Mutex<SpeechState>>,
}

impl FakeSpeechOutput {
    pub fn new(play_time: Duration) -> (Arc<Self>, mpsc::UnboundedReceiver<OutputNotice>) {
        let (notices, receiver) = mpsc::unbounded_channel();
        let output = Arc::new(Self {
            play_time,
            notices,
            state: Arc::new(Mutex::new(SpeechState {
                generation: 0,
                loaded: None,
                played_current: false,
                timer: None,
                script: VecDeque::new(),
                calls: Vec::new(),
                started: Vec::new(),
                ended: Vec::new(),
            })),
        });
        (output, receiver)
    }

    /// Queue behaviours for upcoming `play` calls.
    pub fn script(&self, behaviors: impl IntoIterator<Item = Behavior>) {
        self.state.lock().unwrap().script.extend(behaviors);
    }

    /// Texts in the order they started playing.
    pub fn started(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .started
            .iter()
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn started_at(&self) -> Vec<(Instant, String)> {
        self.state.lock().unwrap().started.clone()
    }

    pub fn ended(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .ended
            .iter()
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn ended_at(&self, text: &str) -> Option<Instant> {
        self.state
            .lock()
            .unwrap()
            .ended
            .iter()
            .find(|(_, t)| t == text)
            .map(|(at, _)| *at)
    }

    pub fn calls(&self) -> Vec<SpeechCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn play_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == SpeechCall::Play)
            .count()
    }

    /// Report a notice for the current media right now.
    pub fn report(&self, event: OutputEvent) {
        let generation = self.state.lock().unwrap().generation;
        let _ = self.notices.send(OutputNotice::new(generation, event));
    }

    /// Report a notice tagged with an arbitrary generation.
    pub fn report_for(&self, generation: u64, event: OutputEvent) {
        let _ = self.notices.send(OutputNotice::new(generation, event));
    }
}

impl SpeechOutput for FakeSpeechOutput {
    fn load(&self, clip: &AudioHandle) -> Result<LoadedMedia, OutputError> {
        let text = String::from_utf8_lossy(&clip.data).into_owned();
        let mut state = self.state.lock().unwrap();
        state.cancel_timer();
        state.generation += 1;
        state.loaded = Some(text.clone());
        state.played_current = false;
        state.calls.push(SpeechCall::Load(text));
        Ok(LoadedMedia {
            generation: state.generation,
            duration: Some(self.play_time),
        })
    }

    fn play(&self) -> Result<(), OutputError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(SpeechCall::Play);
        let Some(text) = state.loaded.clone() else {
            return Err(OutputError::Rejected("nothing loaded".to_string()));
        };
        let behavior = state
            .script
            .pop_front()
            .unwrap_or(Behavior::EndAfter(self.play_time));

        let (after, event) = match behavior {
            Behavior::RejectPlay => {
                return Err(OutputError::Rejected("autoplay blocked".to_string()));
            }
            Behavior::Hang => (None, None),
            Behavior::EndAfter(d) => (Some(d), Some(OutputEvent::Ended)),
            Behavior::PauseAfter(d) => (Some(d), Some(OutputEvent::Paused)),
            Behavior::ErrorAfter(d, msg) => (Some(d), Some(OutputEvent::Error(msg.to_string()))),
        };

        if !state.played_current {
            state.played_current = true;
            state.started.push((Instant::now(), text.clone()));
        }
        state.cancel_timer();

        if let (Some(after), Some(event)) = (after, event) {
            let generation = state.generation;
            let shared = Arc::clone(&self.state);
            let notices = self.notices.clone();
            state.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(after).await;
                let mut state = shared.lock().unwrap();
                if state.generation != generation || state.loaded.is_none() {
                    return;
                }
                if event == OutputEvent::Ended {
                    state.ended.push((Instant::now(), text));
                }
                state.timer = None;
                let _ = notices.send(OutputNotice::new(generation, event));
            }));
        }
        Ok(())
    }

    fn pause(&self) -> Result<(), OutputError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(SpeechCall::Pause);
        state.cancel_timer();
        Ok(())
    }

    fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(SpeechCall::Stop);
        state.cancel_timer();
        state.loaded = None;
    }

    fn set_rate(&self, rate: f32) {
        self.state.lock().unwrap().calls.push(SpeechCall::Rate(rate));
    }

    fn set_volume(&self, volume: f32) {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(SpeechCall::Volume(volume));
    }
}

// ── Music output ───────────────────────────────────────────────────

#[derive(Default)]
struct MusicState {
    generation: u64,
    loads: Vec<(String, bool)>,
    playing: bool,
    volume: f32,
    volumes: Vec<(Instant, f32)>,
    stops: usize,
}

pub struct FakeMusicOutput {
    notices: mpsc::UnboundedSender<OutputNotice>,
    state: Mutex<MusicState>,
}

impl FakeMusicOutput {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<OutputNotice>) {
        let (notices, receiver) = mpsc::unbounded_channel();
        let output = Arc::new(Self {
            notices,
            state: Mutex::new(MusicState {
                volume: 1.0,
                ..MusicState::default()
            }),
        });
        (output, receiver)
    }

    /// Track names loaded so far, with their looping flag.
    pub fn loads(&self) -> Vec<(String, bool)> {
        self.state.lock().unwrap().loads.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().unwrap().playing
    }

    pub fn current_volume(&self) -> f32 {
        self.state.lock().unwrap().volume
    }

    pub fn volume_history(&self) -> Vec<(Instant, f32)> {
        self.state.lock().unwrap().volumes.clone()
    }

    pub fn stop_count(&self) -> usize {
        self.state.lock().unwrap().stops
    }

    /// Simulate the current track playing to its end.
    pub fn finish_track(&self) {
        let generation = self.state.lock().unwrap().generation;
        let _ = self
            .notices
            .send(OutputNotice::new(generation, OutputEvent::Ended));
    }
}

impl MusicOutput for FakeMusicOutput {
    fn load(&self, track: &MusicTrack, looping: bool) -> Result<u64, OutputError> {
        let mut state = self.state.lock().unwrap();
        state.generation += 1;
        state.playing = false;
        state.loads.push((track.name.clone(), looping));
        Ok(state.generation)
    }

    fn play(&self) -> Result<(), OutputError> {
        self.state.lock().unwrap().playing = true;
        Ok(())
    }

    fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.playing = false;
        state.stops += 1;
    }

    fn set_volume(&self, volume: f32) {
        let mut state = self.state.lock().unwrap();
        state.volume = volume;
        state.volumes.push((Instant::now(), volume));
    }

    fn volume(&self) -> f32 {
        self.state.lock().unwrap().volume
    }
}

// ── Assembly ───────────────────────────────────────────────────────

pub fn mixer_config() -> MixerConfig {
    MixerConfig {
        attenuation: 1.0,
        ..MixerConfig::default()
    }
}

pub fn gateway(endpoint: Arc<FakeEndpoint>) -> Arc<SynthesisGateway> {
    let cache = Arc::new(AudioCache::memory_only(CacheConfig::default()));
    Arc::new(SynthesisGateway::new(endpoint, cache).with_min_interval(Duration::ZERO))
}

/// A complete orchestrator wired to fakes.
pub struct Harness {
    pub orchestrator: Arc<PlaybackOrchestrator>,
    pub endpoint: Arc<FakeEndpoint>,
    pub speech: Arc<FakeSpeechOutput>,
    pub music: Arc<FakeMusicOutput>,
    pub events: mpsc::UnboundedReceiver<PlaybackEvent>,
}

impl Harness {
    pub fn new(endpoint: Arc<FakeEndpoint>) -> Self {
        let (speech, speech_notices) = FakeSpeechOutput::new(PLAY_TIME);
        let (music, music_notices) = FakeMusicOutput::new();

        let driver = SpeechDriver::new(speech.clone(), speech_notices, DriverConfig::default());
        let mixer = BackgroundMixer::new(music.clone(), music_notices, mixer_config());
        let (observer, events) = ChannelObserver::new();

        let orchestrator = Arc::new(PlaybackOrchestrator::new(
            gateway(Arc::clone(&endpoint)),
            driver,
            mixer,
            Arc::new(observer),
        ));

        Self {
            orchestrator,
            endpoint,
            speech,
            music,
            events,
        }
    }

    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Build a program from chunk texts, one slice per section.
pub fn program(sections: &[&[&str]]) -> Program {
    let last = sections.len().saturating_sub(1);
    Program::new(
        sections
            .iter()
            .enumerate()
            .map(|(i, chunks)| {
                let kind = match i {
                    0 => SectionKind::Opening,
                    i if i == last => SectionKind::Ending,
                    _ => SectionKind::Corner,
                };
                Section::new(kind, format!("Section {}", i + 1), chunks.iter().copied())
            })
            .collect(),
    )
}

/// Settings with a default background track at 40% volume.
pub fn settings() -> SessionSettings {
    let music = MusicLibrary {
        default_track: Some("music/default.mp3".into()),
        ..MusicLibrary::default()
    };
    SessionSettings::default()
        .with_voice("alto")
        .with_music_volume(40)
        .with_music(music)
}
