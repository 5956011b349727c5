//! Audio outputs on the default device, backed by rodio.
//!
//! `rodio::OutputStream` is `!Send` on some platforms, so the stream and both
//! sinks live on a dedicated OS thread. [`RodioSpeechOutput`] and
//! [`RodioMusicOutput`] are `Send + Sync` proxies that route every call
//! through a command channel to that thread and block for the reply.
//!
//! End of media is detected by a watcher thread per loaded item that blocks
//! in `Sink::sleep_until_end`. A watcher only reports `Ended` when its
//! generation is still the live one, so stopped or replaced media stays
//! silent.

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use onair_core::{
    AudioHandle, LoadedMedia, MusicOutput, MusicTrack, OutputError, OutputEvent, OutputNotice,
    SpeechOutput,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lane {
    Speech,
    Music,
}

type Reply<T> = mpsc::Sender<Result<T, OutputError>>;

enum AudioCommand {
    LoadClip {
        clip: AudioHandle,
        reply: Reply<LoadedMedia>,
    },
    LoadTrack {
        track: MusicTrack,
        looping: bool,
        reply: Reply<u64>,
    },
    Play {
        lane: Lane,
        reply: Reply<()>,
    },
    Pause {
        lane: Lane,
        reply: Reply<()>,
    },
    Stop {
        lane: Lane,
    },
    SetRate {
        rate: f32,
    },
    SetVolume {
        lane: Lane,
        volume: f32,
    },
    Shutdown,
}

/// Handle to the audio thread shared by both outputs.
struct AudioThread {
    cmd_tx: mpsc::Sender<AudioCommand>,
    thread: Option<thread::JoinHandle<()>>,
}

impl AudioThread {
    fn spawn(
        speech_tx: UnboundedSender<OutputNotice>,
        music_tx: UnboundedSender<OutputNotice>,
    ) -> Result<Self, OutputError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<AudioCommand>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), OutputError>>();

        let thread = thread::Builder::new()
            .name("onair-audio".into())
            .spawn(move || run(cmd_rx, init_tx, speech_tx, music_tx))
            .map_err(|e| OutputError::Device(format!("failed to spawn audio thread: {e}")))?;

        init_rx.recv().map_err(|_| thread_died())??;

        Ok(Self {
            cmd_tx,
            thread: Some(thread),
        })
    }

    fn request<T>(&self, build: impl FnOnce(Reply<T>) -> AudioCommand) -> Result<T, OutputError> {
        let (tx, rx) = mpsc::channel();
        self.cmd_tx.send(build(tx)).map_err(|_| thread_died())?;
        rx.recv().map_err(|_| thread_died())?
    }

    fn send(&self, command: AudioCommand) {
        if self.cmd_tx.send(command).is_err() {
            tracing::debug!("Audio thread gone, command dropped");
        }
    }
}

impl Drop for AudioThread {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(AudioCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

fn thread_died() -> OutputError {
    OutputError::Device("audio thread is not running".to_string())
}

/// Open the default output device.
///
/// Returns the speech and music outputs together with their notice
/// channels.
pub fn open_default_outputs() -> Result<DeviceOutputs, OutputError> {
    let (speech_tx, speech_notices) = unbounded_channel();
    let (music_tx, music_notices) = unbounded_channel();
    let thread = Arc::new(AudioThread::spawn(speech_tx, music_tx)?);

    Ok(DeviceOutputs {
        speech: RodioSpeechOutput {
            thread: Arc::clone(&thread),
        },
        speech_notices,
        music: RodioMusicOutput {
            thread,
            volume: AtomicU32::new(1.0_f32.to_bits()),
        },
        music_notices,
    })
}

/// Both outputs of one device.
pub struct DeviceOutputs {
    pub speech: RodioSpeechOutput,
    pub speech_notices: UnboundedReceiver<OutputNotice>,
    pub music: RodioMusicOutput,
    pub music_notices: UnboundedReceiver<OutputNotice>,
}

pub struct RodioSpeechOutput {
    thread: Arc<AudioThread>,
}

impl SpeechOutput for RodioSpeechOutput {
    fn load(&self, clip: &AudioHandle) -> Result<LoadedMedia, OutputError> {
        self.thread.request(|reply| AudioCommand::LoadClip {
            clip: Arc::clone(clip),
            reply,
        })
    }

    fn play(&self) -> Result<(), OutputError> {
        self.thread.request(|reply| AudioCommand::Play {
            lane: Lane::Speech,
            reply,
        })
    }

    fn pause(&self) -> Result<(), OutputError> {
        self.thread.request(|reply| AudioCommand::Pause {
            lane: Lane::Speech,
            reply,
        })
    }

    fn stop(&self) {
        self.thread.send(AudioCommand::Stop { lane: Lane::Speech });
    }

    fn set_rate(&self, rate: f32) {
        self.thread.send(AudioCommand::SetRate { rate });
    }

    fn set_volume(&self, volume: f32) {
        self.thread.send(AudioCommand::SetVolume {
            lane: Lane::Speech,
            volume,
        });
    }
}

pub struct RodioMusicOutput {
    thread: Arc<AudioThread>,
    volume: AtomicU32,
}

impl MusicOutput for RodioMusicOutput {
    fn load(&self, track: &MusicTrack, looping: bool) -> Result<u64, OutputError> {
        self.thread.request(|reply| AudioCommand::LoadTrack {
            track: track.clone(),
            looping,
            reply,
        })
    }

    fn play(&self) -> Result<(), OutputError> {
        self.thread.request(|reply| AudioCommand::Play {
            lane: Lane::Music,
            reply,
        })
    }

    fn stop(&self) {
        self.thread.send(AudioCommand::Stop { lane: Lane::Music });
    }

    fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.volume.store(volume.to_bits(), Ordering::Relaxed);
        self.thread.send(AudioCommand::SetVolume {
            lane: Lane::Music,
            volume,
        });
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }
}

// ── Audio thread ───────────────────────────────────────────────────

/// One sink slot and the settings that carry over to the next media.
struct SinkSlot {
    sink: Option<Arc<Sink>>,
    generation: u64,
    /// Generation currently loaded, zero when nothing is.
    live: Arc<AtomicU64>,
    volume: f32,
    rate: f32,
    notices: UnboundedSender<OutputNotice>,
}

impl SinkSlot {
    fn new(notices: UnboundedSender<OutputNotice>) -> Self {
        Self {
            sink: None,
            generation: 0,
            live: Arc::new(AtomicU64::new(0)),
            volume: 1.0,
            rate: 1.0,
            notices,
        }
    }

    /// Replace the current sink with a fresh, paused one.
    fn replace(&mut self, stream: &OutputStreamHandle) -> Result<(Arc<Sink>, u64), OutputError> {
        self.stop();
        let sink = Sink::try_new(stream).map_err(|e| OutputError::Device(e.to_string()))?;
        sink.pause();
        sink.set_volume(self.volume);
        sink.set_speed(self.rate);

        self.generation += 1;
        self.live.store(self.generation, Ordering::SeqCst);
        let sink = Arc::new(sink);
        self.sink = Some(Arc::clone(&sink));
        Ok((sink, self.generation))
    }

    fn watch_end(&self, sink: Arc<Sink>, generation: u64) {
        let live = Arc::clone(&self.live);
        let notices = self.notices.clone();
        thread::spawn(move || {
            sink.sleep_until_end();
            if live.load(Ordering::SeqCst) == generation {
                let _ = notices.send(OutputNotice::new(generation, OutputEvent::Ended));
            }
        });
    }

    fn play(&self) -> Result<(), OutputError> {
        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| OutputError::Rejected("nothing loaded".to_string()))?;
        sink.play();
        Ok(())
    }

    fn pause(&self) -> Result<(), OutputError> {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.live.store(0, Ordering::SeqCst);
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
    }

    fn set_rate(&mut self, rate: f32) {
        self.rate = rate.max(0.1);
        if let Some(sink) = &self.sink {
            sink.set_speed(self.rate);
        }
    }
}

fn run(
    cmd_rx: mpsc::Receiver<AudioCommand>,
    init_tx: mpsc::Sender<Result<(), OutputError>>,
    speech_tx: UnboundedSender<OutputNotice>,
    music_tx: UnboundedSender<OutputNotice>,
) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = init_tx.send(Err(OutputError::Device(e.to_string())));
            return;
        }
    };
    if init_tx.send(Ok(())).is_err() {
        return;
    }
    tracing::info!("Audio output initialized on default device");

    let mut speech = SinkSlot::new(speech_tx);
    let mut music = SinkSlot::new(music_tx);

    while let Ok(command) = cmd_rx.recv() {
        match command {
            AudioCommand::LoadClip { clip, reply } => {
                let _ = reply.send(load_clip(&mut speech, &handle, &clip));
            }
            AudioCommand::LoadTrack {
                track,
                looping,
                reply,
            } => {
                let _ = reply.send(load_track(&mut music, &handle, &track, looping));
            }
            AudioCommand::Play { lane, reply } => {
                let slot = if lane == Lane::Speech { &speech } else { &music };
                let _ = reply.send(slot.play());
            }
            AudioCommand::Pause { lane, reply } => {
                let slot = if lane == Lane::Speech { &speech } else { &music };
                let _ = reply.send(slot.pause());
            }
            AudioCommand::Stop { lane } => match lane {
                Lane::Speech => speech.stop(),
                Lane::Music => music.stop(),
            },
            AudioCommand::SetRate { rate } => speech.set_rate(rate),
            AudioCommand::SetVolume { lane, volume } => match lane {
                Lane::Speech => speech.set_volume(volume),
                Lane::Music => music.set_volume(volume),
            },
            AudioCommand::Shutdown => break,
        }
    }

    speech.stop();
    music.stop();
    tracing::debug!("Audio thread shutting down");
}

fn load_clip(
    slot: &mut SinkSlot,
    stream: &OutputStreamHandle,
    clip: &AudioHandle,
) -> Result<LoadedMedia, OutputError> {
    let source = Decoder::new(Cursor::new(clip.data.clone()))
        .map_err(|e| OutputError::Decode(e.to_string()))?;
    let duration = source.total_duration();
    let (sink, generation) = slot.replace(stream)?;
    sink.append(source);
    slot.watch_end(sink, generation);
    Ok(LoadedMedia {
        generation,
        duration,
    })
}

fn load_track(
    slot: &mut SinkSlot,
    stream: &OutputStreamHandle,
    track: &MusicTrack,
    looping: bool,
) -> Result<u64, OutputError> {
    let open = || {
        File::open(&track.path)
            .map(BufReader::new)
            .map_err(|e| OutputError::Decode(format!("{}: {e}", track.path.display())))
    };

    if looping {
        let source = Decoder::new_looped(open()?).map_err(|e| OutputError::Decode(e.to_string()))?;
        let (sink, generation) = slot.replace(stream)?;
        sink.append(source);
        Ok(generation)
    } else {
        let source = Decoder::new(open()?).map_err(|e| OutputError::Decode(e.to_string()))?;
        let (sink, generation) = slot.replace(stream)?;
        sink.append(source);
        slot.watch_end(sink, generation);
        Ok(generation)
    }
}
