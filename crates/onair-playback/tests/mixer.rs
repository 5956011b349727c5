//! Background mixer: track selection, ducking ramps and rotation.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use common::{FakeMusicOutput, mixer_config};
use onair_core::{MusicLibrary, SessionSettings};
use onair_playback::{BackgroundMixer, MixerConfig};
use tokio::time::Instant;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

fn mixer_with(config: MixerConfig) -> (BackgroundMixer, Arc<FakeMusicOutput>) {
    let (music, notices) = FakeMusicOutput::new();
    (BackgroundMixer::new(music.clone(), notices, config), music)
}

fn mixer() -> (BackgroundMixer, Arc<FakeMusicOutput>) {
    mixer_with(mixer_config())
}

fn library() -> MusicLibrary {
    MusicLibrary {
        category_tracks: BTreeMap::from([("news".to_string(), "music/news.mp3".into())]),
        default_track: Some("music/default.mp3".into()),
        uploaded: Vec::new(),
    }
}

fn settings(volume: u8, music: MusicLibrary) -> SessionSettings {
    SessionSettings::default()
        .with_music_volume(volume)
        .with_music(music)
}

#[tokio::test(start_paused = true)]
async fn category_track_loops_at_base_volume() {
    let (mixer, music) = mixer();

    let track = mixer.start(&settings(40, library()), Some("News")).unwrap();

    assert_eq!(track.map(|t| t.name), Some("news".to_string()));
    assert_eq!(music.loads(), vec![("news".to_string(), true)]);
    assert!(music.is_playing());
    assert!(approx(music.current_volume(), 0.4));
    assert!(mixer.is_active());
}

#[tokio::test(start_paused = true)]
async fn unknown_category_falls_back_to_default_track() {
    let (mixer, music) = mixer();

    mixer.start(&settings(40, library()), Some("sports")).unwrap();
    mixer.stop();
    mixer.start(&settings(40, library()), None).unwrap();

    assert_eq!(
        music.loads(),
        vec![("default".to_string(), true), ("default".to_string(), true)]
    );
}

#[tokio::test(start_paused = true)]
async fn zero_volume_or_empty_library_disables_music() {
    let (mixer, music) = mixer();

    assert_eq!(mixer.start(&settings(0, library()), Some("news")).unwrap(), None);
    assert_eq!(
        mixer
            .start(&settings(40, MusicLibrary::default()), Some("news"))
            .unwrap(),
        None
    );
    assert!(music.loads().is_empty());
    assert!(!mixer.is_active());
}

#[tokio::test(start_paused = true)]
async fn platform_attenuation_scales_the_base_volume() {
    let (mixer, music) = mixer_with(MixerConfig {
        attenuation: 0.5,
        ..MixerConfig::default()
    });

    mixer.start(&settings(40, library()), None).unwrap();

    assert!(approx(mixer.base_volume(), 0.2));
    assert!(approx(music.current_volume(), 0.2));
}

#[tokio::test(start_paused = true)]
async fn duck_ramps_down_to_a_quarter_over_300ms() {
    let (mixer, music) = mixer();
    mixer.start(&settings(40, library()), None).unwrap();
    let start = Instant::now();

    mixer.duck();
    tokio::time::sleep(Duration::from_millis(150)).await;
    let midway = music.current_volume();
    assert!(midway < 0.4 && midway > 0.1, "midway volume {midway}");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(approx(music.current_volume(), 0.1));
    assert!(mixer.is_ducked());

    let ramp: Vec<_> = music
        .volume_history()
        .into_iter()
        .filter(|(at, _)| *at > start)
        .collect();
    assert!(ramp.windows(2).all(|w| w[1].1 <= w[0].1));
    let (last_at, _) = ramp.last().copied().unwrap();
    assert_eq!(last_at - start, Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn unduck_ramps_back_up_over_200ms() {
    let (mixer, music) = mixer();
    mixer.start(&settings(40, library()), None).unwrap();
    mixer.duck();
    tokio::time::sleep(Duration::from_millis(400)).await;
    let start = Instant::now();

    mixer.unduck();
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert!(approx(music.current_volume(), 0.4));
    assert!(!mixer.is_ducked());
    let (last_at, _) = music.volume_history().last().copied().unwrap();
    assert_eq!(last_at - start, Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn a_new_fade_replaces_the_running_one() {
    let (mixer, music) = mixer();
    mixer.start(&settings(40, library()), None).unwrap();

    mixer.duck();
    tokio::time::sleep(Duration::from_millis(100)).await;
    mixer.unduck();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(approx(music.current_volume(), 0.4));
}

#[tokio::test(start_paused = true)]
async fn duck_without_music_is_a_no_op() {
    let (mixer, music) = mixer();

    mixer.duck();
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(music.volume_history().is_empty());
    assert!(!mixer.is_ducked());
}

#[tokio::test(start_paused = true)]
async fn uploaded_tracks_rotate_when_one_ends() {
    let (mixer, music) = mixer();
    let uploads = MusicLibrary {
        uploaded: vec!["up/a.mp3".into(), "up/b.mp3".into(), "up/c.mp3".into()],
        ..library()
    };
    mixer.start(&settings(40, uploads), Some("news")).unwrap();

    for _ in 0..2 {
        music.finish_track();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let loads = music.loads();
    assert_eq!(loads.len(), 3);
    assert!(loads.iter().all(|(name, looping)| !looping && name != "news"));
    assert!(loads.windows(2).all(|w| w[0].0 != w[1].0));
    assert!(music.is_playing());
}

#[tokio::test(start_paused = true)]
async fn stop_halts_music_and_fades() {
    let (mixer, music) = mixer();
    mixer.start(&settings(40, library()), None).unwrap();
    mixer.duck();
    tokio::time::sleep(Duration::from_millis(100)).await;

    mixer.stop();
    let frozen = music.current_volume();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(!music.is_playing());
    assert!(!mixer.is_active());
    assert!(approx(music.current_volume(), frozen));
    assert_eq!(music.stop_count(), 1);
}
