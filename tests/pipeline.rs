//! End-to-end checks over WAV fixtures: normalization, both feature paths and
//! the feature cache.

mod support;

use coverprep::cache::{self, CACHE_ROWS, FeatureCache};
use coverprep::config::{AudioSettings, HarmonicSettings};
use coverprep::features::{
    self, ChromaChordEstimator, CqtTransform, PITCH_CLASSES, extract_spectral_from_file,
};
use coverprep::normalize_waveform;
use support::wav::{sine, write_test_wav};
use tempfile::tempdir;

#[test]
fn short_file_is_padded_to_full_duration() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("short.wav");
    let samples = sine(220.0, 22_050, 1.0, 0.5);
    write_test_wav(&path, 22_050, 1, &samples);

    let waveform = normalize_waveform(&path, 22_050, 3).unwrap();
    assert_eq!(waveform.len(), 22_050 * 3);
    assert_eq!(&waveform.samples()[..samples.len()], samples.as_slice());
    assert!(waveform.samples()[samples.len()..].iter().all(|&v| v == 0.0));
}

#[test]
fn stereo_file_is_resampled_and_mixed_down() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stereo.wav");
    let interleaved: Vec<f32> = (0..44_100).flat_map(|_| [0.2_f32, 0.4]).collect();
    write_test_wav(&path, 44_100, 2, &interleaved);

    let waveform = normalize_waveform(&path, 22_050, 2).unwrap();
    assert_eq!(waveform.len(), 44_100);
    let middle = &waveform.samples()[5_000..15_000];
    assert!(middle.iter().all(|v| (v - 0.3).abs() < 1e-2));
    assert!(waveform.samples()[23_000..].iter().all(|&v| v == 0.0));
}

#[test]
fn five_second_sine_gives_430_harmonic_frames() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sine.wav");
    write_test_wav(&path, 44_100, 1, &sine(440.0, 44_100, 5.0, 0.5));

    let harmonic = features::extract_harmonic(&path, 44_100, 512, &ChromaChordEstimator).unwrap();
    assert_eq!(harmonic.as_array().dim(), (430, PITCH_CLASSES));
    let row = harmonic.as_array().row(200);
    assert!((row[9] - 1.0).abs() < 1e-6, "A should dominate: {row:?}");
}

#[test]
fn spectral_features_cover_the_clamped_waveform() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_test_wav(&path, 16_000, 1, &sine(440.0, 16_000, 4.0, 0.1));
    let settings = AudioSettings {
        max_duration_seconds: 2,
        ..AudioSettings::default()
    };

    let spectral = extract_spectral_from_file(&path, &settings, &CqtTransform::default()).unwrap();
    assert_eq!(spectral.shape(), [1, 51, 96]);
    assert!(spectral.as_array().iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn accumulate_appends_and_persists_entries() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("songs").join("yesterday").join("take1.wav");
    let second = dir.path().join("songs").join("let_it_be").join("take1.wav");
    write_test_wav(&first, 44_100, 1, &sine(261.63, 44_100, 5.0, 0.5));
    write_test_wav(&second, 44_100, 1, &sine(392.0, 44_100, 2.0, 0.5));
    let out_dir = dir.path().join("features");
    let settings = HarmonicSettings::default();

    cache::accumulate(&first, &out_dir, "crema.json", None, &settings, &ChromaChordEstimator)
        .unwrap();
    let cache = cache::accumulate(
        &second,
        &out_dir,
        "crema.json",
        Some("custom"),
        &settings,
        &ChromaChordEstimator,
    )
    .unwrap();
    assert_eq!(cache.len(), 2);

    let reloaded = FeatureCache::load_or_empty(&out_dir.join("crema.json")).unwrap();
    assert_eq!(reloaded.labels(), &["yesterday".to_string(), "custom".to_string()]);
    assert_eq!(reloaded.data()[0].shape(), &[1, CACHE_ROWS, 430 / 8]);
    assert_eq!(reloaded.data()[1].shape(), &[1, CACHE_ROWS, 172 / 8]);
}

#[test]
fn cache_entry_does_not_touch_the_cache_file() {
    let dir = tempdir().unwrap();
    let audio = dir.path().join("album").join("song.wav");
    write_test_wav(&audio, 44_100, 1, &sine(330.0, 44_100, 1.0, 0.5));
    let settings = HarmonicSettings::default();

    let tensor = cache::harmonic_cache_entry(
        &audio,
        dir.path(),
        "crema.json",
        &settings,
        &ChromaChordEstimator,
    )
    .unwrap();
    assert_eq!(tensor.shape(), &[1, CACHE_ROWS, 86 / 8]);
    assert!(!dir.path().join("crema.json").exists());
}

#[test]
fn corrupt_cache_stops_accumulation() {
    let dir = tempdir().unwrap();
    let audio = dir.path().join("album").join("song.wav");
    write_test_wav(&audio, 44_100, 1, &sine(330.0, 44_100, 1.0, 0.5));
    std::fs::write(dir.path().join("crema.json"), b"{\"data\": 3}").unwrap();

    let err = cache::accumulate(
        &audio,
        dir.path(),
        "crema.json",
        None,
        &HarmonicSettings::default(),
        &ChromaChordEstimator,
    )
    .unwrap_err();
    assert!(matches!(err, cache::CacheError::Corrupt { .. }));
}
