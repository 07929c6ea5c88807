pub(super) fn default_general_sample_rate() -> u32 {
    22_050
}

pub(super) fn default_spectral_sample_rate() -> u32 {
    16_000
}

pub(super) fn default_max_duration_seconds() -> u32 {
    100
}

pub(super) fn default_max_file_megabytes() -> f64 {
    100.0
}

pub(super) fn default_max_media_seconds() -> f64 {
    20.0 * 60.0
}

pub(super) fn default_transcode_sample_rate() -> u32 {
    16_000
}

pub(super) fn default_ffmpeg_path() -> String {
    env_or("FFMPEG_PATH", "ffmpeg")
}

pub(super) fn default_ffprobe_path() -> String {
    env_or("FFPROBE_PATH", "ffprobe")
}

pub(super) fn default_harmonic_sample_rate() -> u32 {
    44_100
}

pub(super) fn default_hop_length() -> usize {
    512
}

pub(super) fn default_cache_stride() -> usize {
    8
}

pub(super) fn default_cache_file_name() -> String {
    "crema_features.json".to_string()
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}
