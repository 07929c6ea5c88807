use std::fs::File;
use std::path::Path;

use symphonia::core::{
    audio::SampleBuffer,
    codecs::{CODEC_TYPE_NULL, DecoderOptions},
    errors::Error,
    formats::{FormatOptions, Track},
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};

use super::AudioError;

/// Raw decoded audio in interleaved `f32` samples.
#[derive(Debug)]
pub(crate) struct DecodedAudio {
    pub(crate) samples: Vec<f32>,
    pub(crate) sample_rate: u32,
    pub(crate) channels: u16,
}

/// Decode a whole file at its native rate and channel layout.
pub(crate) fn decode_audio(path: &Path) -> Result<DecodedAudio, AudioError> {
    let decoded = if is_wav(path) {
        decode_with_hound(path)?
    } else {
        decode_with_symphonia(path)?
    };
    if decoded.samples.is_empty() {
        return Err(AudioError::Empty {
            path: path.to_path_buf(),
        });
    }
    tracing::debug!(
        "Decoded {} ({} Hz, {} ch, {} samples)",
        path.display(),
        decoded.sample_rate,
        decoded.channels,
        decoded.samples.len()
    );
    Ok(decoded)
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

fn decode_with_hound(path: &Path) -> Result<DecodedAudio, AudioError> {
    let decode_err = |message: String| AudioError::Decode {
        path: path.to_path_buf(),
        message,
    };
    let mut reader =
        hound::WavReader::open(path).map_err(|err| decode_err(format!("WAV open: {err}")))?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| decode_err(format!("WAV read: {err}")))?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 * scale))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| decode_err(format!("WAV read: {err}")))?
        }
    };
    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate.max(1),
        channels: spec.channels.max(1),
    })
}

fn decode_with_symphonia(path: &Path) -> Result<DecodedAudio, AudioError> {
    let decode_err = |message: String| AudioError::Decode {
        path: path.to_path_buf(),
        message,
    };
    let file = File::open(path).map_err(|source| AudioError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| decode_err(format!("probe failed: {err}")))?;
    let mut format = probed.format;
    let track = first_audio_track(format.tracks())
        .ok_or_else(|| decode_err("no audio track".into()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| decode_err("missing sample rate".into()))?;
    let channels = codec_params
        .channels
        .ok_or_else(|| decode_err("missing channel count".into()))?
        .count() as u16;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|err| decode_err(format!("decoder setup failed: {err}")))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(_)) => break,
            Err(err) => return Err(decode_err(format!("packet read failed: {err}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let audio_buf = match decoder.decode(&packet) {
            Ok(audio_buf) => audio_buf,
            Err(Error::DecodeError(_)) => continue,
            Err(err) => return Err(decode_err(format!("decode failed: {err}"))),
        };
        let spec = *audio_buf.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(audio_buf.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(audio_buf);
        samples.extend_from_slice(sample_buf.samples());
    }

    Ok(DecodedAudio {
        samples,
        sample_rate: sample_rate.max(1),
        channels: channels.max(1),
    })
}

/// Containers such as MP4 list video tracks too, often ahead of the audio.
fn first_audio_track(tracks: &[Track]) -> Option<&Track> {
    tracks
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use tempfile::TempDir;

    #[test]
    fn int_wav_is_scaled_to_unit_range() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("int.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample::<i16>(i16::MIN).unwrap();
        writer.write_sample::<i16>(16_384).unwrap();
        writer.finalize().unwrap();

        let decoded = decode_audio(&path).unwrap();
        assert_eq!(decoded.sample_rate, 8_000);
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.samples, vec![-1.0, 0.5]);
    }

    #[test]
    fn empty_wav_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        WavWriter::create(&path, spec).unwrap().finalize().unwrap();

        let err = decode_audio(&path).unwrap_err();
        assert!(matches!(err, AudioError::Empty { .. }));
    }

    fn atom(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out
    }

    /// Atom with a zero version/flags prefix.
    fn full_atom(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; 4];
        data.extend_from_slice(body);
        atom(kind, &data)
    }

    fn words(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    struct TrackLayout<'a> {
        id: u32,
        handler: &'a [u8; 4],
        timescale: u32,
        sample_entry: Vec<u8>,
        sample_count: u32,
        sample_size: u32,
        chunk_offset: u32,
    }

    fn trak(layout: &TrackLayout) -> Vec<u8> {
        let mut tkhd = words(&[0, 0, layout.id, 0, layout.sample_count]);
        tkhd.extend_from_slice(&[0u8; 60]);
        let mut mdhd = words(&[0, 0, layout.timescale, layout.sample_count]);
        mdhd.extend_from_slice(&[0x55, 0xc4, 0, 0]);
        let mut hdlr = words(&[0]);
        hdlr.extend_from_slice(layout.handler);
        hdlr.extend_from_slice(&[0u8; 13]);
        let mut stsd = words(&[1]);
        stsd.extend_from_slice(&layout.sample_entry);

        let stbl = [
            full_atom(b"stsd", &stsd),
            full_atom(b"stts", &words(&[1, layout.sample_count, 1])),
            full_atom(b"stsc", &words(&[1, 1, layout.sample_count, 1])),
            full_atom(b"stsz", &words(&[layout.sample_size, layout.sample_count])),
            full_atom(b"stco", &words(&[1, layout.chunk_offset])),
        ]
        .concat();
        let minf = atom(b"stbl", &stbl);
        let mdia = [
            full_atom(b"mdhd", &mdhd),
            full_atom(b"hdlr", &hdlr),
            atom(b"minf", &minf),
        ]
        .concat();
        atom(b"trak", &[full_atom(b"tkhd", &tkhd), atom(b"mdia", &mdia)].concat())
    }

    /// MP4 with a one-frame video track listed before a mono 16-bit PCM track.
    fn video_first_mp4(sample_rate: u32, pcm: &[i16]) -> Vec<u8> {
        let ftyp = atom(b"ftyp", b"isom\0\0\0\0isom");
        let video_frame = [0u8; 4];
        let mut payload = video_frame.to_vec();
        payload.extend(pcm.iter().flat_map(|s| s.to_le_bytes()));
        let mdat = atom(b"mdat", &payload);
        let data_start = (ftyp.len() + 8) as u32;

        let mut audio_entry = vec![0u8; 6];
        audio_entry.extend_from_slice(&[0, 1, 0, 0]);
        audio_entry.extend_from_slice(&[0u8; 6]);
        audio_entry.extend_from_slice(&[0, 1, 0, 16, 0, 0, 0, 0]);
        audio_entry.extend_from_slice(&(sample_rate << 16).to_be_bytes());

        let video = trak(&TrackLayout {
            id: 1,
            handler: b"vide",
            timescale: 1_000,
            sample_entry: atom(b"avc1", &[0u8; 78]),
            sample_count: 1,
            sample_size: video_frame.len() as u32,
            chunk_offset: data_start,
        });
        let audio = trak(&TrackLayout {
            id: 2,
            handler: b"soun",
            timescale: sample_rate,
            sample_entry: atom(b"sowt", &audio_entry),
            sample_count: pcm.len() as u32,
            sample_size: 2,
            chunk_offset: data_start + video_frame.len() as u32,
        });
        let mut mvhd = words(&[0, 0, 1_000, 100, 0x0001_0000]);
        mvhd.extend_from_slice(&[1, 0]);
        mvhd.extend_from_slice(&[0u8; 70]);
        let moov = atom(b"moov", &[full_atom(b"mvhd", &mvhd), video, audio].concat());

        [ftyp, mdat, moov].concat()
    }

    #[test]
    fn mp4_audio_track_is_found_behind_video_track() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, video_first_mp4(44_100, &vec![16_384_i16; 4_410])).unwrap();

        let decoded = decode_audio(&path).unwrap();
        assert_eq!(decoded.sample_rate, 44_100);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.samples.len(), 4_410);
        assert!(decoded.samples.iter().all(|v| (v - 0.5).abs() < 1e-6));
    }

    #[test]
    fn mp4_with_video_first_loads_as_mono() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, video_first_mp4(44_100, &vec![0_i16; 4_410])).unwrap();

        let samples = crate::audio::load_mono(&path, 44_100).unwrap();
        assert_eq!(samples.len(), 4_410);
    }

    #[test]
    fn garbage_file_fails_to_decode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(matches!(
            decode_audio(&path).unwrap_err(),
            AudioError::Decode { .. }
        ));
    }
}
