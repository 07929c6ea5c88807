use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::AudioError;

const CHUNK_FRAMES: usize = 1024;

/// Band-limited resampling of a mono signal.
///
/// The output holds `ceil(len * output_rate / input_rate)` samples, aligned
/// with the input (the sinc filter delay is removed).
pub(crate) fn resample_mono(
    samples: &[f32],
    input_rate: u32,
    output_rate: u32,
) -> Result<Vec<f32>, AudioError> {
    if input_rate == 0 || output_rate == 0 {
        return Err(AudioError::InvalidRate {
            input_rate,
            output_rate,
        });
    }
    if samples.is_empty() || input_rate == output_rate {
        return Ok(samples.to_vec());
    }
    let fail = |message: String| AudioError::Resample {
        input_rate,
        output_rate,
        message,
    };

    let ratio = output_rate as f64 / input_rate as f64;
    let expected = resampled_len(samples.len(), input_rate, output_rate);
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_FRAMES, 1)
        .map_err(|err| fail(err.to_string()))?;
    let delay = resampler.output_delay();

    let mut out = Vec::with_capacity(expected + delay);
    let mut pos = 0usize;
    while pos + resampler.input_frames_next() <= samples.len() {
        let next = resampler.input_frames_next();
        let frames = resampler
            .process(&[&samples[pos..pos + next]], None)
            .map_err(|err| fail(err.to_string()))?;
        out.extend_from_slice(&frames[0]);
        pos += next;
    }
    if pos < samples.len() {
        let frames = resampler
            .process_partial(Some(&[&samples[pos..]][..]), None)
            .map_err(|err| fail(err.to_string()))?;
        out.extend_from_slice(&frames[0]);
    }
    // Flush the filter tail so the last input samples reach the output.
    while out.len() < expected + delay {
        let frames = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|err| fail(err.to_string()))?;
        if frames[0].is_empty() {
            break;
        }
        out.extend_from_slice(&frames[0]);
    }

    out.drain(..delay.min(out.len()));
    out.resize(expected, 0.0);
    Ok(out)
}

pub(crate) fn resampled_len(len: usize, input_rate: u32, output_rate: u32) -> usize {
    (len as u64 * output_rate as u64).div_ceil(input_rate.max(1) as u64) as usize
}
