use crate::error::AudioError;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

const RESAMPLER_CHUNK_IN: usize = 1024;

/// Averages interleaved frames into a single channel.
pub fn downmix_interleaved(samples: &[f32], channels: usize) -> Result<Vec<f32>, AudioError> {
    match channels {
        0 => Err(AudioError::InvalidChannelCount(0)),
        1 => Ok(samples.to_vec()),
        n => Ok(samples
            .chunks_exact(n)
            .map(|frame| frame.iter().copied().sum::<f32>() / n as f32)
            .collect()),
    }
}

/// Converts a whole mono buffer from `from_rate` to `to_rate`.
pub fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AudioError> {
    if from_rate == 0 {
        return Err(AudioError::InvalidSampleRate(from_rate));
    }
    if to_rate == 0 {
        return Err(AudioError::InvalidSampleRate(to_rate));
    }
    if from_rate == to_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    log::debug!("Configuring resampler: {} Hz -> {} Hz", from_rate, to_rate);

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLER_CHUNK_IN, 1)
        .map_err(|e| AudioError::ResamplerCreation(e.to_string()))?;

    let expected = (input.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected + delay + RESAMPLER_CHUNK_IN);

    let mut pos = 0;
    while input.len() - pos >= resampler.input_frames_next() {
        let n = resampler.input_frames_next();
        let chunk = [&input[pos..pos + n]];
        let out = resampler
            .process(&chunk[..], None)
            .map_err(|e| AudioError::ResamplerProcessing(e.to_string()))?;
        output.extend_from_slice(&out[0]);
        pos += n;
    }

    if pos < input.len() {
        let chunk = [&input[pos..]];
        let out = resampler
            .process_partial(Some(&chunk[..]), None)
            .map_err(|e| AudioError::ResamplerProcessing(e.to_string()))?;
        output.extend_from_slice(&out[0]);
    }

    // Flush the filter tail until the delayed output covers the whole input.
    while output.len() < expected + delay {
        let out = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| AudioError::ResamplerProcessing(e.to_string()))?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected);
    Ok(output)
}
