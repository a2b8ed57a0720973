//! Channel mixing and sample-rate conversion.
//!
//! Whisper wants **16 kHz mono `f32`**.  Capture devices usually deliver
//! 44.1 or 48 kHz, often stereo, so every recording passes through
//! [`stereo_to_mono`] and then [`resample_to_16k`].

use rubato::{FftFixedIn, Resampler};

use super::AudioError;

/// Rate the speech-to-text engine expects.
pub const TARGET_RATE: u32 = 16_000;

/// Input frames handed to the FFT resampler per call.
const CHUNK_FRAMES: usize = 1024;

/// Average interleaved channels down to mono.
///
/// ```rust
/// use roverseer::audio::stereo_to_mono;
///
/// let mono = stereo_to_mono(&[0.5_f32, -0.5, 0.2, 0.4], 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = usize::from(n);
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Resample mono `samples` from `source_rate` to 16 kHz.
///
/// Uses rubato's synchronous FFT resampler.  The resampler's output delay is
/// trimmed so the result lines up with the input, and the length is
/// `samples.len() * 16000 / source_rate` (rounded down).
pub fn resample_to_16k(samples: &[f32], source_rate: u32) -> Result<Vec<f32>, AudioError> {
    if source_rate == TARGET_RATE {
        return Ok(samples.to_vec());
    }
    if samples.is_empty() || source_rate == 0 {
        return Ok(Vec::new());
    }

    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        TARGET_RATE as usize,
        CHUNK_FRAMES,
        2,
        1,
    )
    .map_err(|e| AudioError::Resample(e.to_string()))?;

    let expected = (samples.len() as u64 * u64::from(TARGET_RATE) / u64::from(source_rate)) as usize;
    let delay = resampler.output_delay();
    let mut out: Vec<f32> = Vec::with_capacity(expected + delay + CHUNK_FRAMES);

    let mut pos = 0;
    while samples.len() - pos >= resampler.input_frames_next() {
        let n = resampler.input_frames_next();
        let input: [&[f32]; 1] = [&samples[pos..pos + n]];
        let chunk = resampler
            .process(&input[..], None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        out.extend_from_slice(&chunk[0]);
        pos += n;
    }

    if pos < samples.len() {
        let input: [&[f32]; 1] = [&samples[pos..]];
        let chunk = resampler
            .process_partial(Some(&input[..]), None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        out.extend_from_slice(&chunk[0]);
    }

    // Flush what is still buffered inside the resampler.
    while out.len() < expected + delay {
        let chunk = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        if chunk[0].is_empty() {
            break;
        }
        out.extend_from_slice(&chunk[0]);
    }

    out.drain(..delay.min(out.len()));
    out.truncate(expected);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
