//! WAV file I/O via `hound`.
//!
//! The recorder writes mono 16 kHz PCM16 clips; the transcriber reads them
//! back.  Reading accepts 16-bit integer or 32-bit float files with any
//! channel count and averages the channels down to mono.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::AudioError;

/// Decoded WAV contents, channels downmixed.
#[derive(Debug, Clone, PartialEq)]
pub struct WavData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Write `samples` (mono, `[-1.0, 1.0]`) as a PCM16 WAV file.
pub fn write_pcm16_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), AudioError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for s in samples {
        let v = (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
        writer.write_sample(v)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Read a WAV file, averaging channels to mono.
pub fn read_wav_mono_f32(path: &Path) -> Result<WavData, AudioError> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .map(|s| s.map(|v| f32::from(v) / f32::from(i16::MAX)))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Float, 32) => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        (format, bits) => {
            return Err(AudioError::Format(format!(
                "unsupported encoding ({format:?}, {bits} bits)"
            )))
        }
    };

    let channels = usize::from(spec.channels.max(1));
    let samples = interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    Ok(WavData {
        samples,
        sample_rate: spec.sample_rate,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_is_mono_16k_pcm16() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        write_pcm16_wav(&path, &[0.0; 100], 16_000).unwrap();

        let reader = WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, SampleFormat::Int);
        assert_eq!(reader.len(), 100);
    }

    #[test]
    fn samples_survive_within_quantisation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.wav");
        let input = [0.0, 0.5, -0.5, 1.0, -1.0];
        write_pcm16_wav(&path, &input, 16_000).unwrap();

        let wav = read_wav_mono_f32(&path).unwrap();
        assert_eq!(wav.sample_rate, 16_000);
        assert_eq!(wav.samples.len(), input.len());
        for (a, b) in input.iter().zip(&wav.samples) {
            assert!((a - b).abs() < 1e-4, "{a} vs {b}");
        }
    }

    #[test]
    fn stereo_is_downmixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 48_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        // one frame: L = 0x4000, R = 0
        writer.write_sample(0x4000i16).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.finalize().unwrap();

        let wav = read_wav_mono_f32(&path).unwrap();
        assert_eq!(wav.sample_rate, 48_000);
        assert_eq!(wav.samples.len(), 1);
        assert!((wav.samples[0] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn unsupported_bit_depth_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("8bit.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 8,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0i8).unwrap();
        writer.finalize().unwrap();

        assert!(matches!(read_wav_mono_f32(&path), Err(AudioError::Format(_))));
    }

    #[test]
    fn garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.wav");
        std::fs::write(&path, b"not audio at all").unwrap();
        assert!(matches!(read_wav_mono_f32(&path), Err(AudioError::Wav(_))));
    }
}
