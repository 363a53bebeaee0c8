//! WAV encoding of generated waveforms

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use tracing::debug;

use crate::error::{Error, Result};

pub const WAV_CONTENT_TYPE: &str = "audio/wav";

/// Bits per sample written by the encoder
const BITS_PER_SAMPLE: u16 = 16;

/// Encodes f32 samples in [-1.0, 1.0] to 16-bit PCM WAV
#[derive(Debug, Clone, Copy)]
pub struct AudioEncoder {
    sample_rate: u32,
    channels: u16,
}

impl AudioEncoder {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Mono encoder, the layout the model produces
    pub fn mono(sample_rate: u32) -> Self {
        Self::new(sample_rate, 1)
    }

    pub fn encode_wav(&self, samples: &[f32]) -> Result<Vec<u8>> {
        if self.sample_rate == 0 {
            return Err(Error::AudioError("Sample rate must be positive".to_string()));
        }

        let spec = WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: BITS_PER_SAMPLE,
            sample_format: SampleFormat::Int,
        };

        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut buffer, spec)?;
            for &sample in samples {
                writer.write_sample(to_i16(sample))?;
            }
            writer.finalize()?;
        }

        debug!(
            "Encoded {} samples to WAV ({} bytes)",
            samples.len(),
            buffer.get_ref().len()
        );
        Ok(buffer.into_inner())
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

fn to_i16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// Header facts about an encoded WAV stream
#[derive(Debug, Clone, PartialEq)]
pub struct WavSummary {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub frames: u32,
    pub duration_secs: f32,
}

/// Parse a WAV byte stream and report its layout.
pub fn inspect_wav(bytes: &[u8]) -> Result<WavSummary> {
    let reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| Error::AudioError(format!("Failed to parse WAV: {}", e)))?;
    let spec = reader.spec();
    let frames = reader.duration();

    Ok(WavSummary {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        frames,
        duration_secs: frames as f32 / spec.sample_rate as f32,
    })
}

/// Decode 16-bit PCM WAV bytes back to f32 samples.
pub fn decode_wav(bytes: &[u8]) -> Result<Vec<f32>> {
    let mut reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| Error::AudioError(format!("Failed to parse WAV: {}", e)))?;
    let spec = reader.spec();

    match spec.sample_format {
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val).map_err(Error::from))
                .collect()
        }
        SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map_err(Error::from))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect()
    }

    #[test]
    fn encoding_is_deterministic() {
        let encoder = AudioEncoder::mono(24_000);
        let samples = tone(2_400);
        let a = encoder.encode_wav(&samples).unwrap();
        let b = encoder.encode_wav(&samples).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn header_reflects_mono_16_bit() {
        let bytes = AudioEncoder::mono(24_000).encode_wav(&tone(12_000)).unwrap();
        let summary = inspect_wav(&bytes).unwrap();
        assert_eq!(summary.sample_rate, 24_000);
        assert_eq!(summary.channels, 1);
        assert_eq!(summary.bits_per_sample, 16);
        assert_eq!(summary.frames, 12_000);
        assert!((summary.duration_secs - 0.5).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        let bytes = AudioEncoder::mono(16_000)
            .encode_wav(&[2.0, -3.0, f32::NAN])
            .unwrap();
        let decoded = decode_wav(&bytes).unwrap();
        assert!((decoded[0] - 32767.0 / 32768.0).abs() < 1e-6);
        assert!((decoded[1] + 32767.0 / 32768.0).abs() < 1e-6);
        assert_eq!(decoded[2], 0.0);
    }

    #[test]
    fn zero_sample_rate_is_rejected() {
        assert!(matches!(
            AudioEncoder::mono(0).encode_wav(&[0.0]),
            Err(Error::AudioError(_))
        ));
    }

    #[test]
    fn garbage_is_not_a_wav() {
        assert!(inspect_wav(b"definitely not riff").is_err());
    }
}
