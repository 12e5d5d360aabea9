//! In-memory WAV encoding

use crate::error::{MarketError, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use std::time::Duration;

/// Encode `[-1, 1]` float samples as 16-bit PCM WAV
pub fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut buffer = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut buffer), spec)?;
        for &sample in samples {
            writer.write_sample(to_i16(sample))?;
        }
        writer.finalize()?;
    }
    Ok(buffer)
}

/// Decode WAV bytes into float samples plus the stream spec
pub fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, WavSpec)> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, _) => reader.into_samples::<f32>().collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .map(|s| s.map(|v| f32::from(v) / f32::from(i16::MAX)))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, bits) => {
            return Err(MarketError::Audio(format!("Unsupported bit depth: {bits}")));
        }
    };
    Ok((samples, spec))
}

/// Playback length of a WAV payload
pub fn wav_duration(bytes: &[u8]) -> Option<Duration> {
    let reader = WavReader::new(Cursor::new(bytes)).ok()?;
    let spec = reader.spec();
    Some(Duration::from_secs_f64(
        f64::from(reader.duration()) / f64::from(spec.sample_rate),
    ))
}

/// Average interleaved frames down to one channel
pub fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Linear-interpolation resample of a mono signal
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let len = (samples.len() as f64 / ratio).floor() as usize;
    (0..len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx.min(samples.len() - 1)];
            let b = samples[(idx + 1).min(samples.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_encode_wav_header_and_length() {
        let samples = vec![0.0_f32; 16_000];
        let wav = encode_wav(&samples, 16_000, 1).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // Two bytes per sample plus the header
        assert!(wav.len() > 32_000);
        assert_eq!(wav_duration(&wav), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_decode_encoded_signal() {
        let samples = [0.5_f32, -0.5, 1.5, -1.5];
        let wav = encode_wav(&samples, 8_000, 1).unwrap();
        let (decoded, spec) = decode_wav(&wav).unwrap();

        assert_eq!(spec.sample_rate, 8_000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_abs_diff_eq!(decoded[0], 0.5, epsilon = 1e-3);
        // Out-of-range input is clipped
        assert_abs_diff_eq!(decoded[2], 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(decoded[3], -1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_wav(b"not a wav").is_err());
        assert!(wav_duration(b"").is_none());
    }

    #[test]
    fn test_downmix_and_resample() {
        assert_eq!(downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(downmix(&[0.1, 0.2], 1), vec![0.1, 0.2]);

        let up = vec![0.0, 1.0, 0.0, 1.0];
        let down = resample(&up, 48_000, 24_000);
        assert_eq!(down.len(), 2);
        assert_eq!(resample(&up, 16_000, 16_000), up);
    }
}
