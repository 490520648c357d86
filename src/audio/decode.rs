use thiserror::Error;

use super::{AudioBuffer, SYNTH_SAMPLE_RATE};

/// Scale factor from signed 16-bit PCM to [-1.0, 1.0] float samples
const PCM_SCALE: f32 = 32768.0;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty audio payload")]
    Empty,
    #[error("malformed audio payload: odd byte length {0}")]
    OddLength(usize),
}

/// Decode a raw synthesis payload into a playable sample buffer.
///
/// The synthesis service returns headerless linear PCM: signed 16-bit
/// little-endian samples, mono, 24kHz. Each sample maps to `v / 32768.0` --
/// a fixed linear scale, not a peak-based normalization. Sample order is
/// preserved; no resampling or channel mixing happens here.
pub fn decode(bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::OddLength(bytes.len()));
    }

    let samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM_SCALE)
        .collect();

    Ok(AudioBuffer {
        samples,
        sample_rate: SYNTH_SAMPLE_RATE,
        channels: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn known_samples_map_to_fixed_scale_floats() {
        let bytes = pcm_bytes(&[0, 16384, -16384, 32767]);
        let buffer = decode(&bytes).unwrap();
        assert_eq!(buffer.samples.len(), 4);
        assert_eq!(buffer.samples[0], 0.0);
        assert_eq!(buffer.samples[1], 0.5);
        assert_eq!(buffer.samples[2], -0.5);
        assert!((buffer.samples[3] - 0.99997).abs() < 1e-5);
    }

    #[test]
    fn output_is_mono_at_synthesis_rate() {
        let buffer = decode(&pcm_bytes(&[100, -100])).unwrap();
        assert_eq!(buffer.sample_rate, 24_000);
        assert_eq!(buffer.channels, 1);
    }

    #[test]
    fn length_is_half_the_byte_count_in_order() {
        let source: Vec<i16> = (0..64).map(|i| i * 500 - 16000).collect();
        let buffer = decode(&pcm_bytes(&source)).unwrap();
        assert_eq!(buffer.samples.len(), source.len());
        for (sample, original) in buffer.samples.iter().zip(&source) {
            assert_eq!(*sample, *original as f32 / 32768.0);
        }
    }

    #[test]
    fn empty_payload_fails() {
        assert_eq!(decode(&[]), Err(DecodeError::Empty));
    }

    #[test]
    fn odd_length_payload_fails() {
        assert_eq!(decode(&[0, 1, 2]), Err(DecodeError::OddLength(3)));
    }

    #[test]
    fn extreme_negative_sample_reaches_minus_one() {
        let buffer = decode(&pcm_bytes(&[i16::MIN])).unwrap();
        assert_eq!(buffer.samples[0], -1.0);
    }
}
