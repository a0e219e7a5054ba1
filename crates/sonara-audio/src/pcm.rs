use sonara_core::AudioError;
use std::io::Cursor;

/// Mono audio decoded from a request payload.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode a `wav` or raw `pcm` (little-endian s16) payload to mono f32.
/// Raw PCM carries no header, so the fallbacks apply (16000 Hz, mono when
/// zero).
pub fn decode_audio(
    data: &[u8],
    format: &str,
    fallback_rate: u32,
    fallback_channels: u16,
) -> Result<DecodedAudio, AudioError> {
    if data.is_empty() {
        return Err(AudioError::Empty);
    }
    match format.trim().to_lowercase().as_str() {
        "wav" => decode_wav(data),
        "pcm" => {
            let rate = if fallback_rate == 0 { 16000 } else { fallback_rate };
            let channels = if fallback_channels == 0 { 1 } else { fallback_channels };
            let samples = pcm16_to_mono_f32(data, channels)?;
            Ok(DecodedAudio {
                samples,
                sample_rate: rate,
            })
        }
        other => Err(AudioError::UnsupportedFormat(other.to_string())),
    }
}

fn decode_wav(data: &[u8]) -> Result<DecodedAudio, AudioError> {
    let reader = hound::WavReader::new(Cursor::new(data))
        .map_err(|e| AudioError::InvalidPayload(format!("wav: {e}")))?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(AudioError::UnsupportedFormat(format!(
            "wav {:?} {} bit",
            spec.sample_format, spec.bits_per_sample
        )));
    }

    let channels = spec.channels.max(1) as usize;
    let mut samples = Vec::with_capacity(reader.len() as usize / channels);
    let mut frame_sum = 0.0f32;
    let mut in_frame = 0usize;

    for sample in reader.into_samples::<i16>() {
        let sample = sample.map_err(|e| AudioError::InvalidPayload(format!("wav: {e}")))?;
        frame_sum += f32::from(sample) / 32768.0;
        in_frame += 1;
        if in_frame == channels {
            samples.push(frame_sum / channels as f32);
            frame_sum = 0.0;
            in_frame = 0;
        }
    }

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Decode little-endian PCM16 and downmix interleaved channels to mono.
pub fn pcm16_to_mono_f32(pcm: &[u8], channels: u16) -> Result<Vec<f32>, AudioError> {
    if channels == 0 {
        return Err(AudioError::InvalidPayload("zero channel count".to_string()));
    }
    if pcm.len() % 2 != 0 {
        return Err(AudioError::InvalidPayload(
            "pcm16 payload must be even length".to_string(),
        ));
    }
    let channels = channels as usize;
    let sample_count = pcm.len() / 2;
    if sample_count % channels != 0 {
        return Err(AudioError::InvalidPayload(
            "pcm16 samples not divisible by channels".to_string(),
        ));
    }

    let frame_count = sample_count / channels;
    let mut out = Vec::with_capacity(frame_count);
    let mut idx = 0;
    for _ in 0..frame_count {
        let mut sum = 0.0f32;
        for _ in 0..channels {
            let sample = i16::from_le_bytes([pcm[idx], pcm[idx + 1]]);
            idx += 2;
            sum += f32::from(sample) / 32768.0;
        }
        out.push(sum / channels as f32);
    }
    Ok(out)
}

/// Simple linear resampling. Identity when rates match.
pub fn resample_linear(input: &[f32], in_rate: u32, out_rate: u32) -> Vec<f32> {
    if in_rate == out_rate || input.is_empty() {
        return input.to_vec();
    }

    let ratio = f64::from(out_rate) / f64::from(in_rate);
    let out_len = (input.len() as f64 * ratio).round() as usize;
    if out_len == 0 {
        return Vec::new();
    }

    let mut output = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 / ratio;
        let idx = pos as usize;
        if idx >= input.len() - 1 {
            output.push(input[input.len() - 1]);
            continue;
        }
        let frac = (pos - idx as f64) as f32;
        output.push(input[idx] * (1.0 - frac) + input[idx + 1] * frac);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(rate: u32, channels: u16, frames: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in frames {
                writer.write_sample(*s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_audio_empty_payload() {
        let result = decode_audio(&[], "wav", 16000, 1);
        assert!(matches!(result, Err(AudioError::Empty)));
    }

    #[test]
    fn test_decode_audio_unsupported_format() {
        let result = decode_audio(&[0u8; 8], "mp3", 16000, 1);
        match result {
            Err(AudioError::UnsupportedFormat(fmt)) => assert_eq!(fmt, "mp3"),
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_wav_mono() {
        let data = wav_bytes(16000, 1, &[0, 16384, -16384, 32767]);
        let decoded = decode_audio(&data, "wav", 0, 0).unwrap();
        assert_eq!(decoded.sample_rate, 16000);
        assert_eq!(decoded.samples.len(), 4);
        assert!((decoded.samples[1] - 0.5).abs() < 1e-4);
        assert!((decoded.samples[2] + 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_decode_wav_stereo_downmixes() {
        // L/R frames: (16384, 0) and (0, -16384)
        let data = wav_bytes(44100, 2, &[16384, 0, 0, -16384]);
        let decoded = decode_audio(&data, "wav", 0, 0).unwrap();
        assert_eq!(decoded.sample_rate, 44100);
        assert_eq!(decoded.samples.len(), 2);
        assert!((decoded.samples[0] - 0.25).abs() < 1e-4);
        assert!((decoded.samples[1] + 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_decode_wav_garbage_fails() {
        let result = decode_audio(b"RIFFnotawavfile!", "wav", 16000, 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_pcm_defaults() {
        let pcm = [0u8, 0, 0, 64]; // 0, 16384
        let decoded = decode_audio(&pcm, "pcm", 0, 0).unwrap();
        assert_eq!(decoded.sample_rate, 16000);
        assert_eq!(decoded.samples.len(), 2);
        assert!((decoded.samples[1] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_decode_pcm_case_insensitive_format() {
        let pcm = [0u8, 0];
        let decoded = decode_audio(&pcm, " PCM ", 8000, 1).unwrap();
        assert_eq!(decoded.sample_rate, 8000);
    }

    #[test]
    fn test_pcm16_odd_length_fails() {
        let result = pcm16_to_mono_f32(&[0u8, 0, 0], 1);
        assert!(matches!(result, Err(AudioError::InvalidPayload(_))));
    }

    #[test]
    fn test_pcm16_not_divisible_by_channels_fails() {
        let result = pcm16_to_mono_f32(&[0u8, 0, 0, 0, 0, 0], 2);
        assert!(matches!(result, Err(AudioError::InvalidPayload(_))));
    }

    #[test]
    fn test_pcm16_stereo_downmix() {
        // frame: 16384 (L), -16384 (R) -> 0.0
        let pcm = [0u8, 64, 0, 192];
        let samples = pcm16_to_mono_f32(&pcm, 2).unwrap();
        assert_eq!(samples.len(), 1);
        assert!(samples[0].abs() < 1e-4);
    }

    #[test]
    fn test_resample_identity() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_linear(&input, 16000, 16000), input);
    }

    #[test]
    fn test_resample_downsamples_length() {
        let input = vec![0.0f32; 32000];
        let output = resample_linear(&input, 32000, 16000);
        assert_eq!(output.len(), 16000);
    }

    #[test]
    fn test_resample_upsamples_length() {
        let input = vec![0.0f32; 8000];
        let output = resample_linear(&input, 8000, 16000);
        assert_eq!(output.len(), 16000);
    }

    #[test]
    fn test_resample_interpolates() {
        let input = vec![0.0, 1.0];
        let output = resample_linear(&input, 1, 2);
        assert_eq!(output.len(), 4);
        assert!((output[0] - 0.0).abs() < 1e-6);
        assert!((output[1] - 0.5).abs() < 1e-6);
        assert!((output[2] - 1.0).abs() < 1e-6);
    }
}
