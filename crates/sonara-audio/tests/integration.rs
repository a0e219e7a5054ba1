use sonara_audio::{compute_log_mel, decode_audio, resample_linear, MelConfig};

fn sine_pcm16(freq: f64, rate: u32, secs: f64) -> Vec<u8> {
    let n = (f64::from(rate) * secs) as usize;
    let mut out = Vec::with_capacity(n * 2);
    for i in 0..n {
        let v = (2.0 * std::f64::consts::PI * freq * i as f64 / f64::from(rate)).sin();
        let s = (v * 16384.0) as i16;
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

#[test]
fn test_pcm_payload_through_mel_pipeline() {
    let payload = sine_pcm16(440.0, 16000, 1.0);
    let decoded = decode_audio(&payload, "pcm", 16000, 1).unwrap();
    assert_eq!(decoded.samples.len(), 16000);

    let cfg = MelConfig::whisper(decoded.sample_rate);
    let (mel, frames) = compute_log_mel(&decoded.samples, &cfg, 3000).unwrap();
    assert_eq!(frames, 3000);
    assert_eq!(mel.len(), 80 * 3000);
    assert!(mel.iter().all(|v| v.is_finite()));
}

#[test]
fn test_resample_then_mel_matches_target_rate_dimensions() {
    let payload = sine_pcm16(220.0, 48000, 0.5);
    let decoded = decode_audio(&payload, "pcm", 48000, 1).unwrap();
    let resampled = resample_linear(&decoded.samples, 48000, 16000);
    assert_eq!(resampled.len(), 8000);

    let cfg = MelConfig::whisper(16000);
    let (_, frames) = compute_log_mel(&resampled, &cfg, 0).unwrap();
    // 8000 samples, win 400, hop 160 -> 1 + ceil(7600/160) = 49 frames
    assert_eq!(frames, 49);
}
