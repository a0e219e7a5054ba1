use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use sonara_core::AudioError;

/// Controls log-mel spectrogram extraction.
#[derive(Debug, Clone)]
pub struct MelConfig {
    pub sample_rate: u32,
    pub n_mels: usize,
    pub n_fft: usize,
    pub hop_length: usize,
    pub win_length: usize,
    pub f_min: f64,
    pub f_max: f64,
}

impl MelConfig {
    /// Standard 80-bin config for Whisper-style models.
    pub fn whisper(sample_rate: u32) -> Self {
        let sample_rate = if sample_rate == 0 { 16000 } else { sample_rate };
        Self {
            sample_rate,
            n_mels: 80,
            n_fft: 400,
            hop_length: 160,
            win_length: 400,
            f_min: 0.0,
            f_max: f64::from(sample_rate) / 2.0,
        }
    }

    fn normalized(&self) -> Self {
        let mut cfg = self.clone();
        if cfg.n_mels == 0 {
            cfg.n_mels = 80;
        }
        if cfg.n_fft == 0 {
            cfg.n_fft = 400;
        }
        if cfg.win_length == 0 {
            cfg.win_length = cfg.n_fft;
        }
        if cfg.hop_length == 0 {
            cfg.hop_length = cfg.win_length / 4;
        }
        if cfg.f_max <= 0.0 {
            cfg.f_max = f64::from(cfg.sample_rate) / 2.0;
        }
        cfg
    }
}

/// Log-mel features in row-major `[n_mels, frames]` layout plus the frame
/// count after pad-or-trim. `target_frames == 0` keeps the natural length.
pub fn compute_log_mel(
    samples: &[f32],
    cfg: &MelConfig,
    target_frames: usize,
) -> Result<(Vec<f32>, usize), AudioError> {
    if samples.is_empty() {
        return Err(AudioError::Empty);
    }
    if cfg.sample_rate == 0 {
        return Err(AudioError::InvalidSampleRate(cfg.sample_rate));
    }
    let cfg = cfg.normalized();

    let frames = frame_count(samples.len(), cfg.win_length, cfg.hop_length);
    let padded_len = cfg.win_length + (frames - 1) * cfg.hop_length;
    let mut padded = vec![0.0f64; padded_len];
    for (dst, src) in padded.iter_mut().zip(samples.iter()) {
        *dst = f64::from(*src);
    }

    let n_freqs = cfg.n_fft / 2 + 1;
    let filters = mel_filter_bank(&cfg);
    let window = hann_window(cfg.win_length);

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(cfg.n_fft);
    let mut buffer = vec![Complex::new(0.0, 0.0); cfg.n_fft];
    let mut scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

    let mut mel = vec![0.0f32; cfg.n_mels * frames];
    let mut power = vec![0.0f64; n_freqs];

    for frame_idx in 0..frames {
        let start = frame_idx * cfg.hop_length;
        for slot in buffer.iter_mut() {
            *slot = Complex::new(0.0, 0.0);
        }
        for i in 0..cfg.win_length {
            buffer[i] = Complex::new(padded[start + i] * window[i], 0.0);
        }
        fft.process_with_scratch(&mut buffer, &mut scratch);

        for (i, p) in power.iter_mut().enumerate() {
            *p = buffer[i].norm_sqr();
        }

        for (m, filter) in filters.iter().enumerate() {
            let mut energy: f64 = filter.iter().zip(power.iter()).map(|(f, p)| f * p).sum();
            if energy < 1e-10 {
                energy = 1e-10;
            }
            mel[m * frames + frame_idx] = energy.log10() as f32;
        }
    }

    Ok(pad_or_trim_mel(mel, cfg.n_mels, frames, target_frames))
}

fn frame_count(samples: usize, win_length: usize, hop: usize) -> usize {
    if samples <= win_length {
        return 1;
    }
    1 + (samples - win_length).div_ceil(hop)
}

fn pad_or_trim_mel(
    mel: Vec<f32>,
    n_mels: usize,
    frames: usize,
    target_frames: usize,
) -> (Vec<f32>, usize) {
    if target_frames == 0 || frames == target_frames {
        return (mel, frames);
    }
    let mut out = vec![0.0f32; n_mels * target_frames];
    let keep = frames.min(target_frames);
    for m in 0..n_mels {
        out[m * target_frames..m * target_frames + keep]
            .copy_from_slice(&mel[m * frames..m * frames + keep]);
    }
    (out, target_frames)
}

fn hann_window(len: usize) -> Vec<f64> {
    if len == 1 {
        return vec![1.0];
    }
    (0..len)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (len - 1) as f64).cos())
        })
        .collect()
}

fn mel_filter_bank(cfg: &MelConfig) -> Vec<Vec<f64>> {
    let f_min = cfg.f_min.max(0.0);
    let f_max = cfg.f_max.min(f64::from(cfg.sample_rate) / 2.0);

    let mel_min = hz_to_mel(f_min);
    let mel_max = hz_to_mel(f_max);
    let mel_points = linspace(mel_min, mel_max, cfg.n_mels + 2);

    let n_freqs = cfg.n_fft / 2 + 1;
    let bins: Vec<usize> = mel_points
        .iter()
        .map(|&m| {
            let hz = mel_to_hz(m);
            let b = (((cfg.n_fft as f64) + 1.0) * hz / f64::from(cfg.sample_rate)).floor();
            (b.max(0.0) as usize).min(n_freqs)
        })
        .collect();

    let mut filters = vec![vec![0.0f64; n_freqs]; cfg.n_mels];
    for (m, filter) in filters.iter_mut().enumerate() {
        let left = bins[m];
        let mut center = bins[m + 1];
        let mut right = bins[m + 2];
        // Degenerate triangles get widened by one bin.
        if center == left {
            center += 1;
        }
        if right == center {
            right += 1;
        }
        for k in left..center.min(n_freqs) {
            filter[k] = (k - left) as f64 / (center - left) as f64;
        }
        for k in center..right.min(n_freqs) {
            filter[k] = (right - k) as f64 / (right - center) as f64;
        }
    }
    filters
}

fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    if count <= 1 {
        return vec![start];
    }
    let step = (end - start) / (count - 1) as f64;
    (0..count).map(|i| start + step * i as f64).collect()
}

fn hz_to_mel(f: f64) -> f64 {
    2595.0 * (1.0 + f / 700.0).log10()
}

fn mel_to_hz(m: f64) -> f64 {
    700.0 * (10f64.powf(m / 2595.0) - 1.0)
}
