//! Whisper-convention log-mel feature extraction.
//!
//! Turns mono 16 kHz audio into the `(1, num_mel_bins, frames)` log-mel
//! features the VQ encoder expects: STFT with a periodic Hann window,
//! power spectrum, Slaney-normalized mel filterbank, then Whisper's log10
//! scaling with an 8 dB dynamic range floor.

use candle_core::{Device, Result, Tensor};
use rustfft::{FftPlanner, num_complex::Complex};
use serde::Deserialize;

/// Feature extractor parameters, loaded from `preprocessor_config.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureExtractorConfig {
    /// Number of mel bins.
    #[serde(default = "default_feature_size")]
    pub feature_size: usize,
    /// Audio sample rate.
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: u32,
    /// Hop size between frames.
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    /// FFT / window size.
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,
    /// Maximum chunk length in seconds.
    #[serde(default = "default_chunk_length")]
    pub chunk_length: usize,
}

fn default_feature_size() -> usize {
    128
}
fn default_sampling_rate() -> u32 {
    16000
}
fn default_hop_length() -> usize {
    160
}
fn default_n_fft() -> usize {
    400
}
fn default_chunk_length() -> usize {
    30
}

impl Default for FeatureExtractorConfig {
    fn default() -> Self {
        Self {
            feature_size: default_feature_size(),
            sampling_rate: default_sampling_rate(),
            hop_length: default_hop_length(),
            n_fft: default_n_fft(),
            chunk_length: default_chunk_length(),
        }
    }
}

impl FeatureExtractorConfig {
    /// Number of samples per processing chunk.
    pub fn chunk_samples(&self) -> usize {
        self.chunk_length * self.sampling_rate as usize
    }
}

/// Log-mel feature extractor.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureExtractorConfig,
    /// Row-major filterbank, `feature_size x (n_fft / 2 + 1)`.
    mel_filters: Vec<Vec<f32>>,
    hann_window: Vec<f32>,
}

impl FeatureExtractor {
    pub fn new(config: FeatureExtractorConfig) -> Self {
        let mel_filters = create_mel_filterbank(
            config.n_fft,
            config.feature_size,
            config.sampling_rate as usize,
            0.0,
            config.sampling_rate as f64 / 2.0,
        );
        let hann_window = create_hann_window(config.n_fft);
        Self {
            config,
            mel_filters,
            hann_window,
        }
    }

    pub fn config(&self) -> &FeatureExtractorConfig {
        &self.config
    }

    /// Compute log-mel features for one chunk of mono samples.
    ///
    /// Returns a tensor of shape `(1, feature_size, frames)` where
    /// `frames == samples / hop_length`.
    pub fn features(&self, samples: &[f32], device: &Device) -> Result<Tensor> {
        let n_fft = self.config.n_fft;
        let hop = self.config.hop_length;
        let n_freqs = n_fft / 2 + 1;
        let num_mels = self.config.feature_size;

        // Center the frames by reflect-padding half a window on each side.
        let padded = reflect_pad(samples, n_fft / 2, n_fft / 2);
        let frames = stft(&padded, n_fft, hop, &self.hann_window);

        // Whisper drops the trailing frame.
        let n_frames = frames.len().saturating_sub(1);
        if n_frames == 0 {
            return Tensor::zeros((1, num_mels, 0), candle_core::DType::F32, device);
        }

        // Power spectrum, then mel projection.
        let mut mel = vec![0f32; num_mels * n_frames];
        let mut power = vec![0f32; n_freqs];
        for (t, frame) in frames[..n_frames].iter().enumerate() {
            for (k, c) in frame.iter().enumerate() {
                power[k] = c.re * c.re + c.im * c.im;
            }
            for (m, filter) in self.mel_filters.iter().enumerate() {
                let mut acc = 0f32;
                for (k, &w) in filter.iter().enumerate() {
                    acc += w * power[k];
                }
                mel[m * n_frames + t] = acc;
            }
        }

        // log10 with clamping, floor at (max - 8), then (x + 4) / 4.
        let mut max_val = f32::MIN;
        for v in mel.iter_mut() {
            *v = v.max(1e-10).log10();
            max_val = max_val.max(*v);
        }
        for v in mel.iter_mut() {
            *v = (v.max(max_val - 8.0) + 4.0) / 4.0;
        }

        Tensor::from_vec(mel, (1, num_mels, n_frames), device)
    }
}

/// Create a periodic Hann window: 0.5 * (1 - cos(2*pi*n/N)).
fn create_hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|n| {
            let x = 2.0 * std::f32::consts::PI * n as f32 / size as f32;
            0.5 * (1.0 - x.cos())
        })
        .collect()
}

/// Apply reflection padding to a 1D signal.
fn reflect_pad(signal: &[f32], pad_left: usize, pad_right: usize) -> Vec<f32> {
    let n = signal.len();
    let mut padded = Vec::with_capacity(n + pad_left + pad_right);

    for i in (1..=pad_left).rev() {
        let idx = if i < n { i } else { n.saturating_sub(1) };
        padded.push(signal.get(idx).copied().unwrap_or(0.0));
    }

    padded.extend_from_slice(signal);

    for i in 0..pad_right {
        let idx = if n >= 2 + i { n - 2 - i } else { 0 };
        padded.push(signal.get(idx).copied().unwrap_or(0.0));
    }

    padded
}

/// Short-time Fourier transform over a padded signal.
///
/// Returns one `n_fft / 2 + 1` complex spectrum per hop.
fn stft(signal: &[f32], n_fft: usize, hop: usize, window: &[f32]) -> Vec<Vec<Complex<f32>>> {
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);

    let n_freqs = n_fft / 2 + 1;
    if signal.len() < n_fft {
        return Vec::new();
    }
    let num_frames = (signal.len() - n_fft) / hop + 1;

    let mut result = Vec::with_capacity(num_frames);
    for frame_idx in 0..num_frames {
        let start = frame_idx * hop;
        let mut buffer: Vec<Complex<f32>> = (0..n_fft)
            .map(|i| Complex::new(signal[start + i] * window[i], 0.0))
            .collect();
        fft.process(&mut buffer);
        result.push(buffer[..n_freqs].to_vec());
    }

    result
}

/// Create a Slaney-normalized mel filterbank matrix.
///
/// Linear below 1000 Hz, logarithmic above, matching librosa defaults.
pub fn create_mel_filterbank(
    n_fft: usize,
    num_mels: usize,
    sample_rate: usize,
    fmin: f64,
    fmax: f64,
) -> Vec<Vec<f32>> {
    let n_freqs = n_fft / 2 + 1;

    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = (6.4_f64).ln() / 27.0;

    let hz_to_mel = |hz: f64| {
        if hz < min_log_hz {
            hz / f_sp
        } else {
            min_log_mel + (hz / min_log_hz).ln() / logstep
        }
    };
    let mel_to_hz = |mel: f64| {
        if mel < min_log_mel {
            mel * f_sp
        } else {
            min_log_hz * ((mel - min_log_mel) * logstep).exp()
        }
    };

    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);

    let hz_points: Vec<f64> = (0..=num_mels + 1)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (num_mels + 1) as f64))
        .collect();

    let fft_freqs: Vec<f64> = (0..n_freqs)
        .map(|i| i as f64 * sample_rate as f64 / n_fft as f64)
        .collect();

    let mut filterbank = vec![vec![0.0f32; n_freqs]; num_mels];
    for m in 0..num_mels {
        let f_left = hz_points[m];
        let f_center = hz_points[m + 1];
        let f_right = hz_points[m + 2];

        let lower_diff = f_center - f_left;
        let upper_diff = f_right - f_center;

        for (bin_idx, &freq) in fft_freqs.iter().enumerate() {
            let lower = if lower_diff > 0.0 {
                (freq - f_left) / lower_diff
            } else {
                0.0
            };
            let upper = if upper_diff > 0.0 {
                (f_right - freq) / upper_diff
            } else {
                0.0
            };
            filterbank[m][bin_idx] = lower.min(upper).max(0.0) as f32;
        }

        // Slaney area normalization.
        let enorm = 2.0 / (f_right - f_left) as f32;
        for val in &mut filterbank[m] {
            *val *= enorm;
        }
    }

    filterbank
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window() {
        let window = create_hann_window(4);
        assert_eq!(window.len(), 4);
        assert!((window[0] - 0.0).abs() < 1e-6);
        assert!((window[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_reflect_pad() {
        let signal = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let padded = reflect_pad(&signal, 2, 2);
        assert_eq!(padded, vec![3.0, 2.0, 1.0, 2.0, 3.0, 4.0, 5.0, 4.0, 3.0]);
    }

    #[test]
    fn test_mel_filterbank_shape() {
        let fb = create_mel_filterbank(400, 128, 16000, 0.0, 8000.0);
        assert_eq!(fb.len(), 128);
        assert_eq!(fb[0].len(), 201);
        assert!(fb[0].iter().any(|&v| v > 0.0));
    }

    #[test]
    fn test_feature_shape_one_second() -> Result<()> {
        let config = FeatureExtractorConfig::default();
        let extractor = FeatureExtractor::new(config);

        let samples: Vec<f32> = (0..16000).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let features = extractor.features(&samples, &Device::Cpu)?;

        // One second at hop 160 yields 100 frames.
        assert_eq!(features.dims(), &[1, 128, 100]);
        Ok(())
    }

    #[test]
    fn test_feature_values_normalized() -> Result<()> {
        let extractor = FeatureExtractor::new(FeatureExtractorConfig::default());
        let samples: Vec<f32> = (0..3200).map(|i| (i as f32 * 0.1).sin()).collect();
        let features = extractor.features(&samples, &Device::Cpu)?;

        // After the (x + 4) / 4 rescale, the maximum sits at (max_log + 4) / 4
        // and nothing is more than 2.0 below it.
        let flat = features.flatten_all()?.to_vec1::<f32>()?;
        let max = flat.iter().cloned().fold(f32::MIN, f32::max);
        let min = flat.iter().cloned().fold(f32::MAX, f32::min);
        assert!(max - min <= 2.0 + 1e-4);
        Ok(())
    }
}
