//! Audio loading and preprocessing.
//!
//! Decodes audio files (wav, mp3, flac, ogg, ...) via symphonia, converts
//! to mono, and resamples to the tokenizer's expected sample rate via
//! rubato.

use std::path::Path;

use anyhow::{Context, Result, bail};

pub mod mel;

/// Decoded audio.
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Interleaved samples as f32 in range [-1, 1].
    pub samples: Vec<f32>,
    /// Sample rate of the audio.
    pub sample_rate: u32,
    /// Number of channels (1 for mono, 2 for stereo).
    pub channels: usize,
}

impl AudioData {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: usize) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Convert to mono by averaging channels.
    pub fn to_mono(&self) -> Self {
        if self.channels == 1 {
            return self.clone();
        }

        let mono: Vec<f32> = self
            .samples
            .chunks(self.channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Self {
            samples: mono,
            sample_rate: self.sample_rate,
            channels: 1,
        }
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f32 {
        let per_channel = self.samples.len() / self.channels;
        per_channel as f32 / self.sample_rate as f32
    }
}

/// Load audio from a file path.
///
/// Supports wav, mp3, flac, ogg, and other formats via symphonia.
pub fn load_audio_file(path: &Path) -> Result<AudioData> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension() {
        hint.with_extension(ext.to_str().unwrap_or(""));
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("Failed to probe audio format of {}", path.display()))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .with_context(|| format!("No audio tracks in {}", path.display()))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .with_context(|| format!("Unknown sample rate in {}", path.display()))?;
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let track_id = track.id;
    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => bail!("Decode error in {}: {}", path.display(), e),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => bail!("Decode error in {}: {}", path.display(), e),
        };

        let spec = *decoded.spec();
        let duration = decoded.capacity() as u64;
        let mut buf = SampleBuffer::<f32>::new(duration, spec);
        buf.copy_interleaved_ref(decoded);
        samples.extend(buf.samples());
    }

    Ok(AudioData::new(samples, sample_rate, channels))
}

/// Resample mono audio to a target sample rate using rubato.
pub fn resample(audio: &AudioData, target_sample_rate: u32) -> Result<AudioData> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    if audio.sample_rate == target_sample_rate {
        return Ok(audio.clone());
    }

    let mono = audio.to_mono();

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_sample_rate as f64 / mono.sample_rate as f64;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, mono.samples.len(), 1)
        .context("Resampler creation failed")?;

    let waves_in = vec![mono.samples.clone()];
    let waves_out = resampler
        .process(&waves_in, None)
        .context("Resampling failed")?;

    Ok(AudioData::new(
        waves_out.into_iter().next().unwrap_or_default(),
        target_sample_rate,
        1,
    ))
}

/// Load an audio file as mono samples at the given sample rate.
pub fn load_mono_resampled(path: &Path, target_sample_rate: u32) -> Result<Vec<f32>> {
    let audio = load_audio_file(path)?;
    let mono = audio.to_mono();
    let resampled = resample(&mono, target_sample_rate)?;
    Ok(resampled.samples)
}
