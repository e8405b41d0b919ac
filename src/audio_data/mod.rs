//! Decoded sound buffers and the loaders that produce them.

mod load_options;
mod loader;
mod resampler;
mod symphonia_loader;

use crate::error::{PosMixError, Result};
pub use load_options::LoadOptions;
pub use loader::SoundLoader;
pub use resampler::AudioResampler;
use std::sync::Arc;
use std::time::Duration;
pub use symphonia_loader::SymphoniaLoader;

/// Interleaved `f32` PCM ready to be played on a channel.
///
/// Cloning is cheap: the samples are shared, so one cached buffer can back any number of
/// concurrently playing sounds.
#[derive(Debug, Clone)]
pub struct SoundBuffer {
    inner: Arc<BufferInner>,
}

#[derive(Debug)]
struct BufferInner {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    duration: Duration,
    total_frames: usize,
}

impl SoundBuffer {
    /// Wraps already-decoded interleaved samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 {
            return Err(PosMixError::AudioFormat(
                "Sample rate must be greater than 0".to_string(),
            ));
        }
        if channels == 0 {
            return Err(PosMixError::AudioFormat(
                "Channel count must be greater than 0".to_string(),
            ));
        }

        let total_frames = samples.len() / channels as usize;
        let duration = Duration::from_secs_f64(total_frames as f64 / sample_rate as f64);
        Ok(Self {
            inner: Arc::new(BufferInner {
                samples,
                sample_rate,
                channels,
                duration,
                total_frames,
            }),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    pub fn duration(&self) -> Duration {
        self.inner.duration
    }

    pub fn samples(&self) -> &[f32] {
        &self.inner.samples
    }

    pub fn total_frames(&self) -> usize {
        self.inner.total_frames
    }

    pub fn is_empty(&self) -> bool {
        self.inner.total_frames == 0
    }

    pub fn len(&self) -> usize {
        self.inner.samples.len()
    }

    /// Sample for `channel` of frame `frame`; mono buffers feed every output channel.
    pub(crate) fn sample_at(&self, frame: usize, channel: usize) -> f32 {
        let channels = self.inner.channels as usize;
        let channel = channel.min(channels - 1);
        self.inner
            .samples
            .get(frame * channels + channel)
            .copied()
            .unwrap_or(0.0)
    }

    /// Convert to mono by downmixing all channels
    pub fn to_mono(&self) -> Result<Self> {
        if self.inner.channels == 1 {
            return Ok(self.clone());
        }

        let mono_samples: Vec<f32> = self
            .inner
            .samples
            .chunks(self.inner.channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / self.inner.channels as f32)
            .collect();

        Self::new(mono_samples, self.inner.sample_rate, 1)
    }

    /// Resample to a different sample rate using rubato
    pub fn resample(&self, target_sample_rate: u32) -> Result<Self> {
        if target_sample_rate == self.inner.sample_rate {
            return Ok(self.clone());
        }

        let resampler = AudioResampler::new(
            self.inner.sample_rate,
            target_sample_rate,
            self.inner.channels,
            Some(1024),
        )?;

        let resampled = resampler.resample_interleaved(&self.inner.samples)?;
        Self::new(resampled, target_sample_rate, self.inner.channels)
    }
}
