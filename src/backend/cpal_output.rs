use crate::backend::{OutputFormat, SoftwareMixer};
use crate::error::{PosMixError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Plays a [`SoftwareMixer`] through the default output device.
///
/// The stream handle is not `Send` on every platform, so keep this on the thread that
/// opened it (usually the main thread) and share only the mixer with the engine.
pub struct CpalOutput {
    format: OutputFormat,
    mixer: Arc<SoftwareMixer>,
    stream: Option<cpal::Stream>,
    is_running: Arc<AtomicBool>,
    frames_rendered: Arc<AtomicUsize>,
}

impl CpalOutput {
    pub fn new(mixer: Arc<SoftwareMixer>, format: OutputFormat) -> Self {
        Self {
            format,
            mixer,
            stream: None,
            is_running: Arc::new(AtomicBool::new(false)),
            frames_rendered: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Opens the default device and starts pulling audio from the mixer.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running.load(Ordering::Relaxed) {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| {
            PosMixError::AudioDevice("No default output device available".into())
        })?;

        let config = cpal::StreamConfig {
            channels: self.format.channels,
            sample_rate: cpal::SampleRate(self.format.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(self.format.buffer_frames as u32),
        };

        let default_config = device.default_output_config().map_err(|e| {
            PosMixError::AudioDevice(format!("Failed to get default config: {}", e))
        })?;

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => self.create_stream::<f32>(&device, &config)?,
            cpal::SampleFormat::I16 => self.create_stream::<i16>(&device, &config)?,
            cpal::SampleFormat::U16 => self.create_stream::<u16>(&device, &config)?,
            other => {
                return Err(PosMixError::AudioFormat(format!(
                    "Unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| PosMixError::AudioDevice(format!("Failed to start stream: {}", e)))?;

        self.stream = Some(stream);
        self.is_running.store(true, Ordering::Relaxed);
        log::info!(
            "Output stream started: {} Hz, {} channels",
            self.format.sample_rate,
            self.format.channels
        );

        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.is_running.store(false, Ordering::Relaxed);
            drop(stream);
            log::info!("Output stream stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// Frames the mixer produced since the stream started.
    pub fn frames_rendered(&self) -> usize {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    fn create_stream<T>(
        &self,
        device: &cpal::Device,
        config: &cpal::StreamConfig,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let mixer = self.mixer.clone();
        let is_running = self.is_running.clone();
        let frames_rendered = self.frames_rendered.clone();
        let mut scratch: Vec<f32> = Vec::new();

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    if !is_running.load(Ordering::Relaxed) {
                        data.iter_mut().for_each(|s| *s = T::from_sample(0.0f32));
                        return;
                    }

                    scratch.resize(data.len(), 0.0);
                    let frames = mixer.render(&mut scratch);

                    for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                        *out = T::from_sample(*sample);
                    }
                    frames_rendered.fetch_add(frames, Ordering::Relaxed);
                },
                move |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| PosMixError::AudioDevice(format!("Failed to build stream: {}", e)))
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.stop();
    }
}
