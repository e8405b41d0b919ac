//! Configuration for posmix

use crate::backend::OutputFormat;
use crate::error::{PosMixError, Result};
use std::time::Duration;

/// Constructor-time settings for a [`PosMixEngine`](crate::PosMixEngine).
#[derive(Debug, Clone)]
pub struct PosMixDesc {
    /// Output sample rate the backend is initialised with
    pub sample_rate: u32,
    /// Number of interleaved output channels (2 for stereo)
    pub output_channels: u16,
    /// Output block size in frames
    pub buffer_frames: usize,
    /// Initial channel pool capacity
    pub max_channels: usize,
    /// Channels added each time an allocation finds the pool exhausted
    pub channel_growth_increment: usize,
    /// Hard ceiling for pool growth (None = grow without bound)
    pub channel_limit: Option<usize>,
    /// When false, distance attenuation is skipped and sounds play at their intended volume
    pub audio_is_positional: bool,
    /// Sleep between two scheduler ticks
    pub tick_interval: Duration,
    /// Number of undelivered events kept before new ones are dropped
    pub event_capacity: usize,
    /// Ticks a command may wait for a target that is not registered yet (a sound created
    /// but not added) before it is discarded
    pub command_grace_ticks: u32,
}

impl Default for PosMixDesc {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            output_channels: 2,
            buffer_frames: 4096,
            max_channels: 32,
            channel_growth_increment: 4,
            channel_limit: Some(1024),
            audio_is_positional: true,
            tick_interval: Duration::from_millis(5),
            event_capacity: 1024,
            command_grace_ticks: 200,
        }
    }
}

impl PosMixDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn output_channels(mut self, channels: u16) -> Self {
        self.output_channels = channels;
        self
    }

    pub fn buffer_frames(mut self, frames: usize) -> Self {
        self.buffer_frames = frames;
        self
    }

    pub fn max_channels(mut self, max: usize) -> Self {
        self.max_channels = max;
        self
    }

    pub fn channel_growth_increment(mut self, increment: usize) -> Self {
        self.channel_growth_increment = increment;
        self
    }

    pub fn channel_limit(mut self, limit: Option<usize>) -> Self {
        self.channel_limit = limit;
        self
    }

    pub fn audio_is_positional(mut self, positional: bool) -> Self {
        self.audio_is_positional = positional;
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn command_grace_ticks(mut self, ticks: u32) -> Self {
        self.command_grace_ticks = ticks;
        self
    }

    /// The device format handed to the backend on initialisation.
    pub fn output_format(&self) -> OutputFormat {
        OutputFormat {
            sample_rate: self.sample_rate,
            channels: self.output_channels,
            buffer_frames: self.buffer_frames,
        }
    }

    /// Checks the settings for values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(PosMixError::Configuration(
                "Sample rate must be greater than 0".to_string(),
            ));
        }
        if self.output_channels == 0 {
            return Err(PosMixError::Configuration(
                "Output channel count must be greater than 0".to_string(),
            ));
        }
        if self.max_channels == 0 {
            return Err(PosMixError::Configuration(
                "Initial channel pool capacity must be greater than 0".to_string(),
            ));
        }
        if self.channel_growth_increment == 0 {
            return Err(PosMixError::Configuration(
                "Channel growth increment must be greater than 0".to_string(),
            ));
        }
        if let Some(limit) = self.channel_limit {
            if limit < self.max_channels {
                return Err(PosMixError::Configuration(format!(
                    "Channel limit {} is below the initial capacity {}",
                    limit, self.max_channels
                )));
            }
        }
        if self.tick_interval.is_zero() {
            return Err(PosMixError::Configuration(
                "Tick interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
