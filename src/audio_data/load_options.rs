use std::time::Duration;

/// How [`SymphoniaLoader`](super::SymphoniaLoader) shapes a decoded file before it is
/// cached. The defaults keep the file exactly as stored.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Rate the buffer is resampled to. Buffers played on a mixer must match its rate.
    pub target_sample_rate: Option<u32>,
    /// Average all channels into one
    pub convert_to_mono: bool,
    /// Decoding stops after this much audio
    pub max_duration: Option<Duration>,
    /// Keep only this channel; takes precedence over `convert_to_mono`
    pub mono_channel: Option<usize>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_sample_rate(mut self, rate: u32) -> Self {
        self.target_sample_rate = Some(rate);
        self
    }

    pub fn convert_to_mono(mut self, convert: bool) -> Self {
        self.convert_to_mono = convert;
        self
    }

    /// Truncates long files such as ambience loops to their first `duration`.
    pub fn max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    pub fn mono_channel(mut self, channel: usize) -> Self {
        self.mono_channel = Some(channel);
        self
    }
}
