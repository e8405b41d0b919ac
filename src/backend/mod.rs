//! The mixing/output backend the engine drives.
//!
//! The engine only ever talks to a [`MixerBackend`]: it initialises the device, sizes the
//! channel table, and plays, pauses, resumes, stops and re-levels individual channels.
//! [`SoftwareMixer`] is the in-process implementation; with the `cpal-output` feature,
//! [`CpalOutput`] renders it to the default output device.

#[cfg(feature = "cpal-output")]
mod cpal_output;
#[cfg(test)]
pub(crate) mod recording;
mod software;

#[cfg(feature = "cpal-output")]
pub use cpal_output::CpalOutput;
pub use software::SoftwareMixer;

use crate::audio_data::SoundBuffer;
use crate::error::Result;

/// Index of a playback slot in the backend's channel table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(usize);

impl ChannelId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Channel({})", self.0)
    }
}

/// Fixed device format chosen at engine construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_frames: usize,
}

/// Audio subsystem the engine renders through.
///
/// All methods take `&self`; implementations are shared between the caller threads and
/// the scheduler thread and synchronise internally. Per-channel operations on a channel
/// index the backend does not know about should be ignored, not panic.
pub trait MixerBackend: Send + Sync {
    /// Opens the output with a fixed format. Called once by the engine before anything else.
    fn init(&self, format: &OutputFormat) -> Result<()>;

    /// Releases the output. Called when the engine is dropped.
    fn shutdown(&self) {}

    /// Sets the total number of channels. The engine only ever grows this.
    fn set_channel_count(&self, count: usize) -> Result<()>;

    /// Starts `buffer` from the beginning on `channel`, replacing whatever it was playing.
    fn play(&self, channel: ChannelId, buffer: &SoundBuffer) -> Result<()>;

    fn stop(&self, channel: ChannelId);

    fn pause(&self, channel: ChannelId);

    fn resume(&self, channel: ChannelId);

    fn set_volume(&self, channel: ChannelId, volume: f32);

    /// True while the channel has a sound loaded that has not played out, paused or not.
    fn is_busy(&self, channel: ChannelId) -> bool;
}
