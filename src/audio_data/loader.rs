use crate::audio_data::SoundBuffer;
use crate::error::Result;

/// Turns a source key into a playable buffer.
///
/// The engine calls this once per source; the result is cached by the registry and shared
/// by every sound that names the same source. [`SymphoniaLoader`](super::SymphoniaLoader)
/// is the stock implementation for files on disk, but any lookup works: an asset pack,
/// an in-memory table, a procedural generator.
///
/// ```ignore
/// struct Silence;
///
/// impl SoundLoader for Silence {
///     fn load(&self, _source: &str) -> Result<SoundBuffer> {
///         SoundBuffer::new(vec![0.0; 44100], 44100, 1)
///     }
/// }
/// ```
pub trait SoundLoader: Send + Sync {
    /// Loads the buffer for `source`.
    ///
    /// # Errors
    ///
    /// Returns a `PosMixError` if the source cannot be found or decoded. The engine marks
    /// the sound as errored instead of propagating the failure.
    fn load(&self, source: &str) -> Result<SoundBuffer>;
}
