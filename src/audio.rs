//! The per-sound entity tracked by the registry.

use crate::backend::ChannelId;
use crate::math::Vec2;
use uuid::Uuid;

/// Stable handle for a registered sound.
///
/// Assigned when an [`Audio`] is constructed and used for every cross-component reference
/// (commands, removal, queries).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AudioId(Uuid);

impl AudioId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AudioId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AudioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AudioId({})", self.0)
    }
}

/// Playback status of a sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundState {
    /// Registered, waiting for the scheduler to assign a channel
    Waiting,
    /// Assigned to a channel and audible
    Playing,
    /// Assigned to a channel, playback suspended
    Paused,
    /// Played to the end; the entity leaves the registry
    Finished,
    /// Loading or playback failed; terminal
    Error,
}

impl SoundState {
    /// Whether a sound in this state owns a channel.
    pub fn has_channel(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }
}

/// A positional sound.
///
/// Callers build one with [`Audio::new`] and hand it to the engine. From then on the
/// scheduler is the only writer of its status, channel and volume caches; callers change
/// position and volume through queued commands. It is deliberately not `Clone`: an
/// identity belongs to exactly one entity, and queries hand out [`AudioInfo`] snapshots.
#[derive(Debug)]
pub struct Audio {
    id: AudioId,
    source: String,
    volume: f32,
    position: Vec2,
    range: f32,
    channel: Option<ChannelId>,
    status: SoundState,
    applied_volume: Option<f32>,
    channel_volume: Option<f32>,
}

impl Audio {
    /// Creates a sound for `source` at `position`, audible at full `volume` up to `range`
    /// world units away. Volume is clamped to `0.0..=1.0`.
    pub fn new(source: impl Into<String>, volume: f32, position: Vec2, range: f32) -> Self {
        Self {
            id: AudioId::new(),
            source: source.into(),
            volume: clamp_volume(volume),
            position,
            range,
            channel: None,
            status: SoundState::Waiting,
            applied_volume: None,
            channel_volume: None,
        }
    }

    pub fn id(&self) -> AudioId {
        self.id
    }

    /// Key into the buffer cache, usually a file path.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Intended volume, before attenuation.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn range(&self) -> f32 {
        self.range
    }

    pub fn channel(&self) -> Option<ChannelId> {
        self.channel
    }

    pub fn status(&self) -> SoundState {
        self.status
    }

    /// Last intended volume pushed to the channel.
    pub fn applied_volume(&self) -> Option<f32> {
        self.applied_volume
    }

    /// Last value written to the channel, attenuated or not.
    pub fn channel_volume(&self) -> Option<f32> {
        self.channel_volume
    }

    /// Point-in-time copy of every field.
    pub fn info(&self) -> AudioInfo {
        AudioInfo {
            id: self.id,
            source: self.source.clone(),
            volume: self.volume,
            position: self.position,
            range: self.range,
            channel: self.channel,
            status: self.status,
            applied_volume: self.applied_volume,
            channel_volume: self.channel_volume,
        }
    }

    pub(crate) fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    pub(crate) fn set_volume(&mut self, volume: f32) {
        self.volume = clamp_volume(volume);
    }

    pub(crate) fn start_on(&mut self, channel: ChannelId) {
        self.channel = Some(channel);
        self.status = SoundState::Playing;
    }

    pub(crate) fn mark_paused(&mut self) {
        if self.channel.is_some() {
            self.status = SoundState::Paused;
        }
    }

    pub(crate) fn mark_playing(&mut self) {
        if self.channel.is_some() {
            self.status = SoundState::Playing;
        }
    }

    /// Moves to Finished and hands back the channel to release.
    pub(crate) fn finish(&mut self) -> Option<ChannelId> {
        self.status = SoundState::Finished;
        self.channel.take()
    }

    /// Moves to Error and hands back the channel to release, if one was assigned.
    pub(crate) fn fail(&mut self) -> Option<ChannelId> {
        self.status = SoundState::Error;
        self.channel.take()
    }

    pub(crate) fn record_applied_volume(&mut self, volume: f32) {
        self.applied_volume = Some(volume);
    }

    pub(crate) fn record_channel_volume(&mut self, volume: f32) {
        self.channel_volume = Some(volume);
    }
}

/// Snapshot of an [`Audio`] returned by registry queries.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInfo {
    pub id: AudioId,
    pub source: String,
    pub volume: f32,
    pub position: Vec2,
    pub range: f32,
    pub channel: Option<ChannelId>,
    pub status: SoundState,
    pub applied_volume: Option<f32>,
    pub channel_volume: Option<f32>,
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_audio_is_waiting_without_channel() {
        let audio = Audio::new("sfx/bird.wav", 0.5, Vec2::new(1.0, 2.0), 10.0);
        assert_eq!(audio.status(), SoundState::Waiting);
        assert_eq!(audio.channel(), None);
        assert_eq!(audio.applied_volume(), None);
        assert_eq!(audio.source(), "sfx/bird.wav");
    }

    #[test]
    fn test_ids_are_unique_per_instance() {
        let a = Audio::new("a.wav", 1.0, Vec2::ZERO, 1.0);
        let b = Audio::new("a.wav", 1.0, Vec2::ZERO, 1.0);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.info().id, a.id());
    }

    #[test]
    fn test_volume_is_clamped() {
        assert_eq!(Audio::new("a", 1.7, Vec2::ZERO, 1.0).volume(), 1.0);
        assert_eq!(Audio::new("a", -0.2, Vec2::ZERO, 1.0).volume(), 0.0);
        assert_eq!(Audio::new("a", f32::NAN, Vec2::ZERO, 1.0).volume(), 0.0);
    }

    #[test]
    fn test_channel_follows_status() {
        let mut audio = Audio::new("a", 1.0, Vec2::ZERO, 1.0);

        // Pausing before a channel exists is ignored.
        audio.mark_paused();
        assert_eq!(audio.status(), SoundState::Waiting);

        audio.start_on(ChannelId::new(3));
        assert!(audio.status().has_channel());
        audio.mark_paused();
        assert_eq!(audio.status(), SoundState::Paused);
        assert!(audio.channel().is_some());
        audio.mark_playing();
        assert_eq!(audio.status(), SoundState::Playing);

        assert_eq!(audio.finish(), Some(ChannelId::new(3)));
        assert_eq!(audio.status(), SoundState::Finished);
        assert!(!audio.status().has_channel());
        assert_eq!(audio.channel(), None);
    }

    #[test]
    fn test_fail_releases_channel() {
        let mut audio = Audio::new("a", 1.0, Vec2::ZERO, 1.0);
        assert_eq!(audio.fail(), None);
        assert!(audio.status().is_terminal());

        let mut audio = Audio::new("b", 1.0, Vec2::ZERO, 1.0);
        audio.start_on(ChannelId::new(0));
        assert_eq!(audio.fail(), Some(ChannelId::new(0)));
        assert_eq!(audio.channel(), None);
    }
}
