//! The pool of backend channels sounds are assigned to.

use crate::audio_data::SoundBuffer;
use crate::backend::{ChannelId, MixerBackend};
use crate::error::Result;
use std::sync::Arc;

/// Handle to one backend channel; every operation goes straight to the backend.
#[derive(Clone)]
pub struct Channel {
    id: ChannelId,
    backend: Arc<dyn MixerBackend>,
}

impl Channel {
    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn play(&self, buffer: &SoundBuffer) -> Result<()> {
        self.backend.play(self.id, buffer)
    }

    pub fn stop(&self) {
        self.backend.stop(self.id);
    }

    pub fn pause(&self) {
        self.backend.pause(self.id);
    }

    pub fn resume(&self) {
        self.backend.resume(self.id);
    }

    pub fn set_volume(&self, volume: f32) {
        self.backend.set_volume(self.id, volume);
    }

    pub fn is_busy(&self) -> bool {
        self.backend.is_busy(self.id)
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").field("id", &self.id).finish()
    }
}

/// Tracks which channels are assigned to a sound.
///
/// Capacity starts at the configured size and grows by a fixed increment whenever an
/// allocation finds every channel taken. It never shrinks; released channels go back to
/// the free set. With a limit configured, growth stops there and allocation reports
/// `None` until a channel is released.
pub struct ChannelPool {
    backend: Arc<dyn MixerBackend>,
    in_use: Vec<bool>,
    growth_increment: usize,
    limit: Option<usize>,
    limit_reported: bool,
}

impl ChannelPool {
    /// The backend must already have `capacity` channels.
    pub(crate) fn new(
        backend: Arc<dyn MixerBackend>,
        capacity: usize,
        growth_increment: usize,
        limit: Option<usize>,
    ) -> Self {
        Self {
            backend,
            in_use: vec![false; capacity],
            growth_increment,
            limit,
            limit_reported: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.in_use.len()
    }

    pub fn occupancy(&self) -> usize {
        self.in_use.iter().filter(|used| **used).count()
    }

    pub fn is_in_use(&self, id: ChannelId) -> bool {
        self.in_use.get(id.index()).copied().unwrap_or(false)
    }

    /// Hands out a free channel, growing the pool once if none is free.
    pub fn allocate(&mut self) -> Option<Channel> {
        if let Some(channel) = self.take_free() {
            return Some(channel);
        }
        if !self.grow() {
            return None;
        }
        self.take_free()
    }

    /// Returns a channel to the free set.
    pub fn release(&mut self, id: ChannelId) {
        match self.in_use.get_mut(id.index()) {
            Some(used) if *used => {
                *used = false;
                self.limit_reported = false;
            }
            Some(_) => log::warn!("{} released twice", id),
            None => log::warn!("Released unknown {}", id),
        }
    }

    /// Handle for a channel that is already assigned.
    pub fn channel(&self, id: ChannelId) -> Channel {
        Channel {
            id,
            backend: self.backend.clone(),
        }
    }

    fn take_free(&mut self) -> Option<Channel> {
        let idx = self.in_use.iter().position(|used| !*used)?;
        self.in_use[idx] = true;
        Some(self.channel(ChannelId::new(idx)))
    }

    fn grow(&mut self) -> bool {
        let capacity = self.capacity();
        let mut target = capacity + self.growth_increment;
        if let Some(limit) = self.limit {
            target = target.min(limit);
        }

        if target <= capacity {
            if !self.limit_reported {
                log::warn!(
                    "All {} channels are in use and the pool is at its limit",
                    capacity
                );
                self.limit_reported = true;
            }
            return false;
        }

        if let Err(e) = self.backend.set_channel_count(target) {
            log::error!("Failed to raise channel count to {}: {}", target, e);
            return false;
        }

        self.in_use.resize(target, false);
        log::info!("Raising the maximum of channels to {}", target);
        true
    }
}
