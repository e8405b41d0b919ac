//! The set of active sounds and the cache of their decoded buffers.

use crate::audio::{Audio, AudioId, AudioInfo, SoundState};
use crate::audio_data::{SoundBuffer, SoundLoader};
use crate::backend::ChannelId;
use crate::channel::ChannelPool;
use crate::events::{EventSink, PosMixEvent};
use crate::sync::lock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Registry contents, guarded by the registry's mutex.
///
/// Sounds are kept in registration order so snapshots and name lookups are stable.
#[derive(Default)]
pub(crate) struct RegistryState {
    sounds: HashMap<AudioId, Audio>,
    order: Vec<AudioId>,
    buffers: HashMap<String, SoundBuffer>,
    /// Removed since the scheduler last collected them
    retired: Vec<AudioId>,
}

impl RegistryState {
    pub(crate) fn contains(&self, id: AudioId) -> bool {
        self.sounds.contains_key(&id)
    }

    pub(crate) fn get(&self, id: AudioId) -> Option<&Audio> {
        self.sounds.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: AudioId) -> Option<&mut Audio> {
        self.sounds.get_mut(&id)
    }

    /// Ids of every registered sound, in registration order.
    pub(crate) fn ids(&self) -> Vec<AudioId> {
        self.order.clone()
    }

    pub(crate) fn buffer(&self, source: &str) -> Option<SoundBuffer> {
        self.buffers.get(source).cloned()
    }

    pub(crate) fn remove(&mut self, id: AudioId) -> Option<Audio> {
        let audio = self.sounds.remove(&id)?;
        self.order.retain(|other| *other != id);
        self.retired.push(id);
        Some(audio)
    }

    /// Ids removed since the last call.
    pub(crate) fn take_retired(&mut self) -> Vec<AudioId> {
        std::mem::take(&mut self.retired)
    }

    fn insert(&mut self, audio: Audio) {
        let id = audio.id();
        if self.sounds.insert(id, audio).is_none() {
            self.order.push(id);
        }
    }

    fn iter(&self) -> impl Iterator<Item = &Audio> {
        self.order.iter().filter_map(|id| self.sounds.get(id))
    }
}

/// Authoritative set of active sounds.
///
/// Callers add and remove whole entities; the scheduler is the only component that
/// changes a registered sound's status, channel or volume caches. Every query returns
/// [`AudioInfo`] snapshots, never live references.
pub struct AudioRegistry {
    state: Mutex<RegistryState>,
    loader: Arc<dyn SoundLoader>,
    events: EventSink,
}

impl AudioRegistry {
    pub(crate) fn new(loader: Arc<dyn SoundLoader>, events: EventSink) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            loader,
            events,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RegistryState> {
        lock(&self.state)
    }

    /// Registers `audio` for playback, loading its source through the loader unless the
    /// buffer is already cached.
    ///
    /// Loading happens on the calling thread without holding the registry lock. A loader
    /// failure registers the sound in [`SoundState::Error`] instead of returning an error.
    pub fn add(&self, mut audio: Audio) -> AudioId {
        let id = audio.id();
        let cached = self.lock().buffers.contains_key(audio.source());

        if !cached {
            match self.loader.load(audio.source()) {
                Ok(buffer) => {
                    self.lock()
                        .buffers
                        .entry(audio.source().to_string())
                        .or_insert(buffer);
                }
                Err(e) => {
                    log::error!("Failed to load {}: {}", audio.source(), e);
                    audio.fail();
                    self.events.emit(PosMixEvent::SourceError {
                        audio_id: id,
                        error: e.to_string(),
                    });
                }
            }
        }

        self.register(audio);
        id
    }

    /// Registers `audio` with a buffer the caller already decoded. The buffer replaces any
    /// cached one for the same source.
    pub fn add_preloaded(&self, audio: Audio, buffer: SoundBuffer) -> AudioId {
        let id = audio.id();
        self.lock()
            .buffers
            .insert(audio.source().to_string(), buffer);
        self.register(audio);
        id
    }

    fn register(&self, audio: Audio) {
        log::debug!(
            "Registered {} ({}) as {:?}",
            audio.id(),
            audio.source(),
            audio.status()
        );
        self.lock().insert(audio);
    }

    /// Stops and discards a sound. Unknown ids are logged and ignored.
    pub fn remove(&self, id: AudioId, pool: &Mutex<ChannelPool>) -> bool {
        let mut state = self.lock();
        let Some(audio) = state.remove(id) else {
            log::warn!("Could not find {} to remove", id);
            return false;
        };
        self.discard(audio, pool);
        drop(state);

        self.events.emit(PosMixEvent::SourceRemoved { audio_id: id });
        true
    }

    /// Stops and discards whichever sound currently owns `channel`.
    pub fn remove_by_channel(&self, channel: ChannelId, pool: &Mutex<ChannelPool>) -> bool {
        let mut state = self.lock();
        let owner = state
            .iter()
            .find(|audio| audio.channel() == Some(channel))
            .map(Audio::id);
        let Some(audio) = owner.and_then(|id| state.remove(id)) else {
            log::warn!("No sound is playing on {}", channel);
            return false;
        };
        let id = audio.id();
        self.discard(audio, pool);
        drop(state);

        self.events.emit(PosMixEvent::SourceRemoved { audio_id: id });
        true
    }

    fn discard(&self, audio: Audio, pool: &Mutex<ChannelPool>) {
        match audio.channel() {
            Some(channel) => {
                let mut pool = lock(pool);
                pool.channel(channel).stop();
                pool.release(channel);
                log::debug!("Removed {} and freed {}", audio.id(), channel);
            }
            None => log::debug!("Removed {} (no channel assigned)", audio.id()),
        }
    }

    pub fn get(&self, id: AudioId) -> Option<AudioInfo> {
        self.lock().get(id).map(Audio::info)
    }

    pub fn status(&self, id: AudioId) -> Option<SoundState> {
        self.lock().get(id).map(Audio::status)
    }

    pub fn contains(&self, id: AudioId) -> bool {
        self.lock().contains(id)
    }

    /// First sound, in registration order, matching `predicate`.
    ///
    /// The predicate runs on snapshots after the registry lock is released, so it may
    /// call back into the engine.
    pub fn find(&self, predicate: impl Fn(&AudioInfo) -> bool) -> Option<AudioInfo> {
        self.snapshot().into_iter().find(|info| predicate(info))
    }

    /// Every registered sound, in registration order.
    pub fn snapshot(&self) -> Vec<AudioInfo> {
        self.lock().iter().map(Audio::info).collect()
    }

    /// Every sound currently in [`SoundState::Playing`].
    pub fn get_playing(&self) -> Vec<AudioInfo> {
        self.lock()
            .iter()
            .filter(|audio| audio.status() == SoundState::Playing)
            .map(Audio::info)
            .collect()
    }

    /// First sound whose source key contains `fragment`, ignoring case.
    ///
    /// Unreliable by nature: a short fragment can match an unrelated source, and it is a
    /// linear scan. Use the [`AudioId`] returned by `add` for anything that matters.
    pub fn lookup_by_name_substring(&self, fragment: &str) -> Option<AudioInfo> {
        let needle = fragment.to_lowercase();
        self.find(|info| info.source.to_lowercase().contains(&needle))
    }

    /// Channel of the sound [`lookup_by_name_substring`](Self::lookup_by_name_substring)
    /// finds, with the same caveats.
    pub fn channel_by_name_substring(&self, fragment: &str) -> Option<ChannelId> {
        self.lookup_by_name_substring(fragment)
            .and_then(|info| info.channel)
    }

    pub fn len(&self) -> usize {
        self.lock().sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().sounds.is_empty()
    }

    pub fn is_cached(&self, source: &str) -> bool {
        self.lock().buffers.contains_key(source)
    }

    pub fn cached_sources(&self) -> Vec<String> {
        self.lock().buffers.keys().cloned().collect()
    }

    /// Drops every cached buffer. Sounds already playing keep theirs; waiting sounds
    /// whose buffer is gone will fail to start.
    pub fn clear_cache(&self) {
        self.lock().buffers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{BackendCall, RecordingBackend};
    use crate::error::{PosMixError, Result};
    use crate::math::Vec2;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Loader that counts calls and fails for sources starting with "missing".
    #[derive(Default)]
    struct CountingLoader {
        calls: AtomicUsize,
    }

    impl SoundLoader for CountingLoader {
        fn load(&self, source: &str) -> Result<SoundBuffer> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if source.starts_with("missing") {
                return Err(PosMixError::AudioLoading(format!("{} not found", source)));
            }
            SoundBuffer::new(vec![0.0; 16], 44100, 1)
        }
    }

    fn registry() -> (AudioRegistry, Arc<CountingLoader>) {
        let loader = Arc::new(CountingLoader::default());
        let (events, _) = EventSink::channel(16);
        (AudioRegistry::new(loader.clone(), events), loader)
    }

    fn pool() -> (Mutex<ChannelPool>, Arc<RecordingBackend>) {
        let backend = Arc::new(RecordingBackend::new());
        (
            Mutex::new(ChannelPool::new(backend.clone(), 4, 4, None)),
            backend,
        )
    }

    #[test]
    fn test_add_loads_each_source_once() {
        let (registry, loader) = registry();
        let a = registry.add(Audio::new("sfx/Wind.ogg", 1.0, Vec2::ZERO, 5.0));
        let b = registry.add(Audio::new("sfx/Wind.ogg", 0.5, Vec2::ZERO, 5.0));

        assert_ne!(a, b);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 2);
        assert!(registry.is_cached("sfx/Wind.ogg"));
        assert_eq!(registry.status(a), Some(SoundState::Waiting));
    }

    #[test]
    fn test_failed_load_registers_error() {
        let (registry, _) = registry();
        let id = registry.add(Audio::new("missing.wav", 1.0, Vec2::ZERO, 5.0));
        assert_eq!(registry.status(id), Some(SoundState::Error));
        assert!(!registry.is_cached("missing.wav"));
    }

    #[test]
    fn test_add_preloaded_skips_loader() {
        let (registry, loader) = registry();
        let buffer = SoundBuffer::new(vec![0.1; 8], 44100, 1).unwrap();
        let id = registry.add_preloaded(Audio::new("missing-but-preloaded", 1.0, Vec2::ZERO, 1.0), buffer);

        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
        assert_eq!(registry.status(id), Some(SoundState::Waiting));
        assert_eq!(registry.lock().buffer("missing-but-preloaded").unwrap().len(), 8);
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let (registry, _) = registry();
        let (pool, backend) = pool();
        assert!(!registry.remove(AudioId::new(), &pool));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_remove_without_channel_makes_no_backend_calls() {
        let (registry, _) = registry();
        let (pool, backend) = pool();
        let id = registry.add(Audio::new("a.wav", 1.0, Vec2::ZERO, 1.0));

        assert!(registry.remove(id, &pool));
        assert!(!registry.contains(id));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_remove_stops_and_releases_channel() {
        let (registry, _) = registry();
        let (pool, backend) = pool();
        let id = registry.add(Audio::new("a.wav", 1.0, Vec2::ZERO, 1.0));

        let channel = lock(&pool).allocate().unwrap().id();
        registry.lock().get_mut(id).unwrap().start_on(channel);

        assert!(registry.remove(id, &pool));
        assert_eq!(backend.calls(), vec![BackendCall::Stop(channel)]);
        assert_eq!(lock(&pool).occupancy(), 0);
    }

    #[test]
    fn test_removed_ids_are_retired_once() {
        let (registry, _) = registry();
        let (pool, _) = pool();
        let id = registry.add(Audio::new("a.wav", 1.0, Vec2::ZERO, 1.0));
        registry.remove(id, &pool);
        registry.remove(id, &pool);

        assert_eq!(registry.lock().take_retired(), vec![id]);
        assert!(registry.lock().take_retired().is_empty());
    }

    #[test]
    fn test_remove_by_channel() {
        let (registry, _) = registry();
        let (pool, _) = pool();
        let id = registry.add(Audio::new("a.wav", 1.0, Vec2::ZERO, 1.0));
        let channel = lock(&pool).allocate().unwrap().id();
        registry.lock().get_mut(id).unwrap().start_on(channel);

        assert!(!registry.remove_by_channel(ChannelId::new(3), &pool));
        assert!(registry.remove_by_channel(channel, &pool));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_queries() {
        let (registry, _) = registry();
        let forest = registry.add(Audio::new("ambience/Forest_Day.ogg", 1.0, Vec2::ZERO, 1.0));
        let river = registry.add(Audio::new("ambience/river.ogg", 1.0, Vec2::ZERO, 1.0));
        registry
            .lock()
            .get_mut(river)
            .unwrap()
            .start_on(ChannelId::new(2));

        let playing = registry.get_playing();
        assert_eq!(playing.len(), 1);
        assert_eq!(playing[0].id, river);

        assert_eq!(registry.lookup_by_name_substring("FOREST").unwrap().id, forest);
        // Matches the first registered entry, not necessarily the intended one.
        assert_eq!(registry.lookup_by_name_substring("ambience").unwrap().id, forest);
        assert!(registry.lookup_by_name_substring("cave").is_none());
        assert_eq!(registry.channel_by_name_substring("river"), Some(ChannelId::new(2)));
        assert_eq!(registry.channel_by_name_substring("forest"), None);

        assert_eq!(registry.find(|a| a.id == river).unwrap().source, "ambience/river.ogg");
        assert_eq!(registry.lock().ids(), vec![forest, river]);
        assert_eq!(registry.snapshot().len(), 2);
    }

    #[test]
    fn test_clear_cache() {
        let (registry, _) = registry();
        registry.add(Audio::new("a.wav", 1.0, Vec2::ZERO, 1.0));
        registry.add(Audio::new("b.wav", 1.0, Vec2::ZERO, 1.0));
        let mut sources = registry.cached_sources();
        sources.sort();
        assert_eq!(sources, vec!["a.wav".to_string(), "b.wav".to_string()]);

        registry.clear_cache();
        assert!(registry.cached_sources().is_empty());
    }
}
