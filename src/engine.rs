//! The engine facade tying registry, channel pool, command queue and scheduler together.

use crate::audio::{Audio, AudioId, AudioInfo, SoundState};
use crate::audio_data::{SoundBuffer, SoundLoader, SymphoniaLoader};
use crate::backend::{ChannelId, MixerBackend, SoftwareMixer};
use crate::channel::ChannelPool;
use crate::command::{CommandQueue, PendingCommands};
use crate::config::PosMixDesc;
use crate::error::Result;
use crate::events::{EventSink, PosMixEvent};
use crate::math::{AtomicVec2, Vec2};
use crate::registry::AudioRegistry;
use crate::scheduler::{self, Scheduler};
use crate::sync::lock;
use crossbeam_channel::Receiver;
use std::sync::{Arc, Mutex};

/// State shared between the engine handle and the scheduler thread.
pub(crate) struct EngineShared {
    pub(crate) desc: PosMixDesc,
    pub(crate) registry: AudioRegistry,
    pub(crate) pool: Mutex<ChannelPool>,
    pub(crate) pending: Mutex<PendingCommands>,
    pub(crate) listener: AtomicVec2,
    pub(crate) events: EventSink,
}

impl EngineShared {
    /// The backend must already be initialised with `desc.max_channels` channels.
    pub(crate) fn new(
        desc: PosMixDesc,
        backend: Arc<dyn MixerBackend>,
        loader: Arc<dyn SoundLoader>,
    ) -> (Self, CommandQueue, Receiver<PosMixEvent>) {
        let (events, receiver) = EventSink::channel(desc.event_capacity);
        let (commands, pending) = PendingCommands::channel();
        let pool = ChannelPool::new(
            backend,
            desc.max_channels,
            desc.channel_growth_increment,
            desc.channel_limit,
        );

        let shared = Self {
            registry: AudioRegistry::new(loader, events.clone()),
            pool: Mutex::new(pool),
            pending: Mutex::new(pending),
            listener: AtomicVec2::default(),
            events,
            desc,
        };
        (shared, commands, receiver)
    }
}

/// Positional audio engine.
///
/// Sounds are added as [`Audio`] entities and played on channels of a [`MixerBackend`].
/// A scheduler, either the background thread started with [`start`](Self::start) or the
/// host calling [`tick`](Self::tick), assigns channels, applies queued commands and
/// scales each channel's volume by the distance between the sound and the listener.
///
/// All methods take `&self` and may be called from any thread.
pub struct PosMixEngine {
    shared: Arc<EngineShared>,
    scheduler: Scheduler,
    backend: Arc<dyn MixerBackend>,
    commands: CommandQueue,
    events: Receiver<PosMixEvent>,
}

impl PosMixEngine {
    /// Validates `desc` and initialises `backend` with the output format and the initial
    /// channel count. The scheduler is not started.
    pub fn new(
        desc: PosMixDesc,
        backend: Arc<dyn MixerBackend>,
        loader: Arc<dyn SoundLoader>,
    ) -> Result<Self> {
        desc.validate()?;
        backend.init(&desc.output_format())?;
        backend.set_channel_count(desc.max_channels)?;

        log::info!(
            "posmix engine created: {} Hz, {} output channels, {} mixer channels",
            desc.sample_rate,
            desc.output_channels,
            desc.max_channels
        );

        let (shared, commands, events) = EngineShared::new(desc, backend.clone(), loader);
        let shared = Arc::new(shared);
        Ok(Self {
            scheduler: Scheduler::new(shared.clone()),
            shared,
            backend,
            commands,
            events,
        })
    }

    /// Engine on a [`SoftwareMixer`] with files decoded by [`SymphoniaLoader`] at the
    /// output sample rate. The mixer is returned so the host can pull audio from it.
    pub fn with_defaults(desc: PosMixDesc) -> Result<(Self, Arc<SoftwareMixer>)> {
        let mixer = Arc::new(SoftwareMixer::new());
        let loader = Arc::new(SymphoniaLoader::for_output(desc.sample_rate));
        let engine = Self::new(desc, mixer.clone(), loader)?;
        Ok((engine, mixer))
    }

    /// Spawns the scheduler thread. Does nothing if it is already running.
    pub fn start(&self) -> Result<()> {
        self.scheduler.start()
    }

    /// Stops the scheduler thread after its current tick. Does nothing if it is stopped.
    pub fn stop(&self) {
        self.scheduler.stop();
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Runs one scheduler pass on the calling thread.
    ///
    /// Safe to call while the scheduler thread runs; the two never overlap.
    pub fn tick(&self) {
        scheduler::tick(&self.shared);
    }

    pub fn set_listener_position(&self, position: Vec2) {
        self.shared.listener.store(position);
    }

    pub fn listener_position(&self) -> Vec2 {
        self.shared.listener.load()
    }

    /// Registers a sound, loading its source if it is not cached yet. Playback starts on
    /// the next tick.
    pub fn add(&self, audio: Audio) -> AudioId {
        self.shared.registry.add(audio)
    }

    pub fn add_preloaded(&self, audio: Audio, buffer: SoundBuffer) -> AudioId {
        self.shared.registry.add_preloaded(audio, buffer)
    }

    /// Stops and discards a sound. Returns false if `id` is not registered.
    pub fn remove(&self, id: AudioId) -> bool {
        self.shared.registry.remove(id, &self.shared.pool)
    }

    pub fn remove_by_channel(&self, channel: ChannelId) -> bool {
        self.shared.registry.remove_by_channel(channel, &self.shared.pool)
    }

    pub fn pause(&self, id: AudioId) {
        self.commands.enqueue_pause(id);
    }

    pub fn unpause(&self, id: AudioId) {
        self.commands.enqueue_unpause(id);
    }

    pub fn set_position(&self, id: AudioId, position: Vec2) {
        self.commands.enqueue_reposition(id, position);
    }

    pub fn set_volume(&self, id: AudioId, volume: f32) {
        self.commands.enqueue_volume(id, volume);
    }

    /// A queue handle for threads that only issue commands.
    pub fn commands(&self) -> CommandQueue {
        self.commands.clone()
    }

    pub fn get(&self, id: AudioId) -> Option<AudioInfo> {
        self.shared.registry.get(id)
    }

    pub fn status(&self, id: AudioId) -> Option<SoundState> {
        self.shared.registry.status(id)
    }

    pub fn get_playing(&self) -> Vec<AudioInfo> {
        self.shared.registry.get_playing()
    }

    /// First sound matching `predicate`. The predicate sees snapshots and may call back
    /// into the engine.
    pub fn find(&self, predicate: impl Fn(&AudioInfo) -> bool) -> Option<AudioInfo> {
        self.shared.registry.find(predicate)
    }

    /// See [`AudioRegistry::lookup_by_name_substring`] for why this is unreliable.
    pub fn lookup_by_name_substring(&self, fragment: &str) -> Option<AudioInfo> {
        self.shared.registry.lookup_by_name_substring(fragment)
    }

    pub fn channel_by_name_substring(&self, fragment: &str) -> Option<ChannelId> {
        self.shared.registry.channel_by_name_substring(fragment)
    }

    /// The registry, for cache management and bulk queries.
    pub fn registry(&self) -> &AudioRegistry {
        &self.shared.registry
    }

    pub fn channel_capacity(&self) -> usize {
        lock(&self.shared.pool).capacity()
    }

    pub fn channel_occupancy(&self) -> usize {
        lock(&self.shared.pool).occupancy()
    }

    /// Drains every event emitted since the last call without blocking.
    pub fn poll_events(&self) -> Vec<PosMixEvent> {
        self.events.try_iter().collect()
    }

    pub fn desc(&self) -> &PosMixDesc {
        &self.shared.desc
    }
}

impl Drop for PosMixEngine {
    fn drop(&mut self) {
        self.scheduler.stop();
        self.backend.shutdown();
        log::info!("posmix engine shut down");
    }
}
