//! The update loop that drives every registered sound.

use crate::attenuation::{attenuated_volume, distance};
use crate::audio::{Audio, AudioId, SoundState};
use crate::audio_data::SoundBuffer;
use crate::command::{Command, PendingCommands};
use crate::engine::EngineShared;
use crate::error::{PosMixError, Result};
use crate::events::PosMixEvent;
use crate::math::Vec2;
use crate::sync::lock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Owns the scheduler thread.
///
/// `start` and `stop` are idempotent and may be called from any thread; the worker
/// mutex is held across each so two callers cannot both spawn or both join.
pub(crate) struct Scheduler {
    shared: Arc<EngineShared>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub(crate) fn new(shared: Arc<EngineShared>) -> Self {
        Self {
            shared,
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    pub(crate) fn start(&self) -> Result<()> {
        let mut worker = lock(&self.worker);
        if worker.is_some() {
            log::debug!("Scheduler already running");
            return Ok(());
        }

        self.running.store(true, Ordering::Relaxed);
        let shared = self.shared.clone();
        let running = self.running.clone();
        let handle = thread::Builder::new()
            .name("posmix-scheduler".to_string())
            .spawn(move || run(&shared, &running))
            .map_err(|e| {
                self.running.store(false, Ordering::Relaxed);
                PosMixError::Engine(format!("Failed to spawn scheduler thread: {}", e))
            })?;

        *worker = Some(handle);
        log::info!(
            "Scheduler started, ticking every {:?}",
            self.shared.desc.tick_interval
        );
        self.shared.events.emit(PosMixEvent::EngineStarted);
        Ok(())
    }

    /// Clears the running flag and waits for the current tick to finish.
    pub(crate) fn stop(&self) {
        let mut worker = lock(&self.worker);
        let Some(handle) = worker.take() else {
            return;
        };

        self.running.store(false, Ordering::Relaxed);
        if handle.join().is_err() {
            log::error!("Scheduler thread panicked");
        }
        log::info!("Scheduler stopped");
        self.shared.events.emit(PosMixEvent::EngineStopped);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

fn run(shared: &EngineShared, running: &AtomicBool) {
    while running.load(Ordering::Relaxed) {
        tick(shared);
        thread::sleep(shared.desc.tick_interval);
    }
}

/// What the channel-owning branch decided about a sound.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Continue,
    Finished,
}

/// Runs one pass over every sound registered when the pass begins.
///
/// Holding the pending-commands lock for the whole pass serialises manual ticks with the
/// scheduler thread.
pub(crate) fn tick(shared: &EngineShared) {
    let mut pending = lock(&shared.pending);
    pending.drain_incoming();

    let ids = shared.registry.lock().ids();
    let listener = shared.listener.load();

    for id in ids {
        process(shared, &mut pending, id, listener);
    }

    let mut registry = shared.registry.lock();
    let retired = registry.take_retired();
    let orphans = pending.discard_orphans(
        |id| registry.contains(id),
        &retired,
        shared.desc.command_grace_ticks,
    );
    drop(registry);
    discard(shared, orphans, "target is not registered");

    if !pending.is_empty() {
        log::trace!("{} commands carried over to the next tick", pending.len());
    }
}

fn process(shared: &EngineShared, pending: &mut PendingCommands, id: AudioId, listener: Vec2) {
    let mut state = shared.registry.lock();
    // Removed since the snapshot was taken.
    let Some(audio) = state.get_mut(id) else {
        return;
    };

    let commands = pending.take(id);
    if audio.status().is_terminal() {
        discard(shared, commands, "sound has failed");
        return;
    }
    let deferred = apply_commands(shared, audio, commands);
    pending.defer(id, deferred);

    if audio.channel().is_some() {
        if update_playing(shared, audio, listener) == Outcome::Finished {
            state.remove(id);
            shared
                .events
                .emit(PosMixEvent::SourceFinished { audio_id: id });
        }
        return;
    }

    let buffer = state.get(id).and_then(|audio| state.buffer(audio.source()));
    if let Some(audio) = state.get_mut(id) {
        start_playback(shared, audio, buffer);
    }
}

fn discard(shared: &EngineShared, commands: Vec<Command>, reason: &str) {
    if commands.is_empty() {
        return;
    }
    log::warn!("Discarding {} commands: {}", commands.len(), reason);
    for command in commands {
        log::debug!("Discarded {:?}", command);
        shared.events.emit(PosMixEvent::CommandDiscarded {
            audio_id: command.target(),
        });
    }
}

/// Applies `commands` in enqueue order and returns the ones that must wait for a channel.
fn apply_commands(
    shared: &EngineShared,
    audio: &mut Audio,
    commands: Vec<Command>,
) -> Vec<Command> {
    let id = audio.id();
    let Some(channel) = audio.channel() else {
        let (deferred, ready): (Vec<Command>, Vec<Command>) =
            commands.into_iter().partition(Command::needs_channel);
        for command in ready {
            apply_to_entity(audio, command);
        }
        return deferred;
    };

    let pool = lock(&shared.pool);
    for command in commands {
        match command {
            Command::Pause(_) if audio.status() == SoundState::Playing => {
                pool.channel(channel).pause();
                audio.mark_paused();
                log::debug!("Paused {} on {}", id, channel);
                shared.events.emit(PosMixEvent::SourcePaused { audio_id: id });
            }
            Command::Unpause(_) if audio.status() == SoundState::Paused => {
                pool.channel(channel).resume();
                audio.mark_playing();
                log::debug!("Resumed {} on {}", id, channel);
                shared.events.emit(PosMixEvent::SourceResumed { audio_id: id });
            }
            Command::Pause(_) | Command::Unpause(_) => {
                log::debug!("{:?} has no effect on {:?} {}", command, audio.status(), id);
            }
            _ => apply_to_entity(audio, command),
        }
    }
    Vec::new()
}

fn apply_to_entity(audio: &mut Audio, command: Command) {
    match command {
        Command::Reposition(_, position) => audio.set_position(position),
        Command::SetVolume(_, volume) => audio.set_volume(volume),
        Command::Pause(_) | Command::Unpause(_) => {}
    }
}

fn update_playing(shared: &EngineShared, audio: &mut Audio, listener: Vec2) -> Outcome {
    let Some(channel_id) = audio.channel() else {
        return Outcome::Continue;
    };
    let mut pool = lock(&shared.pool);
    let channel = pool.channel(channel_id);
    let volume = audio.volume();

    if audio.applied_volume() != Some(volume) {
        channel.set_volume(volume);
        audio.record_applied_volume(volume);
        audio.record_channel_volume(volume);
    }

    let busy = channel.is_busy();
    if !busy && audio.status() == SoundState::Playing {
        audio.finish();
        pool.release(channel_id);
        log::debug!("{} finished, freed {}", audio.id(), channel_id);
        return Outcome::Finished;
    }

    if busy && shared.desc.audio_is_positional {
        let d = distance(audio.position(), listener);
        let target = attenuated_volume(volume, d, audio.range()).unwrap_or(volume);
        if audio.channel_volume() != Some(target) {
            channel.set_volume(target);
            audio.record_channel_volume(target);
        }
    }

    Outcome::Continue
}

fn start_playback(shared: &EngineShared, audio: &mut Audio, buffer: Option<SoundBuffer>) {
    let id = audio.id();
    let Some(buffer) = buffer else {
        fail(shared, audio, "No cached buffer for source".to_string());
        return;
    };

    let mut pool = lock(&shared.pool);
    let capacity = pool.capacity();
    let Some(channel) = pool.allocate() else {
        log::debug!("No free channel for {}, keeping it waiting", id);
        return;
    };
    if pool.capacity() != capacity {
        shared.events.emit(PosMixEvent::ChannelPoolGrown {
            capacity: pool.capacity(),
        });
    }

    let volume = audio.volume();
    channel.set_volume(volume);
    if let Err(e) = channel.play(&buffer) {
        pool.release(channel.id());
        drop(pool);
        fail(shared, audio, e.to_string());
        return;
    }

    audio.start_on(channel.id());
    audio.record_applied_volume(volume);
    audio.record_channel_volume(volume);
    log::debug!("Started {} ({}) on {}", id, audio.source(), channel.id());
    shared
        .events
        .emit(PosMixEvent::SourceStarted { audio_id: id });
}

fn fail(shared: &EngineShared, audio: &mut Audio, error: String) {
    log::error!("Playback of {} ({}) failed: {}", audio.id(), audio.source(), error);
    audio.fail();
    shared.events.emit(PosMixEvent::SourceError {
        audio_id: audio.id(),
        error,
    });
}
