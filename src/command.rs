//! Asynchronous playback commands.
//!
//! Callers push commands through a [`CommandQueue`] from any thread. At the start of each
//! tick the scheduler moves everything that arrived into its own pending store, grouped
//! by target, and then hands each sound all of its commands in enqueue order.

use crate::audio::AudioId;
use crate::math::Vec2;
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;

/// A request against a registered sound, applied on the scheduler's next tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Pause(AudioId),
    Unpause(AudioId),
    Reposition(AudioId, Vec2),
    SetVolume(AudioId, f32),
}

impl Command {
    pub fn target(&self) -> AudioId {
        match *self {
            Self::Pause(id) | Self::Unpause(id) => id,
            Self::Reposition(id, _) | Self::SetVolume(id, _) => id,
        }
    }

    /// Pause and unpause need a channel; the others only touch the entity.
    pub(crate) fn needs_channel(&self) -> bool {
        matches!(self, Self::Pause(_) | Self::Unpause(_))
    }
}

/// Caller-side handle for queuing commands. Cheap to clone and never blocks.
#[derive(Clone)]
pub struct CommandQueue {
    sender: Sender<Command>,
}

impl CommandQueue {
    pub fn enqueue_pause(&self, id: AudioId) {
        self.push(Command::Pause(id));
    }

    pub fn enqueue_unpause(&self, id: AudioId) {
        self.push(Command::Unpause(id));
    }

    pub fn enqueue_reposition(&self, id: AudioId, position: Vec2) {
        self.push(Command::Reposition(id, position));
    }

    pub fn enqueue_volume(&self, id: AudioId, volume: f32) {
        self.push(Command::SetVolume(id, volume));
    }

    pub fn push(&self, command: Command) {
        if self.sender.send(command).is_err() {
            log::warn!("Engine is gone, dropping {:?}", command);
        }
    }
}

#[derive(Default)]
struct Queued {
    commands: Vec<Command>,
    /// Consecutive ticks that ended with the target unregistered
    unmatched_ticks: u32,
}

/// Scheduler-side store of commands not yet applied, kept in enqueue order per target.
pub(crate) struct PendingCommands {
    receiver: Receiver<Command>,
    pending: HashMap<AudioId, Queued>,
}

impl PendingCommands {
    pub(crate) fn channel() -> (CommandQueue, PendingCommands) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (
            CommandQueue { sender },
            PendingCommands {
                receiver,
                pending: HashMap::new(),
            },
        )
    }

    /// Moves everything queued since the last call into the pending store.
    pub(crate) fn drain_incoming(&mut self) {
        for command in self.receiver.try_iter() {
            self.pending
                .entry(command.target())
                .or_default()
                .commands
                .push(command);
        }
    }

    /// Removes and returns every pending command for `id`, oldest first.
    pub(crate) fn take(&mut self, id: AudioId) -> Vec<Command> {
        self.pending
            .remove(&id)
            .map(|queued| queued.commands)
            .unwrap_or_default()
    }

    /// Puts back commands that could not be applied yet. They go ahead of anything that
    /// arrives later.
    pub(crate) fn defer(&mut self, id: AudioId, commands: Vec<Command>) {
        if commands.is_empty() {
            return;
        }
        let queued = self.pending.entry(id).or_default();
        let later = std::mem::replace(&mut queued.commands, commands);
        queued.commands.extend(later);
        queued.unmatched_ticks = 0;
    }

    /// Drops commands that can never be applied and returns them.
    ///
    /// Commands for a `retired` id go at once. Commands for an id that is not registered
    /// may be for a sound about to be added, so they wait `grace_ticks` ticks first.
    pub(crate) fn discard_orphans(
        &mut self,
        is_registered: impl Fn(AudioId) -> bool,
        retired: &[AudioId],
        grace_ticks: u32,
    ) -> Vec<Command> {
        let mut discarded = Vec::new();
        self.pending.retain(|id, queued| {
            if is_registered(*id) {
                queued.unmatched_ticks = 0;
                return true;
            }
            queued.unmatched_ticks += 1;
            if retired.contains(id) || queued.unmatched_ticks >= grace_ticks {
                discarded.append(&mut queued.commands);
                return false;
            }
            true
        });
        discarded
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.values().map(|queued| queued.commands.len()).sum()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
