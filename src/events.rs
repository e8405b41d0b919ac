//! Event types for posmix

use crate::audio::AudioId;
use crossbeam_channel::{Receiver, Sender, TrySendError};

/// Notifications emitted by the engine, collected with
/// [`PosMixEngine::poll_events`](crate::PosMixEngine::poll_events).
#[derive(Debug, Clone, PartialEq)]
pub enum PosMixEvent {
    SourceStarted { audio_id: AudioId },
    SourceFinished { audio_id: AudioId },
    SourcePaused { audio_id: AudioId },
    SourceResumed { audio_id: AudioId },
    SourceRemoved { audio_id: AudioId },
    SourceError { audio_id: AudioId, error: String },
    ChannelPoolGrown { capacity: usize },
    CommandDiscarded { audio_id: AudioId },
    EngineStarted,
    EngineStopped,
}

impl PosMixEvent {
    pub fn audio_id(&self) -> Option<AudioId> {
        match self {
            Self::SourceStarted { audio_id }
            | Self::SourceFinished { audio_id }
            | Self::SourcePaused { audio_id }
            | Self::SourceResumed { audio_id }
            | Self::SourceRemoved { audio_id }
            | Self::SourceError { audio_id, .. }
            | Self::CommandDiscarded { audio_id } => Some(*audio_id),
            Self::ChannelPoolGrown { .. } | Self::EngineStarted | Self::EngineStopped => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::SourceError { .. })
    }

    pub fn is_source_event(&self) -> bool {
        self.audio_id().is_some()
    }
}

/// Sending half of the event channel, cloned into every component that reports events.
///
/// The channel is bounded; when nobody drains it, new events are dropped rather than
/// stalling the scheduler.
#[derive(Clone)]
pub(crate) struct EventSink {
    sender: Sender<PosMixEvent>,
}

impl EventSink {
    pub(crate) fn channel(capacity: usize) -> (Self, Receiver<PosMixEvent>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub(crate) fn emit(&self, event: PosMixEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                log::trace!("Event buffer full, dropping {:?}", event);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
