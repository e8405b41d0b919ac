//! Backend double that records every call, for scheduler and engine tests.

use crate::audio_data::SoundBuffer;
use crate::backend::{ChannelId, MixerBackend, OutputFormat};
use crate::error::{PosMixError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BackendCall {
    Init(OutputFormat),
    Shutdown,
    SetChannelCount(usize),
    Play(ChannelId),
    Stop(ChannelId),
    Pause(ChannelId),
    Resume(ChannelId),
    SetVolume(ChannelId, f32),
}

#[derive(Default)]
struct Recorded {
    calls: Vec<BackendCall>,
    busy: HashMap<ChannelId, bool>,
    volumes: HashMap<ChannelId, f32>,
    failing_play: HashSet<ChannelId>,
    fail_growth: bool,
}

/// Channels report busy from `play` until `stop` or [`RecordingBackend::finish`].
#[derive(Default)]
pub(crate) struct RecordingBackend {
    inner: Mutex<Recorded>,
}

impl RecordingBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn calls(&self) -> Vec<BackendCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub(crate) fn count(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| predicate(c))
            .count()
    }

    pub(crate) fn volume(&self, channel: ChannelId) -> Option<f32> {
        self.inner.lock().unwrap().volumes.get(&channel).copied()
    }

    /// Simulates the channel's sound playing out.
    pub(crate) fn finish(&self, channel: ChannelId) {
        self.inner.lock().unwrap().busy.insert(channel, false);
    }

    pub(crate) fn fail_play_on(&self, channel: ChannelId) {
        self.inner.lock().unwrap().failing_play.insert(channel);
    }

    pub(crate) fn fail_growth(&self) {
        self.inner.lock().unwrap().fail_growth = true;
    }

    fn record(&self, call: BackendCall) {
        self.inner.lock().unwrap().calls.push(call);
    }
}

impl MixerBackend for RecordingBackend {
    fn init(&self, format: &OutputFormat) -> Result<()> {
        self.record(BackendCall::Init(*format));
        Ok(())
    }

    fn shutdown(&self) {
        self.record(BackendCall::Shutdown);
    }

    fn set_channel_count(&self, count: usize) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_growth {
            return Err(PosMixError::Backend("channel table is full".to_string()));
        }
        inner.calls.push(BackendCall::SetChannelCount(count));
        Ok(())
    }

    fn play(&self, channel: ChannelId, _buffer: &SoundBuffer) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(BackendCall::Play(channel));
        if inner.failing_play.contains(&channel) {
            return Err(PosMixError::AudioFormat("malformed source".to_string()));
        }
        inner.busy.insert(channel, true);
        Ok(())
    }

    fn stop(&self, channel: ChannelId) {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(BackendCall::Stop(channel));
        inner.busy.insert(channel, false);
    }

    fn pause(&self, channel: ChannelId) {
        self.record(BackendCall::Pause(channel));
    }

    fn resume(&self, channel: ChannelId) {
        self.record(BackendCall::Resume(channel));
    }

    fn set_volume(&self, channel: ChannelId, volume: f32) {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(BackendCall::SetVolume(channel, volume));
        inner.volumes.insert(channel, volume);
    }

    fn is_busy(&self, channel: ChannelId) -> bool {
        self.inner
            .lock()
            .unwrap()
            .busy
            .get(&channel)
            .copied()
            .unwrap_or(false)
    }
}
