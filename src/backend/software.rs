use crate::audio_data::SoundBuffer;
use crate::backend::{ChannelId, MixerBackend, OutputFormat};
use crate::error::{PosMixError, Result};
use crate::sync::lock;
use std::sync::{Mutex, MutexGuard};

/// One channel's playback state
struct Voice {
    buffer: SoundBuffer,
    cursor: usize,
    paused: bool,
    volume: f32,
}

impl Voice {
    fn is_busy(&self) -> bool {
        self.cursor < self.buffer.total_frames()
    }
}

#[derive(Default)]
struct MixerState {
    format: Option<OutputFormat>,
    voices: Vec<Option<Voice>>,
    volumes: Vec<f32>,
}

/// In-process mixer: one voice per channel, summed into interleaved output blocks.
///
/// The engine drives it through [`MixerBackend`]; whoever owns the output device pulls
/// audio with [`render`](Self::render). A channel's volume survives across sounds, so a
/// volume set before `play` applies to the next sound on that channel.
#[derive(Default)]
pub struct SoftwareMixer {
    state: Mutex<MixerState>,
}

impl SoftwareMixer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MixerState> {
        lock(&self.state)
    }

    /// Format given to [`init`](MixerBackend::init), if initialised.
    pub fn format(&self) -> Option<OutputFormat> {
        self.lock().format
    }

    pub fn channel_count(&self) -> usize {
        self.lock().voices.len()
    }

    /// Number of channels with a sound that has not played out.
    pub fn active_voices(&self) -> usize {
        self.lock()
            .voices
            .iter()
            .flatten()
            .filter(|voice| voice.is_busy())
            .count()
    }

    /// Mixes every playing voice into `output` (interleaved, output channel layout) and
    /// advances them. Returns the largest number of frames any voice contributed.
    ///
    /// Never blocks: if the engine holds the mixer at that moment the block is silent.
    pub fn render(&self, output: &mut [f32]) -> usize {
        output.fill(0.0);

        let Ok(mut state) = self.state.try_lock() else {
            log::trace!("Mixer busy, rendering silence");
            return 0;
        };
        let Some(format) = state.format else {
            return 0;
        };

        let out_channels = format.channels as usize;
        let frame_count = output.len() / out_channels;
        let mut frames_filled_max = 0;

        for voice in state.voices.iter_mut().flatten() {
            if voice.paused || !voice.is_busy() {
                continue;
            }

            let frames = frame_count.min(voice.buffer.total_frames() - voice.cursor);
            for frame_idx in 0..frames {
                let src_frame = voice.cursor + frame_idx;
                for channel in 0..out_channels {
                    output[frame_idx * out_channels + channel] +=
                        voice.buffer.sample_at(src_frame, channel) * voice.volume;
                }
            }

            voice.cursor += frames;
            frames_filled_max = frames_filled_max.max(frames);
        }

        frames_filled_max
    }
}

impl MixerBackend for SoftwareMixer {
    fn init(&self, format: &OutputFormat) -> Result<()> {
        if format.channels == 0 || format.sample_rate == 0 {
            return Err(PosMixError::AudioDevice(format!(
                "Unusable output format: {:?}",
                format
            )));
        }
        self.lock().format = Some(*format);
        log::debug!(
            "Software mixer initialised: {} Hz, {} channels, {} frames per block",
            format.sample_rate,
            format.channels,
            format.buffer_frames
        );
        Ok(())
    }

    fn shutdown(&self) {
        let mut state = self.lock();
        state.voices.iter_mut().for_each(|voice| *voice = None);
        state.format = None;
    }

    fn set_channel_count(&self, count: usize) -> Result<()> {
        let mut state = self.lock();
        state.voices.resize_with(count, || None);
        state.volumes.resize(count, 1.0);
        Ok(())
    }

    fn play(&self, channel: ChannelId, buffer: &SoundBuffer) -> Result<()> {
        let mut state = self.lock();
        let format = state
            .format
            .ok_or_else(|| PosMixError::Backend("Mixer is not initialised".to_string()))?;

        if buffer.is_empty() {
            return Err(PosMixError::AudioFormat("Buffer has no frames".to_string()));
        }
        if buffer.sample_rate() != format.sample_rate {
            return Err(PosMixError::AudioFormat(format!(
                "Buffer sample rate {} Hz does not match output rate {} Hz",
                buffer.sample_rate(),
                format.sample_rate
            )));
        }

        let idx = channel.index();
        let volume = *state
            .volumes
            .get(idx)
            .ok_or_else(|| PosMixError::Backend(format!("{} out of range", channel)))?;
        state.voices[idx] = Some(Voice {
            buffer: buffer.clone(),
            cursor: 0,
            paused: false,
            volume,
        });
        Ok(())
    }

    fn stop(&self, channel: ChannelId) {
        if let Some(voice) = self.lock().voices.get_mut(channel.index()) {
            *voice = None;
        }
    }

    fn pause(&self, channel: ChannelId) {
        if let Some(Some(voice)) = self.lock().voices.get_mut(channel.index()) {
            voice.paused = true;
        }
    }

    fn resume(&self, channel: ChannelId) {
        if let Some(Some(voice)) = self.lock().voices.get_mut(channel.index()) {
            voice.paused = false;
        }
    }

    fn set_volume(&self, channel: ChannelId, volume: f32) {
        let mut state = self.lock();
        let idx = channel.index();
        if let Some(slot) = state.volumes.get_mut(idx) {
            *slot = volume;
        }
        if let Some(Some(voice)) = state.voices.get_mut(idx) {
            voice.volume = volume;
        }
    }

    fn is_busy(&self, channel: ChannelId) -> bool {
        matches!(self.lock().voices.get(channel.index()), Some(Some(voice)) if voice.is_busy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixer(channels: u16, count: usize) -> SoftwareMixer {
        let mixer = SoftwareMixer::new();
        mixer
            .init(&OutputFormat {
                sample_rate: 100,
                channels,
                buffer_frames: 4,
            })
            .unwrap();
        mixer.set_channel_count(count).unwrap();
        mixer
    }

    fn tone(value: f32, frames: usize) -> SoundBuffer {
        SoundBuffer::new(vec![value; frames], 100, 1).unwrap()
    }

    #[test]
    fn test_play_until_exhausted() {
        let mixer = mixer(2, 2);
        let channel = ChannelId::new(0);
        mixer.play(channel, &tone(0.5, 6)).unwrap();
        assert!(mixer.is_busy(channel));
        assert!(!mixer.is_busy(ChannelId::new(1)));

        let mut block = vec![0.0; 8];
        assert_eq!(mixer.render(&mut block), 4);
        assert_eq!(block, vec![0.5; 8]);
        assert!(mixer.is_busy(channel));

        assert_eq!(mixer.render(&mut block), 2);
        assert_eq!(&block[..4], &[0.5; 4]);
        assert_eq!(&block[4..], &[0.0; 4]);
        assert!(!mixer.is_busy(channel));
    }

    #[test]
    fn test_voices_are_summed_with_volume() {
        let mixer = mixer(1, 2);
        mixer.play(ChannelId::new(0), &tone(0.5, 4)).unwrap();
        mixer.play(ChannelId::new(1), &tone(0.25, 4)).unwrap();
        mixer.set_volume(ChannelId::new(0), 0.5);

        let mut block = vec![0.0; 4];
        mixer.render(&mut block);
        assert_eq!(block, vec![0.5; 4]);
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn test_paused_voice_is_silent_but_busy() {
        let mixer = mixer(1, 1);
        let channel = ChannelId::new(0);
        mixer.play(channel, &tone(1.0, 8)).unwrap();
        mixer.pause(channel);

        let mut block = vec![0.0; 4];
        assert_eq!(mixer.render(&mut block), 0);
        assert_eq!(block, vec![0.0; 4]);
        assert!(mixer.is_busy(channel));

        mixer.resume(channel);
        assert_eq!(mixer.render(&mut block), 4);
        assert_eq!(block, vec![1.0; 4]);
    }

    #[test]
    fn test_stop_frees_channel() {
        let mixer = mixer(1, 1);
        let channel = ChannelId::new(0);
        mixer.play(channel, &tone(1.0, 8)).unwrap();
        mixer.stop(channel);
        assert!(!mixer.is_busy(channel));
    }

    #[test]
    fn test_volume_set_before_play_carries_over() {
        let mixer = mixer(1, 1);
        let channel = ChannelId::new(0);
        mixer.set_volume(channel, 0.25);
        mixer.play(channel, &tone(1.0, 4)).unwrap();

        let mut block = vec![0.0; 4];
        mixer.render(&mut block);
        assert_eq!(block, vec![0.25; 4]);
    }

    #[test]
    fn test_play_rejects_bad_input() {
        let mixer = mixer(1, 1);
        assert!(mixer.play(ChannelId::new(5), &tone(1.0, 4)).is_err());
        assert!(mixer.play(ChannelId::new(0), &tone(1.0, 0)).is_err());

        let wrong_rate = SoundBuffer::new(vec![0.0; 4], 44100, 1).unwrap();
        assert!(mixer.play(ChannelId::new(0), &wrong_rate).is_err());

        let uninitialised = SoftwareMixer::new();
        uninitialised.set_channel_count(1).unwrap();
        assert!(uninitialised.play(ChannelId::new(0), &tone(1.0, 4)).is_err());
    }

    #[test]
    fn test_unknown_channels_are_ignored() {
        let mixer = mixer(1, 1);
        let ghost = ChannelId::new(9);
        mixer.pause(ghost);
        mixer.resume(ghost);
        mixer.stop(ghost);
        mixer.set_volume(ghost, 0.1);
        assert!(!mixer.is_busy(ghost));
    }

    #[test]
    fn test_growing_keeps_existing_voices() {
        let mixer = mixer(1, 1);
        mixer.play(ChannelId::new(0), &tone(1.0, 4)).unwrap();
        mixer.set_channel_count(5).unwrap();
        assert_eq!(mixer.channel_count(), 5);
        assert!(mixer.is_busy(ChannelId::new(0)));
    }
}
