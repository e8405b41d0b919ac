use crate::{
    audio_data::{LoadOptions, SoundBuffer, SoundLoader},
    error::{PosMixError, Result},
};
use std::fs::File;
use std::path::Path;
use symphonia::{
    core::{
        audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
        io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
    },
    default::{get_codecs, get_probe},
};

/// Default loader: treats the source key as a file path and decodes it with Symphonia.
///
/// Handles WAV, FLAC, OGG/Vorbis and the other formats Symphonia's default features
/// enable. Decoded audio is converted to `f32` and, when `target_sample_rate` is set,
/// resampled so it can be mixed directly into the output stream.
#[derive(Debug, Clone, Default)]
pub struct SymphoniaLoader {
    options: LoadOptions,
}

impl SymphoniaLoader {
    pub fn new(options: LoadOptions) -> Self {
        Self { options }
    }

    /// Loader that resamples everything to the engine's output rate.
    pub fn for_output(sample_rate: u32) -> Self {
        Self::new(LoadOptions::new().target_sample_rate(sample_rate))
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }
}

impl SoundLoader for SymphoniaLoader {
    fn load(&self, source: &str) -> Result<SoundBuffer> {
        load_audio_file(source, &self.options)
    }
}

fn load_audio_file(path: &str, options: &LoadOptions) -> Result<SoundBuffer> {
    let file = File::open(path)?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| PosMixError::AudioLoading(format!("Failed to probe {}: {}", path, e)))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| PosMixError::AudioLoading(format!("No default audio track in {}", path)))?;
    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| PosMixError::AudioLoading("Sample rate not found".to_string()))?;

    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| PosMixError::AudioLoading("Channel count not found".to_string()))?
        .count() as u16;

    if let Some(mono_ch) = options.mono_channel {
        if mono_ch >= channels as usize {
            return Err(PosMixError::AudioFormat(format!(
                "Channel {} out of range (max: {})",
                mono_ch,
                channels - 1
            )));
        }
    }

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| PosMixError::AudioLoading(format!("Failed to create decoder: {}", e)))?;

    let max_frames = options
        .max_duration
        .map(|d| (d.as_secs_f64() * sample_rate as f64) as usize)
        .unwrap_or(usize::MAX);

    let mut samples: Vec<f32> = Vec::new();
    let mut frames_decoded = 0;

    while frames_decoded < max_frames {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(_)) => break, // end-of-file
            Err(e) => {
                return Err(PosMixError::AudioLoading(format!(
                    "Error reading packet: {}",
                    e
                )));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(Error::IoError(_)) => break,
            Err(Error::DecodeError(e)) => {
                log::debug!("Skipping corrupt packet in {}: {}", path, e);
                continue;
            }
            Err(e) => {
                return Err(PosMixError::AudioLoading(format!(
                    "Error decoding packet: {}",
                    e
                )));
            }
        };

        let spec = *decoded.spec();
        let mut tmp = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        tmp.copy_interleaved_ref(decoded);

        let remaining = max_frames - frames_decoded;
        let frames: Vec<&[f32]> = tmp
            .samples()
            .chunks(channels as usize)
            .take(remaining)
            .collect();
        frames_decoded += frames.len();

        match options.mono_channel {
            Some(mono_ch) => samples.extend(frames.iter().map(|frame| frame[mono_ch])),
            None => {
                for frame in frames {
                    samples.extend_from_slice(frame);
                }
            }
        }
    }

    let mut buffer = if options.mono_channel.is_some() {
        SoundBuffer::new(samples, sample_rate, 1)?
    } else {
        let buffer = SoundBuffer::new(samples, sample_rate, channels)?;
        if options.convert_to_mono {
            buffer.to_mono()?
        } else {
            buffer
        }
    };

    if let Some(target_rate) = options.target_sample_rate {
        if target_rate != sample_rate {
            log::debug!(
                "Resampling {} from {} Hz to {} Hz",
                path,
                sample_rate,
                target_rate
            );
            buffer = buffer.resample(target_rate)?;
        }
    }

    Ok(buffer)
}
