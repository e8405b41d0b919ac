//! Positional sound mixer: plays sounds placed in a 2D world on a pool of mixer
//! channels and scales each channel's volume by its distance to a single listener.

pub mod attenuation;
pub mod audio;
pub mod audio_data;
pub mod backend;
pub mod channel;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod math;
pub mod registry;
mod scheduler;
mod sync;

pub use audio::{Audio, AudioId, AudioInfo, SoundState};
pub use audio_data::{LoadOptions, SoundBuffer, SoundLoader, SymphoniaLoader};
#[cfg(feature = "cpal-output")]
pub use backend::CpalOutput;
pub use backend::{ChannelId, MixerBackend, OutputFormat, SoftwareMixer};
pub use command::{Command, CommandQueue};
pub use config::PosMixDesc;
pub use engine::PosMixEngine;
pub use error::{PosMixError, Result};
pub use events::PosMixEvent;
pub use math::Vec2;
pub use registry::AudioRegistry;
