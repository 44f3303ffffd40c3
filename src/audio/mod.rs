//! audio - The real-time half of the duplex call pipeline.
//!
//! Capture and playback run in dedicated OS threads against ALSA; the
//! session side reaches them only through bounded channels and the
//! lock-free tap. Raw 16-bit PCM in both directions — no codec.

mod alsa_device;
mod engine;
pub mod capture;
pub mod pcm;
pub mod ring;
pub mod tap;

pub use engine::{AudioEngine, EngineConfig, PlaybackCommand};
pub use tap::{AudioTap, TapCounters};
