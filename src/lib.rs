//! voxlink — a native duplex voice-call client core.
//!
//! Captures microphone audio, streams it to a remote conversational agent
//! over a WebSocket, and plays back the agent's synthesized speech. The
//! real-time audio side lives in [`audio`]; the session side is
//! [`session`] + [`controller`]; they meet only at bounded channels and
//! the lock-free [`audio::AudioTap`].

pub mod audio;
pub mod config;
pub mod controller;
pub mod protocol;
pub mod session;
pub mod state;
