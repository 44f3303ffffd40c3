//! Runtime configuration, loaded from a TOML file with per-field defaults.
//!
//! Everything the settings side hands us is carried here; the agent
//! parameters stay opaque and are forwarded verbatim in the hello message.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use crate::audio::EngineConfig;

const CLIENT_ID_FILE: &str = "voxlink_client_id.txt";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// WebSocket endpoint of the agent backend
    pub server_url: String,
    /// Bearer token, empty for unauthenticated endpoints
    pub auth_token: String,
    /// Device identity header; generated per run when unset
    pub device_id: String,
    /// Client identity header; persisted across restarts when generated
    pub client_id: String,
    /// Session sample rate, both directions
    pub sample_rate: u32,
    /// Outbound frame length in samples
    pub frame_size: usize,
    /// Playback ring capacity in seconds
    pub playback_buffer_secs: u32,
    pub capture_device: String,
    pub playback_device: String,
    /// Desired ALSA playback period size (0 = let ALSA decide)
    pub period_size: usize,
    /// Opaque agent negotiation parameters from the settings UI
    pub agent_params: Option<Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8765/call".to_string(),
            auth_token: String::new(),
            device_id: String::new(),
            client_id: String::new(),
            sample_rate: 16000,
            frame_size: 4096,
            playback_buffer_secs: 120,
            capture_device: "default".to_string(),
            playback_device: "default".to_string(),
            period_size: 1024,
            agent_params: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Load from `path` if given, otherwise `voxlink.toml` if present,
    /// otherwise built-in defaults.
    pub fn load_or_default(path: Option<&str>) -> Self {
        let path = Path::new(path.unwrap_or("voxlink.toml"));
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Using default config: {}", e);
                Self::default()
            }
        }
    }

    /// Fill in generated identities. The client id is persisted to a small
    /// file so the device keeps its identity across restarts.
    pub fn ensure_identity(&mut self) {
        if self.device_id.is_empty() {
            self.device_id = uuid::Uuid::new_v4().to_string();
        }
        if self.client_id.is_empty() {
            if let Ok(content) = std::fs::read_to_string(CLIENT_ID_FILE) {
                let trimmed = content.trim();
                if !trimmed.is_empty() {
                    self.client_id = trimmed.to_string();
                    log::info!("Loaded client id from {}", CLIENT_ID_FILE);
                    return;
                }
            }
            self.client_id = uuid::Uuid::new_v4().to_string();
            if let Err(e) = std::fs::write(CLIENT_ID_FILE, &self.client_id) {
                log::warn!("Failed to persist client id: {}", e);
            }
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            capture_device: self.capture_device.clone(),
            playback_device: self.playback_device.clone(),
            sample_rate: self.sample_rate,
            frame_size: self.frame_size,
            playback_buffer_secs: self.playback_buffer_secs,
            period_size: self.period_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_uses_defaults_for_the_rest() {
        let config: Config = toml::from_str(
            r#"
            server_url = "wss://agent.example.com/call"
            sample_rate = 24000
            "#,
        )
        .unwrap();
        assert_eq!(config.server_url, "wss://agent.example.com/call");
        assert_eq!(config.sample_rate, 24000);
        assert_eq!(config.frame_size, 4096);
        assert_eq!(config.playback_buffer_secs, 120);
        assert_eq!(config.capture_device, "default");
    }

    #[test]
    fn agent_params_parse_as_opaque_value() {
        let config: Config = toml::from_str(
            r#"
            [agent_params]
            voice = "aria"
            temperature = 0.7
            "#,
        )
        .unwrap();
        let params = config.agent_params.unwrap();
        assert_eq!(params["voice"], "aria");
    }

    #[test]
    fn default_buffer_covers_worst_case_burst() {
        let config = Config::default();
        // ring must absorb at least 100 seconds of audio
        assert!(config.playback_buffer_secs >= 100);
    }
}
