//! Wire protocol types for the agent session.
//!
//! Binary frames carry raw little-endian 16-bit PCM. Everything else is a
//! JSON envelope discriminated by a `type` (or legacy `event`) field.
//! Unknown discriminators are ignored, never fatal; only transport failures
//! end a session.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One line of the call transcript. Append-only; cleared when a new
/// session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub role: Role,
    pub text: String,
    pub timestamp_ms: u64,
}

pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Alternate audio transport for providers that cannot send raw binary
/// frames: base64 PCM plus a track label.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaPayload {
    pub payload: String,
    pub track: Option<String>,
}

/// Inbound structured message. Unknown fields are ignored so provider
/// extensions do not break parsing.
#[derive(Debug, Deserialize)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub msg_type: Option<String>,
    pub event: Option<String>,
    pub role: Option<Role>,
    pub text: Option<String>,
    pub state: Option<String>,
    pub session_id: Option<String>,
    pub media: Option<MediaPayload>,
    pub data: Option<Value>,
}

/// The closed set of control meanings, matched exhaustively at the one
/// dispatch point in the controller.
#[derive(Debug)]
pub enum ControlEvent {
    /// Server accepted the session.
    Hello { session_id: Option<String> },
    /// Transcript line (user speech recognized, or agent speech text).
    Transcript { role: Role, text: String },
    /// Barge-in: wipe queued playback immediately.
    Clear,
    /// base64-encoded audio for providers without binary frames.
    Media { payload: String },
    /// Voice-activity signal, consumed for visual feedback only.
    Vad { active: bool },
    /// Recognized as nothing we act on; logged and dropped.
    Unknown(String),
}

impl ServerMessage {
    /// The envelope discriminator: `type`, falling back to `event`.
    pub fn discriminator(&self) -> Option<&str> {
        self.msg_type.as_deref().or(self.event.as_deref())
    }

    pub fn classify(self) -> ControlEvent {
        let disc = self.discriminator().unwrap_or("").to_string();
        match disc.as_str() {
            "hello" => ControlEvent::Hello {
                session_id: self.session_id,
            },
            "clear" | "interrupt" => ControlEvent::Clear,
            "media" => match self.media {
                Some(m) => ControlEvent::Media { payload: m.payload },
                None => ControlEvent::Unknown("media (no payload)".to_string()),
            },
            "vad" => ControlEvent::Vad {
                active: self.state.as_deref() == Some("start"),
            },
            _ => {
                // any message carrying role + text is a transcript entry,
                // whatever the provider called it ("transcript", "stt", ...)
                if let (Some(role), Some(text)) = (self.role, self.text) {
                    ControlEvent::Transcript { role, text }
                } else {
                    ControlEvent::Unknown(disc)
                }
            }
        }
    }
}

/// Negotiation parameters sent once at connect time.
#[derive(Debug, Serialize)]
pub struct AudioParams {
    pub format: String,
    pub sample_rate: u32,
    pub frame_size: usize,
}

/// The opening control message for a session.
#[derive(Debug, Serialize)]
pub struct ClientHello {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub version: u8,
    pub transport: String,
    pub audio_params: AudioParams,
    /// Opaque agent parameters from the caller's settings, forwarded
    /// verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

impl ClientHello {
    pub fn new(sample_rate: u32, frame_size: usize, config: Option<Value>) -> Self {
        Self {
            msg_type: "hello".to_string(),
            version: 1,
            transport: "websocket".to_string(),
            audio_params: AudioParams {
                format: "pcm16".to_string(),
                sample_rate,
                frame_size,
            },
            config,
        }
    }
}
