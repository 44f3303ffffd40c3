//! Session controller: owns the connection state machine, the transcript,
//! and the single inbound dispatch point.
//!
//! Every inbound message is classified as either a binary audio frame (fed
//! to the playback ring) or a control message, matched exhaustively.
//! Malformed messages are dropped with a diagnostic — only transport-level
//! failures move the session to Error.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tokio::sync::mpsc;

use crate::audio::{pcm, AudioTap, PlaybackCommand};
use crate::protocol::{self, ControlEvent, ServerMessage, TranscriptEvent};
use crate::session::{LinkCommand, LinkEvent};
use crate::state::SessionState;

pub struct Controller {
    state: SessionState,
    last_error: Option<String>,
    session_id: Option<String>,
    stop_requested: bool,
    vad_active: bool,
    transcript: Vec<TranscriptEvent>,
    link_tx: Option<mpsc::Sender<LinkCommand>>,
    playback_tx: mpsc::Sender<PlaybackCommand>,
    tap: Arc<AudioTap>,
}

impl Controller {
    pub fn new(playback_tx: mpsc::Sender<PlaybackCommand>, tap: Arc<AudioTap>) -> Self {
        Self {
            state: SessionState::Idle,
            last_error: None,
            session_id: None,
            stop_requested: false,
            vad_active: false,
            transcript: Vec::new(),
            link_tx: None,
            playback_tx,
            tap,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn transcript(&self) -> &[TranscriptEvent] {
        &self.transcript
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn vad_active(&self) -> bool {
        self.vad_active
    }

    /// Begin a session over a freshly spawned link. A start while already
    /// connecting or connected is a no-op; there is never a second session.
    pub fn begin_session(&mut self, link_tx: mpsc::Sender<LinkCommand>) -> bool {
        let next = self.state.on_start();
        if next == self.state {
            log::debug!("Start ignored, session already {:?}", self.state);
            return false;
        }
        self.state = next;
        self.last_error = None;
        self.session_id = None;
        self.stop_requested = false;
        self.vad_active = false;
        self.transcript.clear();
        self.link_tx = Some(link_tx);
        log::info!("Session starting");
        true
    }

    /// Ask the link to shut down. The state settles to Idle when the final
    /// Closed event arrives.
    pub async fn request_stop(&mut self) {
        self.stop_requested = true;
        match self.link_tx.as_ref() {
            Some(tx) => {
                if tx.send(LinkCommand::Shutdown).await.is_err() {
                    self.settle_closed("stopped".to_string()).await;
                }
            }
            None => self.settle_closed("stopped".to_string()).await,
        }
    }

    pub async fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected => {
                log::info!("Transport up, waiting for server hello");
            }
            LinkEvent::Text(text) => self.dispatch_control(&text).await,
            LinkEvent::Binary(data) => self.feed_audio(&data).await,
            LinkEvent::Closed(reason) => self.settle_closed(reason).await,
        }
    }

    /// Outbound capture frames, already gated and framed by the audio
    /// engine. Forwarded only while the session is accepted.
    pub async fn handle_capture_frame(&mut self, frame: Vec<u8>) {
        if !self.state.is_connected() {
            return;
        }
        if let Some(tx) = self.link_tx.as_ref() {
            if tx.send(LinkCommand::SendBinary(frame)).await.is_err() {
                log::warn!("Link command channel closed, dropping capture frame");
            }
        }
    }

    async fn dispatch_control(&mut self, text: &str) {
        let msg: ServerMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("Dropping malformed control message: {}", e);
                return;
            }
        };

        match msg.classify() {
            ControlEvent::Hello { session_id } => {
                if self.state == SessionState::Connecting {
                    self.state = self.state.on_accepted();
                    self.session_id = session_id;
                    log::info!(
                        "Session accepted (id: {})",
                        self.session_id.as_deref().unwrap_or("-")
                    );
                } else {
                    log::debug!("Ignoring hello in state {:?}", self.state);
                }
            }
            ControlEvent::Transcript { role, text } => {
                if self.state.is_connected() {
                    self.transcript.push(TranscriptEvent {
                        role,
                        text,
                        timestamp_ms: protocol::unix_millis(),
                    });
                }
            }
            ControlEvent::Clear => {
                if self.state.is_connected() {
                    log::info!("Barge-in: clearing playback");
                    self.send_playback(PlaybackCommand::Clear).await;
                }
            }
            ControlEvent::Media { payload } => {
                if !self.state.is_connected() {
                    return;
                }
                match BASE64.decode(payload.as_bytes()) {
                    Ok(bytes) => self.feed_audio(&bytes).await,
                    Err(e) => log::warn!("Dropping media with bad base64: {}", e),
                }
            }
            ControlEvent::Vad { active } => {
                self.vad_active = active;
            }
            ControlEvent::Unknown(disc) => {
                log::debug!("Ignoring message type \"{}\"", disc);
            }
        }
    }

    async fn feed_audio(&mut self, data: &[u8]) {
        if !self.state.is_connected() {
            return;
        }
        match pcm::decode_frame(data) {
            Some(samples) => self.send_playback(PlaybackCommand::Feed(samples)).await,
            None => log::warn!("Dropping audio frame with odd length {}", data.len()),
        }
    }

    async fn send_playback(&self, cmd: PlaybackCommand) {
        if self.playback_tx.send(cmd).await.is_err() {
            log::warn!("Playback channel closed");
        }
    }

    /// The link is gone. Wipe queued playback and the staged capture frame
    /// whatever the cause; the resulting state depends on whether the user
    /// asked for the stop.
    async fn settle_closed(&mut self, reason: String) {
        self.send_playback(PlaybackCommand::Clear).await;
        self.tap.request_capture_reset();
        self.link_tx = None;
        if self.stop_requested {
            self.state = self.state.on_stop();
            log::info!("Session stopped");
        } else {
            self.state = self.state.on_transport_failure();
            if self.state == SessionState::Error {
                log::error!("Session failed: {}", reason);
                self.last_error = Some(reason);
            }
        }
    }
}
