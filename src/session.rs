//! The WebSocket link to the agent backend.
//!
//! One task per session: connect, send the hello negotiation message, then
//! pump inbound frames to the controller and outbound commands to the wire.
//! The link does NOT reconnect on its own — whether to retry a failed
//! session is the caller's policy, decided in main.

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

use crate::config::Config;
use crate::protocol::ClientHello;

#[derive(Debug)]
pub enum LinkEvent {
    /// Transport is up and the hello was sent. The session only counts as
    /// accepted once the server's hello arrives as a Text event.
    Connected,
    Text(String),
    Binary(Vec<u8>),
    /// The link is gone, cleanly or not; the reason is informational.
    Closed(String),
}

#[derive(Debug)]
pub enum LinkCommand {
    SendText(String),
    SendBinary(Vec<u8>),
    Shutdown,
}

pub struct SessionLink {
    config: Config,
    tx: mpsc::Sender<LinkEvent>,
    rx_cmd: mpsc::Receiver<LinkCommand>,
}

impl SessionLink {
    pub fn new(
        config: Config,
        tx: mpsc::Sender<LinkEvent>,
        rx_cmd: mpsc::Receiver<LinkCommand>,
    ) -> Self {
        Self { config, tx, rx_cmd }
    }

    /// Run the link to completion. Always emits a final `Closed` event so
    /// the controller can settle its state regardless of how we exit.
    pub async fn run(mut self) {
        let reason = match self.connect_and_loop().await {
            Ok(()) => "stopped".to_string(),
            Err(e) => {
                log::warn!("Session link failed: {}", e);
                e.to_string()
            }
        };
        let _ = self.tx.send(LinkEvent::Closed(reason)).await;
    }

    async fn connect_and_loop(&mut self) -> Result<()> {
        let url = Url::parse(&self.config.server_url)?;
        let host = url.host_str().unwrap_or_default().to_string();

        let mut request = tokio_tungstenite::tungstenite::http::Request::builder()
            .method("GET")
            .uri(self.config.server_url.as_str())
            .header("Host", host)
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header(
                "Sec-WebSocket-Key",
                tokio_tungstenite::tungstenite::handshake::client::generate_key(),
            )
            .header("Device-Id", &self.config.device_id)
            .header("Client-Id", &self.config.client_id)
            .header("Protocol-Version", "1");
        if !self.config.auth_token.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.config.auth_token));
        }
        let request = request.body(())?;

        log::info!("Connecting to {}...", self.config.server_url);
        let (ws_stream, _) = connect_async(request).await?;
        log::info!("Transport connected");

        let (mut write, mut read) = ws_stream.split();

        self.tx.send(LinkEvent::Connected).await?;

        // Negotiation happens once, up front: sample rate, frame size,
        // codec, plus whatever opaque agent parameters the caller set.
        let hello = ClientHello::new(
            self.config.sample_rate,
            self.config.frame_size,
            self.config.agent_params.clone(),
        );
        let hello_json = serde_json::to_string(&hello)?;
        log::debug!("Sending hello: {}", hello_json);
        write.send(Message::Text(hello_json.into())).await?;

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.tx.send(LinkEvent::Text(text.to_string())).await?;
                        }
                        Some(Ok(Message::Binary(data))) => {
                            self.tx.send(LinkEvent::Binary(data.to_vec())).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            log::info!("Server closed connection: {:?}", frame);
                            anyhow::bail!("connection closed by server");
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => anyhow::bail!("connection closed"),
                    }
                }
                cmd = self.rx_cmd.recv() => {
                    match cmd {
                        Some(LinkCommand::SendText(text)) => {
                            write.send(Message::Text(text.into())).await?;
                        }
                        Some(LinkCommand::SendBinary(data)) => {
                            write.send(Message::Binary(data.into())).await?;
                        }
                        Some(LinkCommand::Shutdown) | None => {
                            let _ = write.send(Message::Close(None)).await;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
