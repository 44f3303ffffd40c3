use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::mpsc;

use voxlink::audio::{AudioEngine, AudioTap, PlaybackCommand};
use voxlink::config::Config;
use voxlink::controller::Controller;
use voxlink::session::{LinkEvent, SessionLink};
use voxlink::state::SessionState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config_path = std::env::args().nth(1);
    let mut config = Config::load_or_default(config_path.as_deref());
    config.ensure_identity();

    let tap = Arc::new(AudioTap::new(2048));
    let (playback_tx, playback_rx) = mpsc::channel::<PlaybackCommand>(256);
    let (frame_tx, mut frame_rx) = mpsc::channel::<Vec<u8>>(32);

    // The engine outlives individual sessions; its threads run until exit.
    let mut engine =
        AudioEngine::start(config.engine_config(), frame_tx, playback_rx, tap.clone())?;

    let mut controller = Controller::new(playback_tx, tap.clone());

    log::info!(
        "voxlink started (device {}, client {})",
        config.device_id,
        config.client_id
    );

    'sessions: loop {
        let (link_tx, link_cmd_rx) = mpsc::channel(100);
        let (event_tx, mut event_rx) = mpsc::channel::<LinkEvent>(100);
        controller.begin_session(link_tx);

        let link = SessionLink::new(config.clone(), event_tx, link_cmd_rx);
        tokio::spawn(link.run());

        loop {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    log::info!("Received Ctrl+C, shutting down...");
                    controller.request_stop().await;
                    // drain until the link confirms it is gone
                    while let Some(event) = event_rx.recv().await {
                        let closed = matches!(event, LinkEvent::Closed(_));
                        controller.handle_link_event(event).await;
                        if closed {
                            break;
                        }
                    }
                    break 'sessions;
                }
                Some(event) = event_rx.recv() => {
                    let closed = matches!(event, LinkEvent::Closed(_));
                    controller.handle_link_event(event).await;
                    if closed {
                        break;
                    }
                }
                Some(frame) = frame_rx.recv() => {
                    controller.handle_capture_frame(frame).await;
                }
            }
        }

        // Reconnect is caller policy, decided here rather than inside the
        // link: retry failed sessions after a pause, leave on explicit stop.
        match controller.state() {
            SessionState::Error => {
                log::info!(
                    "Session error: {}. Retrying in 5s...",
                    controller.last_error().unwrap_or("unknown")
                );
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            _ => break,
        }
    }

    engine.stop();
    let counters = tap.counters();
    log::info!(
        "Shutdown complete (overflow_dropped: {}, gated_frames: {}, dropped_capture_frames: {})",
        counters.overflow_dropped,
        counters.gated_frames,
        counters.dropped_capture_frames,
    );
    Ok(())
}
