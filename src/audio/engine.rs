//! The audio engine: capture and playback OS threads.
//!
//! Uses std::thread (NOT tokio tasks) for the real-time loops to avoid
//! contention with async network tasks. Each thread owns its fixed,
//! pre-allocated buffers outright; the session side talks to them only
//! through bounded channels and the lock-free tap. Neither loop ever takes
//! a lock or blocks on a channel, so stopping takes effect within one
//! period of the `running` flag flipping.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

use super::alsa_device;
use super::capture::CaptureAccumulator;
use super::pcm;
use super::ring::RingBuffer;
use super::tap::AudioTap;

/// Commands delivered to the playback thread, applied strictly in arrival
/// order: a Clear fully resets the ring before any later Feed lands.
#[derive(Debug)]
pub enum PlaybackCommand {
    /// Synthesized speech samples to queue for output.
    Feed(Vec<i16>),
    /// Barge-in: drop everything queued, immediately.
    Clear,
}

/// Audio engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// ALSA capture device name (e.g. "default", "plughw:0,0")
    pub capture_device: String,
    /// ALSA playback device name
    pub playback_device: String,
    /// Session sample rate (both directions)
    pub sample_rate: u32,
    /// Outbound frame length in samples
    pub frame_size: usize,
    /// Playback ring capacity in seconds of audio. Sized for the worst-case
    /// synthesis burst — well over anything a single utterance produces.
    pub playback_buffer_secs: u32,
    /// Desired ALSA playback period size (0 = let ALSA decide)
    pub period_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capture_device: "default".to_string(),
            playback_device: "default".to_string(),
            sample_rate: 16000,
            frame_size: 4096,
            playback_buffer_secs: 120,
            period_size: 1024,
        }
    }
}

/// Owns the two real-time threads for the lifetime of the process.
///
/// - Capture thread: ALSA read → i16→f32 → tap → accumulator/gate → `frame_tx`
/// - Playback thread: `playback_rx` → ring buffer → f32→i16 → ALSA write
pub struct AudioEngine {
    running: Arc<AtomicBool>,
    capture_handle: Option<JoinHandle<()>>,
    playback_handle: Option<JoinHandle<()>>,
}

impl AudioEngine {
    pub fn start(
        config: EngineConfig,
        frame_tx: mpsc::Sender<Vec<u8>>,
        playback_rx: mpsc::Receiver<PlaybackCommand>,
        tap: Arc<AudioTap>,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));

        log::info!(
            "AudioEngine starting — capture: \"{}\", playback: \"{}\", rate: {}Hz, frame: {}, buffer: {}s",
            config.capture_device,
            config.playback_device,
            config.sample_rate,
            config.frame_size,
            config.playback_buffer_secs,
        );

        let playback_handle = {
            let running = running.clone();
            let config = config.clone();
            let tap = tap.clone();
            thread::Builder::new()
                .name("audio-playback".into())
                .spawn(move || {
                    if let Err(e) = playback_thread(&config, playback_rx, &running, &tap) {
                        log::error!("Playback thread error: {}", e);
                    }
                })?
        };

        let capture_handle = {
            let running = running.clone();
            let config = config.clone();
            thread::Builder::new()
                .name("audio-capture".into())
                .spawn(move || capture_thread(&config, frame_tx, &running, &tap))?
        };

        Ok(Self {
            running,
            capture_handle: Some(capture_handle),
            playback_handle: Some(playback_handle),
        })
    }

    /// Signal both threads to stop and wait for them to finish. The flag is
    /// checked every period, so output goes silent within one callback.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(h) = self.capture_handle.take() {
            let _ = h.join();
        }
        if let Some(h) = self.playback_handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

// ======================== Playback thread ========================

fn playback_thread(
    config: &EngineConfig,
    mut rx: mpsc::Receiver<PlaybackCommand>,
    running: &AtomicBool,
    tap: &AudioTap,
) -> Result<()> {
    let (pcm_dev, params) = alsa_device::open_playback(
        &config.playback_device,
        config.sample_rate,
        config.period_size,
    )?;
    let period = params.period_size;

    let mut ring = RingBuffer::new(params.sample_rate as usize * config.playback_buffer_secs as usize);
    let mut out_f32 = vec![0.0f32; period];
    let mut out_i16 = vec![0i16; period];

    let io = pcm_dev.io_i16()?;

    log::info!(
        "Playback started: rate={}, period={}, ring_capacity={}",
        params.sample_rate,
        period,
        ring.capacity(),
    );

    while running.load(Ordering::Relaxed) {
        // Drain pending commands without blocking; order is preserved, so a
        // Clear wipes everything fed before it and nothing fed after.
        loop {
            match rx.try_recv() {
                Ok(PlaybackCommand::Feed(samples)) => ring.feed(&samples),
                Ok(PlaybackCommand::Clear) => {
                    log::debug!("Playback clear: dropping {} queued samples", ring.available());
                    ring.clear();
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::info!("Playback command channel closed");
                    return Ok(());
                }
            }
        }

        // Exactly one period out, silence on underrun. Never blocks on the
        // session side; the writei below is what paces this loop.
        ring.pull(&mut out_f32);
        tap.playback.record(&out_f32);
        tap.set_playback_available(ring.available());
        tap.set_overflow_dropped(ring.overflow_dropped());

        for (dst, &src) in out_i16.iter_mut().zip(out_f32.iter()) {
            *dst = pcm::f32_to_i16(src);
        }

        // Write the period with XRUN recovery and a bounded retry so a
        // wedged device cannot dead-loop the thread.
        let mut written = 0;
        let mut retries = 0u32;
        while written < period {
            match io.writei(&out_i16[written..]) {
                Ok(n) => {
                    written += n;
                    retries = 0;
                }
                Err(e) => {
                    log::warn!("ALSA playback error: {}, recovering...", e);
                    retries += 1;
                    if let Err(e2) = pcm_dev.prepare() {
                        log::error!("Failed to recover PCM playback: {}", e2);
                        return Err(e2.into());
                    }
                    if retries >= 3 {
                        log::error!(
                            "Max recovery retries reached, dropping {} unwritten samples",
                            period - written
                        );
                        break;
                    }
                }
            }
        }
    }

    log::info!("Playback stopped");
    Ok(())
}

// ======================== Capture thread ========================

fn capture_thread(
    config: &EngineConfig,
    frame_tx: mpsc::Sender<Vec<u8>>,
    running: &AtomicBool,
    tap: &AudioTap,
) {
    match alsa_device::open_capture(&config.capture_device, config.sample_rate) {
        Ok((pcm_dev, params)) => {
            if let Err(e) = capture_loop(config, &pcm_dev, &params, &frame_tx, running, tap) {
                log::error!("Capture thread error: {}", e);
            }
        }
        Err(e) => {
            // Degraded but alive: the call stays valid for listening even
            // with no microphone, so keep the session up and complain
            // periodically instead of failing.
            log::error!("Capture device unavailable: {}", e);
            capture_unavailable_loop(running, tap);
        }
    }
}

fn capture_unavailable_loop(running: &AtomicBool, tap: &AudioTap) {
    let mut last_report = Instant::now();
    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(250));
        tap.incr_empty_capture_periods();
        if tap.take_capture_reset() {
            // nothing staged, but consume the request anyway
        }
        if last_report.elapsed() >= Duration::from_secs(10) {
            log::warn!("Still no capture device; session is playback-only");
            last_report = Instant::now();
        }
    }
}

fn capture_loop(
    config: &EngineConfig,
    pcm_dev: &alsa::pcm::PCM,
    params: &alsa_device::DeviceParams,
    frame_tx: &mpsc::Sender<Vec<u8>>,
    running: &AtomicBool,
    tap: &AudioTap,
) -> Result<()> {
    let period = params.period_size;
    let mut read_buf = vec![0i16; period];
    let mut conv_buf = vec![0.0f32; period];
    let mut acc = CaptureAccumulator::new(config.frame_size);

    let io = pcm_dev.io_i16()?;

    log::info!(
        "Capture started: rate={}, period={}, frame_size={}",
        params.sample_rate,
        period,
        config.frame_size,
    );

    while running.load(Ordering::Relaxed) {
        if tap.take_capture_reset() {
            acc.reset();
        }

        match io.readi(&mut read_buf) {
            Ok(0) => {
                tap.incr_empty_capture_periods();
            }
            Ok(n) => {
                for i in 0..n {
                    conv_buf[i] = pcm::i16_to_f32(read_buf[i]);
                }
                tap.capture.record(&conv_buf[..n]);

                for &v in &conv_buf[..n] {
                    // Gate input is the playback thread's published queue
                    // depth; only the value at the filling push decides.
                    let gate_closed = tap.playback_available() > 0;
                    if let Some(frame) = acc.push(v, gate_closed) {
                        let bytes = pcm::encode_frame(frame);
                        match frame_tx.try_send(bytes) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                // never block the capture loop on a slow
                                // session side; drop and count
                                tap.incr_dropped_capture_frames();
                            }
                            Err(TrySendError::Closed(_)) => {
                                log::info!("Capture frame channel closed");
                                return Ok(());
                            }
                        }
                    }
                }
                tap.set_gated_frames(acc.gated_frames());
            }
            Err(e) => {
                log::warn!("ALSA capture error: {}, recovering...", e);
                if let Err(e2) = pcm_dev.prepare() {
                    log::error!("Failed to recover PCM capture: {}", e2);
                    return Err(e2.into());
                }
            }
        }
    }

    log::info!("Capture stopped");
    Ok(())
}
