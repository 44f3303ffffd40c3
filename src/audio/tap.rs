//! Lock-free observability tap shared between the audio threads and the
//! rest of the process.
//!
//! Each snapshot ring has exactly one writer (the owning audio thread);
//! readers copy the most recent samples without locking or allocating, so
//! the visualizer can poll every animation frame while the real-time loop
//! keeps writing. Counters are plain relaxed atomics — they are diagnostics,
//! not synchronization.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

/// Single-writer ring of recent samples, readable concurrently.
pub struct SnapshotRing {
    samples: Box<[AtomicU32]>,
    cursor: AtomicUsize,
}

impl SnapshotRing {
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "snapshot ring length must be non-zero");
        let samples = (0..len).map(|_| AtomicU32::new(0)).collect::<Vec<_>>();
        Self {
            samples: samples.into_boxed_slice(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Record samples. Writer side only — called from the owning audio
    /// thread once per period.
    pub fn record(&self, samples: &[f32]) {
        let len = self.samples.len();
        let mut cursor = self.cursor.load(Ordering::Relaxed);
        for &v in samples {
            self.samples[cursor % len].store(v.to_bits(), Ordering::Relaxed);
            cursor = cursor.wrapping_add(1);
        }
        // publish the new cursor after the sample stores
        self.cursor.store(cursor, Ordering::Release);
    }

    /// Copy the most recent `out.len()` samples into `out`, oldest first.
    /// Slots with no recorded history are left at silence.
    pub fn snapshot(&self, out: &mut [f32]) {
        let len = self.samples.len();
        let cursor = self.cursor.load(Ordering::Acquire);
        let want = out.len().min(len).min(cursor);
        let start = cursor - want;
        out.fill(0.0);
        let base = out.len() - want;
        for i in 0..want {
            let bits = self.samples[(start + i) % len].load(Ordering::Relaxed);
            out[base + i] = f32::from_bits(bits);
        }
    }
}

/// Counter values captured at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TapCounters {
    pub overflow_dropped: u64,
    pub gated_frames: u64,
    pub empty_capture_periods: u64,
    pub dropped_capture_frames: u64,
}

pub struct AudioTap {
    pub capture: SnapshotRing,
    pub playback: SnapshotRing,
    playback_available: AtomicUsize,
    overflow_dropped: AtomicU64,
    gated_frames: AtomicU64,
    empty_capture_periods: AtomicU64,
    dropped_capture_frames: AtomicU64,
    capture_reset: AtomicBool,
}

impl AudioTap {
    pub fn new(snapshot_len: usize) -> Self {
        Self {
            capture: SnapshotRing::new(snapshot_len),
            playback: SnapshotRing::new(snapshot_len),
            playback_available: AtomicUsize::new(0),
            overflow_dropped: AtomicU64::new(0),
            gated_frames: AtomicU64::new(0),
            empty_capture_periods: AtomicU64::new(0),
            dropped_capture_frames: AtomicU64::new(0),
            capture_reset: AtomicBool::new(false),
        }
    }

    /// Published by the playback thread after each period; read by the
    /// capture thread as the half-duplex gate input.
    pub fn set_playback_available(&self, n: usize) {
        self.playback_available.store(n, Ordering::Relaxed);
    }

    pub fn playback_available(&self) -> usize {
        self.playback_available.load(Ordering::Relaxed)
    }

    pub fn set_overflow_dropped(&self, n: u64) {
        self.overflow_dropped.store(n, Ordering::Relaxed);
    }

    pub fn set_gated_frames(&self, n: u64) {
        self.gated_frames.store(n, Ordering::Relaxed);
    }

    pub fn incr_empty_capture_periods(&self) {
        self.empty_capture_periods.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_dropped_capture_frames(&self) {
        self.dropped_capture_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Ask the capture thread to discard its partially staged frame. The
    /// request is consumed on the next capture period.
    pub fn request_capture_reset(&self) {
        self.capture_reset.store(true, Ordering::Release);
    }

    pub fn take_capture_reset(&self) -> bool {
        self.capture_reset.swap(false, Ordering::Acquire)
    }

    pub fn counters(&self) -> TapCounters {
        TapCounters {
            overflow_dropped: self.overflow_dropped.load(Ordering::Relaxed),
            gated_frames: self.gated_frames.load(Ordering::Relaxed),
            empty_capture_periods: self.empty_capture_periods.load(Ordering::Relaxed),
            dropped_capture_frames: self.dropped_capture_frames.load(Ordering::Relaxed),
        }
    }
}
