//! Capture accumulator with half-duplex echo gate.
//!
//! Microphone samples arrive one at a time from the capture thread and are
//! staged into fixed-size frames for the wire. When a frame fills while the
//! agent's speech is still queued or playing, the whole frame is discarded
//! instead of emitted — otherwise the agent hears its own playback and
//! misreads it as a user interruption. The gate is binary and sampled once
//! per frame flush; there is no partial suppression.

use super::pcm;

pub struct CaptureAccumulator {
    frame: Box<[i16]>,
    fill_index: usize,
    gated_frames: u64,
}

impl CaptureAccumulator {
    pub fn new(frame_size: usize) -> Self {
        assert!(frame_size > 0, "capture frame size must be non-zero");
        Self {
            frame: vec![0; frame_size].into_boxed_slice(),
            fill_index: 0,
            gated_frames: 0,
        }
    }

    /// Stage one captured sample, converting f32 → 16-bit PCM.
    ///
    /// Returns the completed frame when this push fills it and the gate is
    /// open; a frame completed while `gate_closed` is discarded and counted.
    /// The accumulator resets either way, so `fill_index` stays below the
    /// frame size between calls.
    pub fn push(&mut self, sample: f32, gate_closed: bool) -> Option<&[i16]> {
        self.frame[self.fill_index] = pcm::f32_to_i16(sample);
        self.fill_index += 1;
        if self.fill_index < self.frame.len() {
            return None;
        }
        self.fill_index = 0;
        if gate_closed {
            self.gated_frames += 1;
            None
        } else {
            Some(&self.frame)
        }
    }

    /// Discard any partially staged frame. Called on session teardown — a
    /// partial frame cannot be time-aligned, so it is never emitted.
    pub fn reset(&mut self) {
        self.fill_index = 0;
    }

    pub fn frame_size(&self) -> usize {
        self.frame.len()
    }

    /// Frames discarded by the echo gate since construction.
    pub fn gated_frames(&self) -> u64 {
        self.gated_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::pcm::{f32_to_i16, i16_to_f32};

    #[test]
    fn emits_exactly_one_frame_when_full_and_open() {
        let mut acc = CaptureAccumulator::new(4);
        let samples = [0.1, -0.2, 0.3, -0.4];
        assert!(acc.push(samples[0], false).is_none());
        assert!(acc.push(samples[1], false).is_none());
        assert!(acc.push(samples[2], false).is_none());
        let frame = acc.push(samples[3], false).expect("frame on fourth push");
        let expected: Vec<i16> = samples.iter().map(|&v| f32_to_i16(v)).collect();
        assert_eq!(frame, expected.as_slice());
        assert_eq!(acc.gated_frames(), 0);
    }

    #[test]
    fn closed_gate_discards_the_full_frame() {
        let mut acc = CaptureAccumulator::new(4);
        for _ in 0..3 {
            assert!(acc.push(0.5, true).is_none());
        }
        assert!(acc.push(0.5, true).is_none());
        assert_eq!(acc.gated_frames(), 1);
        // the next full frame with the gate open comes out clean
        for _ in 0..3 {
            assert!(acc.push(0.25, false).is_none());
        }
        let frame = acc.push(0.25, false).expect("frame after gate reopened");
        assert!(frame.iter().all(|&s| s == f32_to_i16(0.25)));
    }

    #[test]
    fn only_the_flush_time_gate_decides() {
        // gate closed during staging but open at the filling push: emit
        let mut acc = CaptureAccumulator::new(3);
        assert!(acc.push(0.0, true).is_none());
        assert!(acc.push(0.0, true).is_none());
        assert!(acc.push(0.0, false).is_some());
        assert_eq!(acc.gated_frames(), 0);
    }

    #[test]
    fn reset_discards_partial_frame() {
        let mut acc = CaptureAccumulator::new(4);
        acc.push(0.9, false);
        acc.push(0.9, false);
        acc.reset();
        // three more pushes must not complete a frame
        assert!(acc.push(0.1, false).is_none());
        assert!(acc.push(0.1, false).is_none());
        assert!(acc.push(0.1, false).is_none());
        let frame = acc.push(0.1, false).expect("fresh frame after reset");
        assert!(frame.iter().all(|&s| s == f32_to_i16(0.1)));
    }

    #[test]
    fn capture_conversion_round_trips_within_one_lsb() {
        let mut acc = CaptureAccumulator::new(2);
        let original: i16 = -12345;
        acc.push(i16_to_f32(original), false);
        let frame = acc.push(i16_to_f32(original), false).unwrap();
        assert!((frame[0] as i32 - original as i32).abs() <= 1);
    }
}
