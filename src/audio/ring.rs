//! Fixed-capacity playback ring buffer.
//!
//! Decouples the bursty synthesis stream (the server can deliver 20 s of
//! speech in under 2 s) from the fixed-rate output device. Capacity is fixed
//! at construction and sized for the worst-case burst; the buffer never
//! grows and `pull` never blocks, so it is safe to drive from the playback
//! thread's period loop.

use super::pcm;

pub struct RingBuffer {
    buf: Box<[f32]>,
    capacity: usize,
    write_index: usize,
    read_index: usize,
    available: usize,
    overflow_dropped: u64,
}

impl RingBuffer {
    /// Create a buffer holding `capacity` samples, pre-allocated once.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            buf: vec![0.0; capacity].into_boxed_slice(),
            capacity,
            write_index: 0,
            read_index: 0,
            available: 0,
            overflow_dropped: 0,
        }
    }

    /// Append 16-bit PCM samples, converting to normalized f32.
    ///
    /// Producer wins on overflow: when the buffer is full the oldest unread
    /// sample is overwritten and counted in `overflow_dropped`. Feeding
    /// never blocks and never allocates.
    pub fn feed(&mut self, samples: &[i16]) {
        for &s in samples {
            self.buf[self.write_index] = pcm::i16_to_f32(s);
            self.write_index = (self.write_index + 1) % self.capacity;
            if self.available == self.capacity {
                // full: drop the oldest sample by dragging the read index
                self.read_index = (self.read_index + 1) % self.capacity;
                self.overflow_dropped += 1;
            } else {
                self.available += 1;
            }
        }
    }

    /// Fill `out` from the buffer, substituting silence when empty.
    ///
    /// Always fills the entire slice and never blocks — this is the device
    /// output path, an underrun produces zeros rather than a stall.
    pub fn pull(&mut self, out: &mut [f32]) {
        for slot in out.iter_mut() {
            if self.available > 0 {
                *slot = self.buf[self.read_index];
                self.read_index = (self.read_index + 1) % self.capacity;
                self.available -= 1;
            } else {
                *slot = 0.0;
            }
        }
    }

    /// Drop all queued samples. Used for barge-in interruption.
    pub fn clear(&mut self) {
        self.write_index = 0;
        self.read_index = 0;
        self.available = 0;
    }

    pub fn available(&self) -> usize {
        self.available
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total samples lost to overflow since construction.
    pub fn overflow_dropped(&self) -> u64 {
        self.overflow_dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::pcm::i16_to_f32;

    fn pull_n(rb: &mut RingBuffer, n: usize) -> Vec<f32> {
        let mut out = vec![0.0; n];
        rb.pull(&mut out);
        out
    }

    #[test]
    fn fifo_order_preserved() {
        let mut rb = RingBuffer::new(16);
        let input: Vec<i16> = vec![10, -20, 30, -40, 50];
        rb.feed(&input);
        let out = pull_n(&mut rb, 5);
        let expected: Vec<f32> = input.iter().map(|&s| i16_to_f32(s)).collect();
        assert_eq!(out, expected);
        assert_eq!(rb.available(), 0);
    }

    #[test]
    fn partial_pull_leaves_remainder() {
        // capacity 10, feed [1,2,3], pull 2 -> conv(1), conv(2), one left
        let mut rb = RingBuffer::new(10);
        rb.feed(&[1, 2, 3]);
        let out = pull_n(&mut rb, 2);
        assert_eq!(out, vec![i16_to_f32(1), i16_to_f32(2)]);
        assert_eq!(rb.available(), 1);
    }

    #[test]
    fn underrun_yields_silence() {
        let mut rb = RingBuffer::new(8);
        rb.feed(&[100]);
        let out = pull_n(&mut rb, 4);
        assert_eq!(out[0], i16_to_f32(100));
        assert_eq!(&out[1..], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn overflow_drops_oldest() {
        // capacity 5, feed 1..=7 -> oldest two lost, pull returns conv(3..=7)
        let mut rb = RingBuffer::new(5);
        rb.feed(&[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(rb.available(), 5);
        assert_eq!(rb.overflow_dropped(), 2);
        let out = pull_n(&mut rb, 5);
        let expected: Vec<f32> = [3, 4, 5, 6, 7].iter().map(|&s| i16_to_f32(s)).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn overflow_never_shorts_a_full_pull() {
        let mut rb = RingBuffer::new(4);
        let input: Vec<i16> = (0..100).collect();
        rb.feed(&input);
        let out = pull_n(&mut rb, 4);
        let expected: Vec<f32> = [96, 97, 98, 99].iter().map(|&s| i16_to_f32(s)).collect();
        assert_eq!(out, expected);
        assert_eq!(rb.overflow_dropped(), 96);
    }

    #[test]
    fn wraparound_has_no_discontinuity() {
        let mut rb = RingBuffer::new(7);
        let mut next: i16 = 0;
        // many feed/pull cycles crossing the boundary repeatedly
        for _ in 0..50 {
            let chunk: Vec<i16> = (next..next + 5).collect();
            rb.feed(&chunk);
            let out = pull_n(&mut rb, 5);
            for (i, &v) in out.iter().enumerate() {
                assert_eq!(v, i16_to_f32(next + i as i16));
            }
            next += 5;
        }
        assert_eq!(rb.overflow_dropped(), 0);
    }

    #[test]
    fn clear_discards_everything_before_it() {
        let mut rb = RingBuffer::new(32);
        rb.feed(&[1, 2, 3]); // A
        rb.clear();
        rb.feed(&[7, 8]); // B
        let out = pull_n(&mut rb, 4);
        assert_eq!(out[0], i16_to_f32(7));
        assert_eq!(out[1], i16_to_f32(8));
        assert_eq!(&out[2..], &[0.0, 0.0]);
    }
}
