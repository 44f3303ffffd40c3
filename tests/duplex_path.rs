//! Cross-module tests over the duplex audio path: ring buffer, capture
//! accumulator, echo gate, and the command ordering the playback thread
//! relies on.

use voxlink::audio::pcm::{encode_frame, f32_to_i16, i16_to_f32};
use voxlink::audio::capture::CaptureAccumulator;
use voxlink::audio::ring::RingBuffer;
use voxlink::audio::tap::AudioTap;
use voxlink::audio::PlaybackCommand;

/// Apply commands the way the playback thread drains its channel: strictly
/// in order, Clear wiping everything fed before it.
fn apply(ring: &mut RingBuffer, commands: Vec<PlaybackCommand>) {
    for cmd in commands {
        match cmd {
            PlaybackCommand::Feed(samples) => ring.feed(&samples),
            PlaybackCommand::Clear => ring.clear(),
        }
    }
}

#[test]
fn clear_between_feeds_removes_only_earlier_audio() {
    let mut ring = RingBuffer::new(1024);
    apply(
        &mut ring,
        vec![
            PlaybackCommand::Feed(vec![1, 2, 3]),
            PlaybackCommand::Clear,
            PlaybackCommand::Feed(vec![40, 50]),
        ],
    );
    let mut out = vec![0.0; 3];
    ring.pull(&mut out);
    assert_eq!(out[0], i16_to_f32(40));
    assert_eq!(out[1], i16_to_f32(50));
    assert_eq!(out[2], 0.0, "nothing from before the clear may survive");
}

#[test]
fn burst_larger_than_real_time_is_absorbed_without_loss() {
    // 100 s of capacity, a 20 s burst delivered at once, drained in
    // device-period chunks: every sample comes back out in order.
    let rate = 16000usize;
    let mut ring = RingBuffer::new(rate * 100);
    let burst: Vec<i16> = (0..(rate * 20)).map(|i| (i % 30000) as i16 - 15000).collect();
    ring.feed(&burst);
    assert_eq!(ring.overflow_dropped(), 0);

    let mut period = vec![0.0f32; 1024];
    let mut drained = 0usize;
    while drained < burst.len() {
        ring.pull(&mut period);
        let n = period.len().min(burst.len() - drained);
        for i in 0..n {
            assert_eq!(period[i], i16_to_f32(burst[drained + i]));
        }
        drained += n;
    }
}

#[test]
fn gate_follows_playback_queue_depth() {
    // accumulator size 4: with the playback queue empty one frame is
    // emitted; with 3 samples still queued the same capture is discarded
    let mut acc = CaptureAccumulator::new(4);
    let tap = AudioTap::new(64);

    tap.set_playback_available(0);
    let mut emitted = 0;
    for _ in 0..4 {
        if acc.push(0.5, tap.playback_available() > 0).is_some() {
            emitted += 1;
        }
    }
    assert_eq!(emitted, 1);

    tap.set_playback_available(3);
    for _ in 0..4 {
        assert!(acc.push(0.5, tap.playback_available() > 0).is_none());
    }
    assert_eq!(acc.gated_frames(), 1);
}

#[test]
fn gate_reopens_once_playback_drains() {
    let mut ring = RingBuffer::new(64);
    let mut acc = CaptureAccumulator::new(2);
    let tap = AudioTap::new(64);

    ring.feed(&[100, 200, 300]);
    tap.set_playback_available(ring.available());
    assert!(acc.push(0.1, tap.playback_available() > 0).is_none());
    assert!(acc.push(0.1, tap.playback_available() > 0).is_none());

    // playback thread drains the ring and republishes the depth
    let mut out = vec![0.0; 8];
    ring.pull(&mut out);
    tap.set_playback_available(ring.available());
    assert_eq!(tap.playback_available(), 0);

    assert!(acc.push(0.2, tap.playback_available() > 0).is_none());
    assert!(acc.push(0.2, tap.playback_available() > 0).is_some());
}

#[test]
fn wire_frame_round_trips_through_both_conversions() {
    // mic f32 → accumulator i16 → LE bytes → decode → ring f32: the value
    // that comes out of the playback path matches what the mic saw, to
    // quantization precision.
    let originals: Vec<f32> = vec![0.0, 0.25, -0.25, 0.9999, -1.0, 1.0];
    let mut acc = CaptureAccumulator::new(originals.len());
    let mut frame: Vec<i16> = Vec::new();
    for (i, &v) in originals.iter().enumerate() {
        match acc.push(v, false) {
            Some(full) => {
                assert_eq!(i, originals.len() - 1);
                frame = full.to_vec();
            }
            None => assert!(i < originals.len() - 1),
        }
    }

    let bytes = encode_frame(&frame);
    let decoded = voxlink::audio::pcm::decode_frame(&bytes).unwrap();
    let mut ring = RingBuffer::new(16);
    ring.feed(&decoded);
    let mut out = vec![0.0; originals.len()];
    ring.pull(&mut out);

    for (&orig, &back) in originals.iter().zip(out.iter()) {
        let err = (f32_to_i16(orig) as i32 - f32_to_i16(back) as i32).abs();
        assert!(err <= 1, "{} -> {} drifts {} LSB", orig, back, err);
    }
}

#[test]
fn snapshot_tap_sees_what_playback_emitted() {
    let mut ring = RingBuffer::new(64);
    let tap = AudioTap::new(8);
    ring.feed(&[1000, 2000, 3000, 4000]);

    let mut period = vec![0.0f32; 4];
    ring.pull(&mut period);
    tap.playback.record(&period);

    let mut snap = vec![0.0f32; 4];
    tap.playback.snapshot(&mut snap);
    assert_eq!(snap, period);
}
