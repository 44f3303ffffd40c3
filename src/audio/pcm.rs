//! 16-bit PCM sample conversion and little-endian byte framing.
//!
//! The int↔float conversion uses asymmetric divisors (/32768 for negative
//! values, /32767 for non-negative) so the representable range stays
//! symmetric around zero. This matches standard 16-bit PCM practice; a full
//! round trip is exact for negative samples and within ±1 for positive ones.

use bytes::{BufMut, BytesMut};

/// Convert one 16-bit PCM sample to a normalized f32 amplitude in [-1.0, 1.0].
#[inline]
pub fn i16_to_f32(s: i16) -> f32 {
    if s < 0 {
        s as f32 / 32768.0
    } else {
        s as f32 / 32767.0
    }
}

/// Convert one normalized f32 amplitude back to a 16-bit PCM sample.
///
/// Input is clamped to [-1.0, 1.0] first; out-of-range and non-finite
/// values can never overflow the i16 range (Rust float→int casts saturate).
#[inline]
pub fn f32_to_i16(v: f32) -> i16 {
    let v = v.clamp(-1.0, 1.0);
    if v < 0.0 {
        (v * 32768.0) as i16
    } else {
        (v * 32767.0) as i16
    }
}

/// Encode samples as raw little-endian bytes, the outbound wire format.
pub fn encode_frame(samples: &[i16]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(samples.len() * 2);
    for &s in samples {
        buf.put_i16_le(s);
    }
    buf.to_vec()
}

/// Decode a raw little-endian byte frame into samples.
///
/// Returns `None` for an odd byte count — a malformed frame is dropped by
/// the caller, it never feeds half a sample into the playback path.
pub fn decode_frame(data: &[u8]) -> Option<Vec<i16>> {
    if data.len() % 2 != 0 {
        return None;
    }
    Some(
        data.chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect(),
    )
}
