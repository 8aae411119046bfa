//! Flat ball buffer (wire format)
//!
//! Each ball occupies 8 little-endian f32 slots:
//! `[radius, reserved, x, y, vx, vy, color, reserved]`.
//! The reserved slots pad the record to 32 bytes, which is exactly the layout
//! WGSL gives `struct Ball { radius: f32, position: vec2<f32>, velocity:
//! vec2<f32>, color: f32 }` (vec2 aligns to 8). The GPU kernel uploads
//! `BallRecord` slices byte-for-byte.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use super::ball::{Ball, validate_snapshot};
use crate::consts::RECORD_STRIDE;
use crate::error::{SimError, SimResult};

/// One ball as laid out in the flat buffer (must match shader)
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct BallRecord {
    pub radius: f32,   // offset 0
    _pad0: f32,        // offset 4 - align position to 8 bytes
    pub pos: [f32; 2], // offset 8
    pub vel: [f32; 2], // offset 16
    pub color: f32,    // offset 24 - integer colour carried as float
    _pad1: f32,        // offset 28 - pad to 32 bytes
}

const _: () = assert!(std::mem::size_of::<BallRecord>() == RECORD_STRIDE * 4);

impl From<&Ball> for BallRecord {
    fn from(ball: &Ball) -> Self {
        Self {
            radius: ball.radius,
            _pad0: 0.0,
            pos: ball.pos.to_array(),
            vel: ball.vel.to_array(),
            color: ball.color as f32,
            _pad1: 0.0,
        }
    }
}

impl From<&BallRecord> for Ball {
    fn from(record: &BallRecord) -> Self {
        Ball {
            radius: record.radius,
            pos: Vec2::from_array(record.pos),
            vel: Vec2::from_array(record.vel),
            // Saturating cast; negative or NaN colours collapse to 0
            color: record.color as u32,
        }
    }
}

/// Convert balls to GPU/wire records
pub fn to_records(balls: &[Ball]) -> Vec<BallRecord> {
    balls.iter().map(BallRecord::from).collect()
}

/// Convert records back to balls (no validation)
pub fn from_records(records: &[BallRecord]) -> Vec<Ball> {
    records.iter().map(Ball::from).collect()
}

/// Pack balls into the flat f32 buffer
pub fn encode(balls: &[Ball]) -> Vec<f32> {
    let records = to_records(balls);
    bytemuck::cast_slice::<BallRecord, f32>(&records).to_vec()
}

/// Unpack a flat f32 buffer, validating stride and every ball
///
/// Colour slots must hold a non-negative integral value within 24 bits.
pub fn decode(floats: &[f32]) -> SimResult<Vec<Ball>> {
    if floats.len() % RECORD_STRIDE != 0 {
        return Err(SimError::stride(floats.len()));
    }

    let mut balls = Vec::with_capacity(floats.len() / RECORD_STRIDE);
    for (index, chunk) in floats.chunks_exact(RECORD_STRIDE).enumerate() {
        let color = chunk[6];
        if color.fract() != 0.0 || color < 0.0 {
            return Err(SimError::InvalidBallState {
                index,
                reason: format!("colour slot {} is not a non-negative integer", color),
            });
        }
        let record: &BallRecord = bytemuck::from_bytes(bytemuck::cast_slice(chunk));
        balls.push(Ball::from(record));
    }

    validate_snapshot(&balls)?;
    Ok(balls)
}

/// Serialize balls as little-endian bytes (stride 32)
pub fn to_le_bytes(balls: &[Ball]) -> Vec<u8> {
    encode(balls).iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Parse little-endian bytes produced by [`to_le_bytes`]
pub fn from_le_bytes(bytes: &[u8]) -> SimResult<Vec<Ball>> {
    if bytes.len() % (RECORD_STRIDE * 4) != 0 {
        return Err(SimError::stride(bytes.len() / 4));
    }
    let floats: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    decode(&floats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Ball> {
        vec![
            Ball::new(3.0, Vec2::new(10.0, 20.0), Vec2::new(-1.5, 2.5), 0x123456),
            Ball::new(7.5, Vec2::new(100.0, 5.0), Vec2::new(40.0, -9.0), 0xffffff),
        ]
    }

    #[test]
    fn test_field_order() {
        let floats = encode(&sample());
        assert_eq!(floats.len(), 16);
        assert_eq!(&floats[..8], &[3.0, 0.0, 10.0, 20.0, -1.5, 2.5, 0x123456 as f32, 0.0]);
        assert_eq!(floats[8], 7.5);
        assert_eq!(floats[14], 16777215.0);
    }

    #[test]
    fn test_decode_restores_balls() {
        let balls = sample();
        assert_eq!(decode(&encode(&balls)).unwrap(), balls);
        assert_eq!(from_le_bytes(&to_le_bytes(&balls)).unwrap(), balls);
    }

    #[test]
    fn test_le_bytes_layout() {
        let bytes = to_le_bytes(&sample()[..1]);
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[0..4], &3.0f32.to_le_bytes());
        assert_eq!(&bytes[8..12], &10.0f32.to_le_bytes());
    }

    #[test]
    fn test_decode_rejects_partial_record() {
        let mut floats = encode(&sample());
        floats.pop();
        assert!(matches!(
            decode(&floats),
            Err(SimError::InvalidBufferShape { expected: 16, actual: 15 })
        ));
        assert!(from_le_bytes(&[0u8; 31]).is_err());
    }

    #[test]
    fn test_decode_rejects_non_positive_radius() {
        let mut floats = encode(&sample());
        floats[8] = 0.0;
        assert!(matches!(
            decode(&floats),
            Err(SimError::InvalidBallState { index: 1, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_fractional_color() {
        let mut floats = encode(&sample());
        floats[6] = 12.5;
        assert!(decode(&floats).is_err());
    }

    #[test]
    fn test_empty_buffer() {
        assert!(decode(&[]).unwrap().is_empty());
    }
}
