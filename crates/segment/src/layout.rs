//! Byte layout of the detector's shared segment.
//!
//! The detector maps one fixed-size C struct and updates it in place:
//!
//! | offset | size | field                            |
//! |--------|------|----------------------------------|
//! | 0      | 4    | frame_number (i32)               |
//! | 4      | 4    | num_detections (i32)             |
//! | 8      | 1000 | 50 box slots, 20 bytes each      |
//! | 1008   | 1    | processing_complete (flag byte)  |
//! | 1009   | 3    | tail padding                     |
//!
//! Each box slot holds five f32 values: x, y, width, height, confidence.
//! Only the first `num_detections` slots are meaningful; the rest carry
//! whatever bytes earlier frames left behind. All fields are little-endian,
//! matching the platforms the detector is built for.

use crate::errors::SegmentError;

pub const HEADER_SIZE: usize = 8;
pub const BOX_SIZE: usize = 20;
pub const MAX_DETECTIONS: usize = 50;
pub const BOXES_OFFSET: usize = HEADER_SIZE;
pub const COMPLETE_OFFSET: usize = BOXES_OFFSET + MAX_DETECTIONS * BOX_SIZE;
/// Flag byte plus three bytes of tail padding, matching the C struct's sizeof.
pub const SEGMENT_SIZE: usize = COMPLETE_OFFSET + 4;

/// One detection box in frame pixel coordinates.
///
/// The detector stores coordinates as f32 even though they are whole pixels.
/// Decoding truncates them toward zero, so they come out as the integers the
/// detector computed before the float conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f32,
}

/// Decoded copy of the full segment at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSnapshot {
    pub frame_number: i32,
    pub detections: Vec<BoundingBox>,
    pub processing_complete: bool,
}

impl DetectionSnapshot {
    /// Decode a raw segment copy.
    ///
    /// Slots beyond `num_detections` are ignored. A count outside
    /// `0..=MAX_DETECTIONS` means the copy landed mid-write or the segment
    /// belongs to something else entirely; either way it is not usable.
    pub fn decode(buf: &[u8]) -> Result<Self, SegmentError> {
        if buf.len() < SEGMENT_SIZE {
            return Err(SegmentError::TruncatedRead {
                actual: buf.len(),
                expected: SEGMENT_SIZE,
            });
        }

        let frame_number = read_i32(buf, 0);
        let count = read_i32(buf, 4);
        if count < 0 || count as usize > MAX_DETECTIONS {
            return Err(SegmentError::CorruptCount(count));
        }

        let mut detections = Vec::with_capacity(count as usize);
        for slot in 0..count as usize {
            let base = BOXES_OFFSET + slot * BOX_SIZE;
            // `as i32` truncates toward zero and saturates, so a torn float
            // can never produce an out-of-range surprise here.
            detections.push(BoundingBox {
                x: read_f32(buf, base) as i32,
                y: read_f32(buf, base + 4) as i32,
                width: read_f32(buf, base + 8) as i32,
                height: read_f32(buf, base + 12) as i32,
                confidence: read_f32(buf, base + 16),
            });
        }

        Ok(Self {
            frame_number,
            detections,
            processing_complete: buf[COMPLETE_OFFSET] != 0,
        })
    }

    /// Encode into a fresh segment image.
    ///
    /// Mirrors the detector's own clamp: at most `MAX_DETECTIONS` boxes are
    /// written, extras are dropped. Unused slots stay zeroed.
    pub fn encode(&self) -> [u8; SEGMENT_SIZE] {
        let mut buf = [0u8; SEGMENT_SIZE];
        buf[0..4].copy_from_slice(&self.frame_number.to_le_bytes());

        let count = self.detections.len().min(MAX_DETECTIONS);
        buf[4..8].copy_from_slice(&(count as i32).to_le_bytes());

        for (slot, bbox) in self.detections.iter().take(MAX_DETECTIONS).enumerate() {
            let base = BOXES_OFFSET + slot * BOX_SIZE;
            buf[base..base + 4].copy_from_slice(&(bbox.x as f32).to_le_bytes());
            buf[base + 4..base + 8].copy_from_slice(&(bbox.y as f32).to_le_bytes());
            buf[base + 8..base + 12].copy_from_slice(&(bbox.width as f32).to_le_bytes());
            buf[base + 12..base + 16].copy_from_slice(&(bbox.height as f32).to_le_bytes());
            buf[base + 16..base + 20].copy_from_slice(&bbox.confidence.to_le_bytes());
        }

        buf[COMPLETE_OFFSET] = self.processing_complete as u8;
        buf
    }
}

fn read_i32(buf: &[u8], offset: usize) -> i32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    i32::from_le_bytes(bytes)
}

fn read_f32(buf: &[u8], offset: usize) -> f32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    f32::from_le_bytes(bytes)
}
