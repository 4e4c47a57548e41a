//! Optical code detection over camera frames.

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

use nageyell_types::frame::{DecodedCode, Frame};
use tracing::{debug, trace};

/// Locates and decodes a 2D code in a single frame.
///
/// A miss is the expected steady state, so it is `None` rather than an error.
/// Implementations keep no state between calls.
pub trait CodeDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Option<DecodedCode>;
}

/// QR detector backed by `rqrr`.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDetector;

impl QrDetector {
    pub fn new() -> Self {
        Self
    }
}

impl CodeDetector for QrDetector {
    fn detect(&self, frame: &Frame) -> Option<DecodedCode> {
        if frame.is_empty() {
            return None;
        }
        if !frame.is_consistent() {
            debug!(
                "Frame buffer does not match {}x{} RGBA ({} bytes); skipping",
                frame.width,
                frame.height,
                frame.data.len()
            );
            return None;
        }

        let width = frame.width as usize;
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width, frame.height as usize, |x, y| {
                luma_at(&frame.data, width, x, y)
            });

        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_, content)) => return Some(DecodedCode::new(content)),
                Err(err) => trace!("QR grid found but not decodable: {err:?}"),
            }
        }
        None
    }
}

/// ITU-R BT.601 luma of the RGBA pixel at (x, y).
fn luma_at(data: &[u8], width: usize, x: usize, y: usize) -> u8 {
    let idx = (y * width + x) * Frame::CHANNELS;
    let r = data[idx] as u32;
    let g = data[idx + 1] as u32;
    let b = data[idx + 2] as u32;
    ((r * 299 + g * 587 + b * 114) / 1000) as u8
}
